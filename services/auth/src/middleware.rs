//! Middleware for bearer-token validation
//!
//! Logout and validate-token require a verified access token; the verified
//! claims are placed in the request extensions for the handlers.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use common::error::ApiError;
use common::verifier::bearer_token;

use crate::AppState;

/// Extract and verify the bearer token from the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;

    let claims = state.verifier.verify(token).await?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
