//! Authentication middleware for the chat service
//!
//! Every request is verified locally: decode with the shared public key,
//! then consult the revocation cache. There is no callback to the auth
//! service on the request path.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use common::claims::AuthUser;
use common::error::ApiError;
use common::verifier::bearer_token;

use crate::AppState;

/// Extract and verify the bearer token, exposing the principal to handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;

    let claims = state.verifier.verify(token).await?;
    req.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(req).await)
}

/// Require a scope granted at issuance time
///
/// Scopes were fixed when the token pair was minted; a role change takes
/// effect at the next login, not here.
pub fn require_scope(user: &AuthUser, scope: &str) -> Result<(), ApiError> {
    if user.scopes.iter().any(|s| s == scope) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Missing required scope: {}",
            scope
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(scopes: &[&str]) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_require_scope_granted() {
        let user = user_with(&["chat.message.send", "user.profile.view"]);
        assert!(require_scope(&user, "chat.message.send").is_ok());
    }

    #[test]
    fn test_require_scope_missing() {
        let user = user_with(&["user.profile.view"]);
        assert!(require_scope(&user, "chat.message.send").is_err());
    }

    #[test]
    fn test_require_scope_empty() {
        let user = user_with(&[]);
        assert!(require_scope(&user, "chat.message.send").is_err());
    }
}
