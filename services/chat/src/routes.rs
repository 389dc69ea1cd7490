//! Chat service routes
//!
//! Chat CRUD (rooms, membership, history) lives in the data layer and is
//! not part of this service's token-handling surface; the routes here are
//! the ones that only need a verified principal.

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use common::claims::AuthUser;
use common::error::ApiResult;

use crate::AppState;
use crate::middleware::{auth_middleware, require_scope};

/// The verified principal as this service sees it
#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub scopes: Vec<String>,
}

/// Create the router for the chat service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/me", get(me))
        .route("/api/v1/chats/:chat_id/typing", post(typing))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-service"
    }))
}

/// Return the verified principal, as decoded from the access token
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResult<impl IntoResponse> {
    Ok(Json(MeResponse {
        user_id: user.id,
        session_id: user.session_id,
        scopes: user.scopes,
    }))
}

/// Publish a typing indicator for a chat
///
/// Fire-and-forget: the actual fan-out to participants rides the event bus,
/// so acceptance is all this endpoint reports.
pub async fn typing(
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_scope(&user, "chat.message.send")?;

    info!("User {} is typing in chat {}", user.id, chat_id);

    Ok(StatusCode::ACCEPTED)
}
