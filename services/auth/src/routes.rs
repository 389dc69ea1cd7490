//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use common::claims::Claims;
use common::error::{ApiError, ApiResult};

use crate::AppState;
use crate::clients::UserClientError;
use crate::middleware::auth_middleware;
use crate::models::{NewUser, effective_scopes};
use crate::repositories::credentials::{CredentialRepository, generate_verification_code};
use crate::validation::{validate_email, validate_password, validate_username};

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Query parameters for email verification
#[derive(Deserialize)]
pub struct VerifyEmailQuery {
    pub code: String,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Response carrying a fresh token pair
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request for logout
#[derive(Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub all_devices: bool,
}

/// Response for token validation
#[derive(Serialize)]
pub struct ValidateTokenResponse {
    pub user_id: Uuid,
    pub scopes: Vec<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/validate-token", post(validate_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/verify-email", post(verify_email))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh_token))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Register a new user
///
/// The public profile is created in the user service first; the identity id
/// it assigns becomes the id of the local credential rows.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_username(&payload.username).map_err(ApiError::Validation)?;
    validate_email(&payload.email).map_err(ApiError::Validation)?;
    validate_password(&payload.password).map_err(ApiError::Validation)?;

    if state
        .credential_repository
        .is_email_taken(&payload.email)
        .await?
    {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if state
        .credential_repository
        .is_username_taken(&payload.username)
        .await?
    {
        return Err(ApiError::Conflict(
            "Username already registered".to_string(),
        ));
    }

    let profile = state
        .user_client
        .create_profile(
            &payload.username,
            &payload.email,
            payload.display_name.as_deref(),
        )
        .await
        .map_err(|e| match e {
            UserClientError::Status { status, detail } if status == StatusCode::CONFLICT => {
                ApiError::Conflict(detail)
            }
            other => ApiError::Upstream(other.to_string()),
        })?;

    let password_hash = CredentialRepository::hash_password(&payload.password)?;
    let verification_code = generate_verification_code();

    state
        .credential_repository
        .create(&NewUser {
            id: profile.id,
            username: payload.username,
            email: payload.email,
            password_hash,
            verification_code,
        })
        .await?;

    // The verification code reaches the user out of band (notification
    // service, via the event bus); it is never returned here.
    info!("Registered user: {}", profile.id);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            message: "User registered successfully. Please verify your email.".to_string(),
        }),
    ))
}

/// Verify an email address with the emailed code
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> ApiResult<impl IntoResponse> {
    match state.credential_repository.verify_email(&query.code).await? {
        Some(user_id) => {
            info!("Email verified for user: {}", user_id);
            Ok(Json(SuccessResponse {
                message: "Email successfully verified".to_string(),
            }))
        }
        None => Err(ApiError::BadRequest(
            "Invalid or expired verification code".to_string(),
        )),
    }
}

/// Log in with username or email and receive a token pair
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.rate_limiter.is_allowed(&payload.login).await {
        return Err(ApiError::TooManyRequests);
    }

    // Unknown identifier and wrong password take the same path so the
    // response cannot reveal which field existed.
    let Some((credential, user)) = state
        .credential_repository
        .find_by_identifier(&payload.login)
        .await?
    else {
        return Err(ApiError::Unauthorized);
    };

    if !CredentialRepository::verify_password(&credential.password_hash, &payload.password) {
        return Err(ApiError::Unauthorized);
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    if !credential.is_email_verified() {
        return Err(ApiError::BadRequest("Verify email".to_string()));
    }

    let roles = state.credential_repository.user_roles(user.id).await?;
    let scopes = effective_scopes(&roles);

    let user_agent = header_value(&headers, header::USER_AGENT);
    let ip_address = forwarded_for(&headers);

    let pair = state
        .issuer
        .issue_on_login(user.id, &scopes, user_agent, ip_address)
        .await?;

    state.rate_limiter.clear(&payload.login).await;
    info!("Login succeeded for user: {}", user.id);

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
    }))
}

/// Exchange a refresh token for a fresh pair
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    // Full verification: signature, expiry, typed claims, revocation.
    let claims = state.verifier.verify(&payload.refresh_token).await?;

    let Some(session) = state.session_repository.get_active(claims.sid).await? else {
        warn!(
            "Refresh presented for absent or expired session: {}",
            claims.sid
        );
        return Err(ApiError::Unauthorized);
    };

    // Scopes were fixed at issuance and travel with the token until the
    // next login re-derives them from roles.
    let pair = state
        .issuer
        .issue_on_refresh(&session, &claims.scopes, claims.jti)
        .await?;

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
    }))
}

/// Log out the current session, or every session of the identity
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LogoutRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now().timestamp() as u64;
    let remaining = claims.remaining_ttl(now);

    // The marker must land before the session flips; failing the whole
    // logout is preferable to a token that still validates elsewhere.
    state
        .revocation_cache
        .revoke(claims.jti, remaining)
        .await
        .map_err(ApiError::Internal)?;

    if payload.all_devices {
        state.session_repository.deactivate_all(claims.sub).await?;
    } else {
        state.session_repository.deactivate(claims.sid).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Validate the presented access token on behalf of another service
pub async fn validate_token(
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ValidateTokenResponse {
        user_id: claims.sub,
        scopes: claims.scopes,
    }))
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_for(&headers), None);

        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(forwarded_for(&headers), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn test_logout_request_defaults_to_single_device() {
        let request: LogoutRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.all_devices);

        let request: LogoutRequest = serde_json::from_str(r#"{"all_devices": true}"#).unwrap();
        assert!(request.all_devices);
    }
}
