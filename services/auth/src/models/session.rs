//! Login session model
//!
//! One row per login session. The row tracks the *current* access and
//! refresh token ids; rotation replaces both, it never reuses an id. A
//! session is active from creation until explicit deactivation (logout) or
//! passive expiry of the refresh token; both are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token_jti: Uuid,
    pub refresh_token_jti: Uuid,
    pub issued_at: DateTime<Utc>,
    /// Refresh-token expiry; the session is unusable past this instant even
    /// if still flagged active
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New session creation payload
///
/// The session id is generated by the issuer before any token is encoded,
/// so claims can embed it and a failed encode persists nothing.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token_jti: Uuid,
    pub refresh_token_jti: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
