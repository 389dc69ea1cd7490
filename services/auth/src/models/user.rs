//! User identity and local credential models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User identity
///
/// The identity row itself carries no credentials; the local credential is a
/// separate 1:1 record so other login methods can be added without touching
/// this table. Identities are never hard-deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Local (username/password) credential, 1:1 with a user
///
/// `verification_code` is present only while the email is unverified and is
/// cleared atomically when `email_verified_at` is stamped.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocalCredential {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LocalCredential {
    /// Whether the email address has been verified
    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// New user registration payload handed to the credential repository
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: String,
}
