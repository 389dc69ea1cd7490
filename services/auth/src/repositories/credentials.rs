//! Credential repository for identity and local-credential rows
//!
//! Side effects are confined to credential rows; this component never
//! issues tokens.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::error::{ApiError, ApiResult};
use rand::Rng;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{LocalCredential, NewUser, User, role::ROLE_USER};

/// Length of the emailed verification code
const VERIFICATION_CODE_LENGTH: usize = 8;

/// Generate a fresh email-verification code (ASCII letters)
pub fn generate_verification_code() -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_CODE_LENGTH)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Credential repository
#[derive(Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    /// Create a new credential repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a password with argon2
    pub fn hash_password(password: &str) -> ApiResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a stored hash
    ///
    /// A malformed stored hash verifies as false rather than erroring, so
    /// the caller's error path stays identical to a plain mismatch.
    pub fn verify_password(password_hash: &str, password: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
            error!("Stored password hash failed to parse");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Check whether an email address is already registered
    pub async fn is_email_taken(&self, email: &str) -> ApiResult<bool> {
        let row = sqlx::query("SELECT user_id FROM user_local_auth WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Check whether a username is already registered
    pub async fn is_username_taken(&self, username: &str) -> ApiResult<bool> {
        let row = sqlx::query("SELECT user_id FROM user_local_auth WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Create the identity, local credential and baseline role in one
    /// transaction
    ///
    /// Uniqueness is enforced by the database; a concurrent duplicate
    /// registration surfaces as a unique violation and is mapped to a
    /// conflict rather than an internal error.
    pub async fn create(&self, new_user: &NewUser) -> ApiResult<User> {
        info!("Creating new user: {}", new_user.username);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (id)
            VALUES ($1)
            RETURNING id, is_active, created_at
            "#,
        )
        .bind(new_user.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        let user = User {
            id: row.get("id"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        };

        sqlx::query(
            r#"
            INSERT INTO user_local_auth (user_id, username, email, password_hash, verification_code)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(new_user.id)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.verification_code)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(new_user.id)
            .bind(ROLE_USER)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Find a credential by username or email, together with its identity
    ///
    /// One query serves both fields so downstream code cannot leak which of
    /// the two matched.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> ApiResult<Option<(LocalCredential, User)>> {
        let row = sqlx::query(
            r#"
            SELECT a.user_id, a.username, a.email, a.password_hash,
                   a.verification_code, a.email_verified_at, a.created_at,
                   u.is_active, u.created_at AS user_created_at
            FROM user_local_auth a
            JOIN users u ON u.id = a.user_id
            WHERE a.username = $1 OR a.email = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| credential_with_user_from_row(&row)))
    }

    /// Mark an email as verified, consuming the verification code
    ///
    /// Single-use by construction: the code is matched and cleared in the
    /// same statement, so a second attempt with the same code finds no row.
    /// Returns the owning user id when a code was consumed.
    pub async fn verify_email(&self, code: &str) -> ApiResult<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            UPDATE user_local_auth
            SET email_verified_at = now(), verification_code = NULL
            WHERE verification_code = $1
            RETURNING user_id
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("user_id")))
    }

    /// Role names granted to an identity
    pub async fn user_roles(&self, user_id: Uuid) -> ApiResult<Vec<String>> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("role")).collect())
    }
}

fn credential_with_user_from_row(row: &PgRow) -> (LocalCredential, User) {
    let credential = LocalCredential {
        user_id: row.get("user_id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        verification_code: row.get("verification_code"),
        email_verified_at: row.get("email_verified_at"),
        created_at: row.get("created_at"),
    };
    let user = User {
        id: row.get("user_id"),
        is_active: row.get("is_active"),
        created_at: row.get("user_created_at"),
    };
    (credential, user)
}

fn map_unique_violation(err: sqlx::Error) -> ApiError {
    let is_unique = err
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false);
    if is_unique {
        ApiError::Conflict("Username or email already registered".to_string())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_code_shape() {
        let code = generate_verification_code();
        assert_eq!(code.len(), VERIFICATION_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphabetic()));

        // Two consecutive codes colliding would be a sign the RNG is broken.
        assert_ne!(code, generate_verification_code());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = CredentialRepository::hash_password("pw123456").unwrap();
        assert!(CredentialRepository::verify_password(&hash, "pw123456"));
        assert!(!CredentialRepository::verify_password(&hash, "pw1234567"));
    }

    #[test]
    fn test_verify_password_with_garbage_hash() {
        assert!(!CredentialRepository::verify_password(
            "not-a-phc-string",
            "pw123456"
        ));
    }
}
