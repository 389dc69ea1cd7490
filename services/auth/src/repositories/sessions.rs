//! Session repository for login-session rows
//!
//! Sessions move through `CREATED(active) → [rotate]* → {LOGGED_OUT |
//! EXPIRED}`; both end states are terminal. Token ids are rotated, never
//! reused, and at most one row owns a given token id at a time.

use chrono::{DateTime, Utc};
use common::error::ApiResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewSession, Session};

/// Session repository
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new active session row
    ///
    /// Login always creates a new row; existing sessions are never updated
    /// in place by this path.
    pub async fn create(&self, new_session: &NewSession) -> ApiResult<Session> {
        info!("Creating session for user: {}", new_session.user_id);

        let row = sqlx::query(
            r#"
            INSERT INTO user_sessions
                (id, user_id, access_token_jti, refresh_token_jti,
                 issued_at, expires_at, user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, access_token_jti, refresh_token_jti,
                      issued_at, expires_at, is_active, user_agent,
                      ip_address, created_at
            "#,
        )
        .bind(new_session.id)
        .bind(new_session.user_id)
        .bind(new_session.access_token_jti)
        .bind(new_session.refresh_token_jti)
        .bind(new_session.issued_at)
        .bind(new_session.expires_at)
        .bind(&new_session.user_agent)
        .bind(&new_session.ip_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(session_from_row(&row))
    }

    /// Fetch a session only if it is still usable
    ///
    /// An expired-but-not-yet-deactivated row is treated as absent; this is
    /// the sole gate used during refresh.
    pub async fn get_active(&self, session_id: Uuid) -> ApiResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, access_token_jti, refresh_token_jti,
                   issued_at, expires_at, is_active, user_agent,
                   ip_address, created_at
            FROM user_sessions
            WHERE id = $1 AND is_active = TRUE AND expires_at > now()
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| session_from_row(&row)))
    }

    /// Replace both token ids and timestamps on an existing session
    ///
    /// The update is conditional on the refresh jti the caller presented
    /// still being the current one. Returns false when no row matched:
    /// either the session is gone or a concurrent refresh already rotated
    /// it, which the caller must treat as possible token replay.
    pub async fn rotate(
        &self,
        session_id: Uuid,
        presented_refresh_jti: Uuid,
        new_access_jti: Uuid,
        new_refresh_jti: Uuid,
        issued_at: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET access_token_jti = $3,
                refresh_token_jti = $4,
                issued_at = $5,
                expires_at = $6
            WHERE id = $1
              AND refresh_token_jti = $2
              AND is_active = TRUE
            "#,
        )
        .bind(session_id)
        .bind(presented_refresh_jti)
        .bind(new_access_jti)
        .bind(new_refresh_jti)
        .bind(issued_at)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deactivate a single session; idempotent, terminal
    pub async fn deactivate(&self, session_id: Uuid) -> ApiResult<()> {
        info!("Deactivating session: {}", session_id);

        sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Deactivate every active session of an identity (logout everywhere)
    pub async fn deactivate_all(&self, user_id: Uuid) -> ApiResult<()> {
        info!("Deactivating all sessions for user: {}", user_id);

        sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn session_from_row(row: &PgRow) -> Session {
    Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        access_token_jti: row.get("access_token_jti"),
        refresh_token_jti: row.get("refresh_token_jti"),
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
        is_active: row.get("is_active"),
        user_agent: row.get("user_agent"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
    }
}
