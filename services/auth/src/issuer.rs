//! Token issuer: the login/refresh orchestration
//!
//! Both flows share one shape: collect scopes, mint two fresh token ids,
//! encode an access/refresh pair carrying the same session id and scopes but
//! distinct token ids and expiries, then persist the session row. Tokens are
//! encoded before anything is written, so there is no partial success: an
//! encoding failure persists nothing and a persistence failure returns no
//! tokens.

use chrono::{DateTime, Duration, Utc};
use common::claims::Claims;
use common::error::{ApiError, ApiResult};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::jwt::JwtCodec;
use crate::models::{NewSession, Session};
use crate::repositories::SessionRepository;

/// Freshly issued access/refresh token pair
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Encoded pair plus the bookkeeping needed to persist the session
struct PreparedPair {
    pair: TokenPair,
    access_jti: Uuid,
    refresh_jti: Uuid,
    issued_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
}

/// Orchestrates issuance for login and refresh
#[derive(Clone)]
pub struct TokenIssuer {
    codec: JwtCodec,
    sessions: SessionRepository,
}

impl TokenIssuer {
    /// Create a new issuer
    pub fn new(codec: JwtCodec, sessions: SessionRepository) -> Self {
        Self { codec, sessions }
    }

    /// Encode a fresh pair bound to `session_id` without touching storage
    fn prepare_pair(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        scopes: &[String],
    ) -> ApiResult<PreparedPair> {
        let issued_at = Utc::now();
        let access_expires_at = issued_at + Duration::seconds(self.codec.access_token_expiry() as i64);
        let refresh_expires_at =
            issued_at + Duration::seconds(self.codec.refresh_token_expiry() as i64);

        let access_jti = Uuid::new_v4();
        let refresh_jti = Uuid::new_v4();

        let access_claims = Claims {
            sub: user_id,
            sid: session_id,
            jti: access_jti,
            scopes: scopes.to_vec(),
            iat: issued_at.timestamp() as u64,
            exp: access_expires_at.timestamp() as u64,
        };
        let refresh_claims = Claims {
            jti: refresh_jti,
            exp: refresh_expires_at.timestamp() as u64,
            ..access_claims.clone()
        };

        let access_token = self
            .codec
            .encode(&access_claims)
            .map_err(ApiError::Internal)?;
        let refresh_token = self
            .codec
            .encode(&refresh_claims)
            .map_err(ApiError::Internal)?;

        Ok(PreparedPair {
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            access_jti,
            refresh_jti,
            issued_at,
            refresh_expires_at,
        })
    }

    /// Issue a pair for a fresh login, creating a new session row
    pub async fn issue_on_login(
        &self,
        user_id: Uuid,
        scopes: &[String],
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> ApiResult<TokenPair> {
        // The session id is minted here so the claims can embed it before
        // the row exists; if anything below fails, nothing was persisted.
        let session_id = Uuid::new_v4();
        let prepared = self.prepare_pair(user_id, session_id, scopes)?;

        self.sessions
            .create(&NewSession {
                id: session_id,
                user_id,
                access_token_jti: prepared.access_jti,
                refresh_token_jti: prepared.refresh_jti,
                issued_at: prepared.issued_at,
                expires_at: prepared.refresh_expires_at,
                user_agent,
                ip_address,
            })
            .await?;

        Ok(prepared.pair)
    }

    /// Issue a pair for a refresh, rotating the existing session row
    ///
    /// The rotation is conditional on `presented_refresh_jti` still being
    /// the session's current refresh token id. Losing that race means the
    /// presented token was already consumed, possibly replayed, and the
    /// whole refresh is rejected.
    pub async fn issue_on_refresh(
        &self,
        session: &Session,
        scopes: &[String],
        presented_refresh_jti: Uuid,
    ) -> ApiResult<TokenPair> {
        let prepared = self.prepare_pair(session.user_id, session.id, scopes)?;

        let rotated = self
            .sessions
            .rotate(
                session.id,
                presented_refresh_jti,
                prepared.access_jti,
                prepared.refresh_jti,
                prepared.issued_at,
                prepared.refresh_expires_at,
            )
            .await?;

        if !rotated {
            warn!(
                "Refresh token for session {} no longer current, rejecting (possible replay)",
                session.id
            );
            return Err(ApiError::Unauthorized);
        }

        Ok(prepared.pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{JwtCodec, test_keys};

    // Persistence paths are covered by the ignored integration suite; these
    // tests pin down the claim population rules on the pure encode path.
    #[tokio::test]
    async fn test_prepared_pair_claims() {
        let codec = JwtCodec::new(test_keys::test_config()).unwrap();
        let issuer = TokenIssuer::new(
            codec.clone(),
            // The repository is never touched by prepare_pair.
            SessionRepository::new(sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap()),
        );

        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let scopes = vec!["user.profile.view".to_string()];

        let prepared = issuer.prepare_pair(user_id, session_id, &scopes).unwrap();

        let access = codec.decode(&prepared.pair.access_token).unwrap();
        let refresh = codec.decode(&prepared.pair.refresh_token).unwrap();

        // Same subject, session and scopes on both tokens.
        assert_eq!(access.sub, user_id);
        assert_eq!(refresh.sub, user_id);
        assert_eq!(access.sid, session_id);
        assert_eq!(refresh.sid, session_id);
        assert_eq!(access.scopes, scopes);
        assert_eq!(refresh.scopes, scopes);

        // Distinct token ids, distinct expiries, access well before refresh.
        assert_ne!(access.jti, refresh.jti);
        assert_eq!(access.jti, prepared.access_jti);
        assert_eq!(refresh.jti, prepared.refresh_jti);
        assert!(access.exp < refresh.exp);
        assert_eq!(access.iat, refresh.iat);
    }

    #[tokio::test]
    async fn test_consecutive_pairs_never_share_token_ids() {
        let codec = JwtCodec::new(test_keys::test_config()).unwrap();
        let issuer = TokenIssuer::new(
            codec.clone(),
            SessionRepository::new(sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap()),
        );

        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let first = issuer.prepare_pair(user_id, session_id, &[]).unwrap();
        let second = issuer.prepare_pair(user_id, session_id, &[]).unwrap();

        let ids = [
            first.access_jti,
            first.refresh_jti,
            second.access_jti,
            second.refresh_jti,
        ];
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
