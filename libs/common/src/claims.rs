//! Typed JWT claims shared by the issuing and verifying services
//!
//! Claims are validated into this structure immediately after decode; a
//! token missing any required field (or carrying a mistyped one) fails
//! deserialization and is rejected as a whole.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by both access and refresh tokens
///
/// Access and refresh tokens share this encoding; they differ only in claim
/// population (distinct `jti`, distinct `exp`) and in how the session row is
/// consulted during verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: identity id of the token owner
    pub sub: Uuid,
    /// Session id, stable across token rotations within one login session
    pub sid: Uuid,
    /// Token id, unique per issued token; the revocation key
    pub jti: Uuid,
    /// Permission strings granted to the session at issuance time
    pub scopes: Vec<String>,
    /// Issued-at, unix seconds
    pub iat: u64,
    /// Expires-at, unix seconds
    pub exp: u64,
}

impl Claims {
    /// Seconds left until natural expiry, zero if already past
    pub fn remaining_ttl(&self, now_unix: u64) -> u64 {
        self.exp.saturating_sub(now_unix)
    }

    /// Check a single scope against the granted set
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Authenticated principal exposed to handlers after verification
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub session_id: Uuid,
    pub scopes: Vec<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            id: claims.sub,
            session_id: claims.sid,
            scopes: claims.scopes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            scopes: vec!["user.profile.view".to_string()],
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let claims = sample();
        let json = serde_json::to_string(&claims).unwrap();
        let back: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        // No `jti`: the payload must not validate into Claims.
        let json = serde_json::json!({
            "sub": Uuid::new_v4(),
            "sid": Uuid::new_v4(),
            "scopes": [],
            "iat": 0,
            "exp": 0,
        });
        assert!(serde_json::from_value::<Claims>(json).is_err());
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let json = serde_json::json!({
            "sub": "not-a-uuid",
            "sid": Uuid::new_v4(),
            "jti": Uuid::new_v4(),
            "scopes": [],
            "iat": 0,
            "exp": 0,
        });
        assert!(serde_json::from_value::<Claims>(json).is_err());
    }

    #[test]
    fn test_remaining_ttl() {
        let claims = sample();
        assert_eq!(claims.remaining_ttl(claims.exp - 300), 300);
        assert_eq!(claims.remaining_ttl(claims.exp + 10), 0);
    }

    #[test]
    fn test_has_scope() {
        let claims = sample();
        assert!(claims.has_scope("user.profile.view"));
        assert!(!claims.has_scope("chat.message.send"));
    }
}
