//! Role model and the role-to-permission mapping
//!
//! Scopes embedded in a token are derived from the identity's roles at
//! issuance time and are not re-evaluated until the next issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Role granted on registration
pub const ROLE_USER: &str = "user";

/// Permissions of the baseline `user` role
const USER_PERMISSIONS: &[&str] = &[
    "user.profile.view",
    "user.profile.edit",
    "user.profile.upload_avatar",
    "user.profile.search_users",
    "user.profile.view_any",
    "user.contacts.manage",
    "chat.message.send",
    "chat.message.view_history",
    "chat.dm.create",
    "chat.group.create",
];

/// User role association
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Permission set of a single role; unknown roles grant nothing
pub fn role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        ROLE_USER => USER_PERMISSIONS,
        _ => &[],
    }
}

/// Effective scopes of an identity: the set-union of its roles' permissions
///
/// Duplicates across roles collapse; the result is sorted so token claims
/// are deterministic.
pub fn effective_scopes(roles: &[String]) -> Vec<String> {
    let mut scopes = BTreeSet::new();
    for role in roles {
        for permission in role_permissions(role) {
            scopes.insert((*permission).to_string());
        }
    }
    scopes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_permissions() {
        let permissions = role_permissions(ROLE_USER);
        assert!(permissions.contains(&"user.profile.view"));
        assert!(permissions.contains(&"user.contacts.manage"));
    }

    #[test]
    fn test_unknown_role_grants_nothing() {
        assert!(role_permissions("superhero").is_empty());
    }

    #[test]
    fn test_effective_scopes_union_deduplicates() {
        // Two identical roles must not duplicate permissions.
        let roles = vec![ROLE_USER.to_string(), ROLE_USER.to_string()];
        let scopes = effective_scopes(&roles);
        assert_eq!(scopes.len(), USER_PERMISSIONS.len());
        let mut sorted = scopes.clone();
        sorted.sort();
        assert_eq!(scopes, sorted);
    }

    #[test]
    fn test_effective_scopes_empty_roles() {
        assert!(effective_scopes(&[]).is_empty());
    }
}
