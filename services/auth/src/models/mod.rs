//! Data models for the authentication service

pub mod role;
pub mod session;
pub mod user;

pub use role::{UserRole, effective_scopes, role_permissions};
pub use session::{NewSession, Session};
pub use user::{LocalCredential, NewUser, User};
