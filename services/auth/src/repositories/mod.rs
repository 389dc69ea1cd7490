//! Database repositories for the authentication service

pub mod credentials;
pub mod sessions;

pub use credentials::CredentialRepository;
pub use sessions::SessionRepository;
