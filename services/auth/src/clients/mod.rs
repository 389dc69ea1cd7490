//! HTTP clients for collaborating services

pub mod user;

pub use user::{UserClient, UserClientError, UserProfile};
