//! Common library for the Tessera messaging platform
//!
//! This crate provides shared functionality used across different services:
//! database and Redis connectivity, the error taxonomy, the typed token
//! claims, and the token verifier that resource services use to validate
//! bearer tokens locally (public key + revocation cache) without a network
//! hop to the auth service.

pub mod cache;
pub mod claims;
pub mod database;
pub mod error;
pub mod verifier;
