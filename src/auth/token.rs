//! Token secrets and the credential sets built from token endpoint responses.

pub mod credentials;
pub mod secret;
