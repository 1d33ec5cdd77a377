//! Credential model: store keys, redacted secrets, and the token credential set.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{credentials::*, secret::*};
