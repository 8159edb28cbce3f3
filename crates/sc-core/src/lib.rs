//! sc-core: shared types, artifact identity, errors, and configuration.
//!
//! This crate is the foundational dependency for all other sc-* crates,
//! providing the artifact naming scheme, a unified error type, and the
//! application configuration.

pub mod artifact;
pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use artifact::*;
pub use error::{Error, Result};
