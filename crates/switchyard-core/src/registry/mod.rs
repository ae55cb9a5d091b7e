//! Tool Registry sources
//!
//! The registry is a declarative list of `ToolRegistryEntry` records. It can be
//! loaded from a local JSON file, fetched from a remote URL, or supplied
//! in memory. Every source returns the complete list; callers replace their
//! registry wholesale.

mod source;
mod validation;

pub use source::*;
pub use validation::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {message}")]
    Io { path: String, message: String },

    #[error("registry request failed: {0}")]
    Request(String),

    #[error("registry endpoint returned status {0}")]
    Status(u16),

    #[error("malformed registry document: {0}")]
    Parse(String),

    #[error("invalid registry: {0}")]
    Invalid(String),
}
