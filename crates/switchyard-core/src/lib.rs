//! # Switchyard Core Library
//!
//! Domain types, configuration, and registry sources shared by the
//! integration router and the connection pool manager.
//!
//! ## Modules
//!
//! - `domain` - Tool registry entries and backend descriptions
//! - `config` - Process-wide configuration from environment-style key/value pairs
//! - `registry` - Registry sources (file, HTTP, static) and validation

pub mod config;
pub mod domain;
pub mod registry;

// Re-export commonly used types
pub use config::{
    ConfigError, PoolSettings, RegistryLocation, RouterSettings, SwitchyardConfig,
    DEFAULT_ALLOWED_TABLES,
};
pub use domain::*;
pub use registry::{
    source_for, FileRegistrySource, HttpRegistrySource, RegistryError, RegistrySource,
    StaticRegistrySource,
};
