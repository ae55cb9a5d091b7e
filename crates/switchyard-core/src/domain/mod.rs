//! Domain entities
//!
//! - `ToolRegistryEntry` - one named integration the router can dispatch to
//! - `BackendSpec` - one named data-access target owned by the pool manager

mod backend;
mod tool;

pub use backend::*;
pub use tool::*;
