//! Integration Router
//!
//! - **Registry**: immutable snapshot of tool entries, swapped atomically on refresh
//! - **FallbackPolicy**: explicit substitutions, then the first active Direct entry
//! - **HttpDispatcher**: Gateway and Direct wire contracts, health probes
//! - **HealthCache**: bounded per-endpoint health with a freshness window
//! - **IntegrationRouter**: resolves, dispatches, falls back once, reports
//! - **RefreshScheduler**: periodic registry reload

mod dispatch;
mod error;
mod fallback;
mod health;
mod registry;
mod scheduler;
mod service;

pub use dispatch::{
    HttpDispatcher, HEADER_BRANCH, HEADER_DOCTRINE_ID, HEADER_FALLBACK, HEADER_REQUEST_ID,
};
pub use error::{DispatchFailure, RouterError};
pub use fallback::FallbackPolicy;
pub use health::{EndpointHealth, HealthCache};
pub use registry::{Registry, RegistryStore};
pub use scheduler::RefreshScheduler;
pub use service::{IntegrationRouter, RouteOptions, RouteResult, ToolStatusReport};
