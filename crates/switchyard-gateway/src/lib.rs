//! Switchyard Gateway
//!
//! Integration router that provides:
//! - Case-insensitive dispatch across a registry of named tools
//! - Gateway (enveloped, credentialed) and Direct (raw payload) wire contracts
//! - A single fallback to a Direct path when a Gateway call fails
//! - Per-endpoint health caching with a freshness window
//! - Atomic registry refresh, on demand and on a fixed schedule

pub mod logging;
pub mod router;

pub use router::{
    DispatchFailure, EndpointHealth, FallbackPolicy, HealthCache, HttpDispatcher,
    IntegrationRouter, RefreshScheduler, Registry, RouteOptions, RouteResult, RouterError,
    ToolStatusReport,
};
