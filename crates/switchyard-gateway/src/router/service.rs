//! Integration Router service
//!
//! IntegrationRouter handles:
//! - Resolving a tool name against the current registry snapshot
//! - Dispatching over the Gateway or Direct contract
//! - One fallback attempt via the Direct contract when a Gateway call fails
//! - Recording endpoint health for every call actually made
//! - Health probes, status snapshots, and atomic registry refresh

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use switchyard_core::{
    IntegrationType, RegistryError, RegistrySource, RouterSettings, ToolRegistryEntry,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use super::dispatch::HttpDispatcher;
use super::error::{DispatchFailure, RouterError};
use super::fallback::FallbackPolicy;
use super::health::HealthCache;
use super::registry::{Registry, RegistryStore};
use crate::logging::{DispatchSpan, TraceContext};

/// Per-call options
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteOptions {
    /// Overrides the configured dispatch timeout
    pub timeout: Option<Duration>,
}

impl RouteOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Uniform result of a successful dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub success: bool,
    /// Path actually used
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,
    /// Tool actually called
    pub tool: String,
    pub doctrine_id: String,
    pub fallback: bool,
    pub data: Value,
}

impl RouteResult {
    fn new(
        entry: &ToolRegistryEntry,
        integration_type: IntegrationType,
        fallback: bool,
        data: Value,
    ) -> Self {
        Self {
            success: true,
            integration_type,
            tool: entry.tool.clone(),
            doctrine_id: entry.doctrine_id.clone(),
            fallback,
            data,
        }
    }
}

/// Registry entry enriched with observed health
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatusReport {
    #[serde(flatten)]
    pub entry: ToolRegistryEntry,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
}

pub struct IntegrationRouter {
    registry: RegistryStore,
    source: Arc<dyn RegistrySource>,
    fallback: FallbackPolicy,
    dispatcher: HttpDispatcher,
    health: HealthCache,
    timeout: Duration,
    health_timeout: Duration,
    /// Serializes reloads so two refreshes never interleave
    refresh_lock: Mutex<()>,
}

impl IntegrationRouter {
    /// Build the router and perform the initial registry load
    pub async fn load(
        settings: RouterSettings,
        source: Arc<dyn RegistrySource>,
    ) -> Result<Self, RouterError> {
        let entries = source.load().await?;
        info!(
            "[Router] Loaded {} tools from {}",
            entries.len(),
            source.describe()
        );
        Ok(Self::with_entries(settings, source, entries))
    }

    /// Build the router from entries that were already loaded
    pub fn with_entries(
        settings: RouterSettings,
        source: Arc<dyn RegistrySource>,
        entries: Vec<ToolRegistryEntry>,
    ) -> Self {
        let dispatcher =
            HttpDispatcher::new(settings.gateway_token.clone(), settings.source.clone());
        Self::with_dispatcher(settings, source, entries, dispatcher)
    }

    /// Build the router with a caller-supplied dispatcher
    pub fn with_dispatcher(
        settings: RouterSettings,
        source: Arc<dyn RegistrySource>,
        entries: Vec<ToolRegistryEntry>,
        dispatcher: HttpDispatcher,
    ) -> Self {
        if !dispatcher.has_credential() {
            warn!("[Router] No gateway credential configured; Gateway calls are unauthenticated");
        }

        Self {
            registry: RegistryStore::new(Registry::new(entries)),
            source,
            fallback: FallbackPolicy::new(settings.fallbacks.iter().map(|(a, b)| (a, b))),
            dispatcher,
            health: HealthCache::new(settings.health_ttl, settings.health_cache_capacity),
            timeout: settings.timeout,
            health_timeout: settings.health_timeout,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current registry snapshot
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.snapshot()
    }

    pub fn health_cache(&self) -> &HealthCache {
        &self.health
    }

    /// Route a call to the named tool
    pub async fn route_integration(
        &self,
        tool: &str,
        payload: Value,
        options: RouteOptions,
    ) -> Result<RouteResult, RouterError> {
        let ctx = TraceContext::new(tool);
        let span = DispatchSpan::enter(&ctx);

        self.route(&ctx, tool, payload, options)
            .instrument(span)
            .await
    }

    async fn route(
        &self,
        ctx: &TraceContext,
        tool: &str,
        payload: Value,
        options: RouteOptions,
    ) -> Result<RouteResult, RouterError> {
        let registry = self.registry.snapshot();

        let entry = registry
            .get(tool)
            .ok_or_else(|| RouterError::ToolNotFound(tool.to_string()))?;

        if !entry.is_dispatchable() {
            return Err(RouterError::ToolUnavailable {
                tool: entry.tool.clone(),
                status: entry.status,
            });
        }

        let timeout = options.timeout.unwrap_or(self.timeout);

        if entry.integration_type == IntegrationType::Direct {
            let data = self
                .dispatch(entry, IntegrationType::Direct, &payload, timeout, ctx)
                .await?;
            info!("[Router] {} -> Direct ({}ms)", entry.tool, ctx.elapsed_ms());
            return Ok(RouteResult::new(entry, IntegrationType::Direct, false, data));
        }

        let failure = match self
            .dispatch(entry, IntegrationType::Gateway, &payload, timeout, ctx)
            .await
        {
            Ok(data) => {
                info!("[Router] {} -> Gateway ({}ms)", entry.tool, ctx.elapsed_ms());
                return Ok(RouteResult::new(entry, IntegrationType::Gateway, false, data));
            }
            Err(failure) => failure,
        };

        // Exactly one fallback attempt, never a fallback of a fallback
        let Some(fallback) = self.fallback.resolve(&registry, entry) else {
            warn!(
                "[Router] Gateway call for {} failed and no fallback exists: {}",
                entry.tool, failure
            );
            return Err(failure.into());
        };

        warn!(
            "[Router] Gateway call for {} failed ({}), falling back to {}",
            entry.tool, failure, fallback.tool
        );

        match self
            .dispatch(fallback, IntegrationType::Direct, &payload, timeout, ctx)
            .await
        {
            Ok(data) => {
                info!(
                    "[Router] {} -> Direct fallback {} ({}ms)",
                    entry.tool,
                    fallback.tool,
                    ctx.elapsed_ms()
                );
                Ok(RouteResult::new(fallback, IntegrationType::Direct, true, data))
            }
            Err(fallback_failure) => {
                warn!(
                    "[Router] Fallback {} for {} also failed: {}",
                    fallback.tool, entry.tool, fallback_failure
                );
                Err(fallback_failure.into())
            }
        }
    }

    /// Make one call and record the endpoint's health
    async fn dispatch(
        &self,
        entry: &ToolRegistryEntry,
        contract: IntegrationType,
        payload: &Value,
        timeout: Duration,
        ctx: &TraceContext,
    ) -> Result<Value, DispatchFailure> {
        debug!(
            "[Router] {} {} via {} (timeout: {:?})",
            contract, entry.tool, entry.endpoint, timeout
        );

        let result = match contract {
            IntegrationType::Gateway => {
                self.dispatcher
                    .post_gateway(entry, payload, timeout, &ctx.trace_id)
                    .await
            }
            IntegrationType::Direct => {
                self.dispatcher
                    .post_direct(entry, payload, timeout, &ctx.trace_id)
                    .await
            }
        };

        match &result {
            Ok(_) => self.health.record_success(&entry.endpoint),
            Err(failure) => self.health.record_failure(&entry.endpoint, failure.message.clone()),
        }

        result
    }

    /// Cached health if fresh, otherwise probe. Never fails.
    pub async fn check_endpoint_health(&self, endpoint: &str) -> bool {
        if let Some(cached) = self.health.get(endpoint) {
            return cached.healthy;
        }

        match self.dispatcher.probe(endpoint, self.health_timeout).await {
            Ok(()) => {
                self.health.record_success(endpoint);
                true
            }
            Err(failure) => {
                debug!("[HealthCache] {} unhealthy: {}", endpoint, failure);
                self.health.record_failure(endpoint, failure.message);
                false
            }
        }
    }

    /// Registry snapshot with observed health, probed concurrently
    pub async fn get_tool_status(&self) -> Vec<ToolStatusReport> {
        let registry = self.registry.snapshot();

        let checks = registry.entries().iter().map(|entry| async move {
            let healthy = self.check_endpoint_health(&entry.endpoint).await;
            let checked_at = self
                .health
                .get(&entry.endpoint)
                .map(|h| h.last_check)
                .unwrap_or_else(Utc::now);
            ToolStatusReport {
                entry: entry.clone(),
                healthy,
                checked_at,
            }
        });

        join_all(checks).await
    }

    /// Reload the registry from its source and swap it in
    ///
    /// On failure the previous registry stays in place and the error is returned.
    pub async fn refresh_registry(&self) -> Result<usize, RouterError> {
        let _guard = self.refresh_lock.lock().await;

        let entries = self.source.load().await.map_err(|e: RegistryError| {
            warn!(
                "[Router] Registry refresh from {} failed, keeping {} existing tools: {}",
                self.source.describe(),
                self.registry.snapshot().len(),
                e
            );
            e
        })?;

        let count = entries.len();
        let previous = self.registry.replace(Registry::new(entries));
        info!(
            "[Router] Registry refreshed from {}: {} tools (was {})",
            self.source.describe(),
            count,
            previous.len()
        );

        Ok(count)
    }
}
