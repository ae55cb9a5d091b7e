//! Process-wide configuration
//!
//! All settings come from environment-style key/value pairs. `from_env`
//! reads the process environment; `from_vars` takes explicit pairs so tests
//! and embedders never touch global state.
//!
//! A backend with missing or malformed parameters is logged and omitted so
//! one misconfigured backend never blocks the others. Router keys with
//! malformed values fall back to their defaults.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::domain::{AnalyticalSpec, BackendKind, BackendSpec, DocumentSpec, RelationalSpec};

const PREFIX: &str = "SWITCHYARD_";

/// Tables the generic insert/select helpers may touch unless overridden
pub const DEFAULT_ALLOWED_TABLES: &[&str] =
    &["users", "properties", "campaigns", "operations", "audit_logs"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("backend '{backend}' is missing required key {key}")]
    MissingKey { backend: String, key: String },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("backend '{backend}' has unknown kind '{kind}'")]
    UnknownKind { backend: String, kind: String },
}

/// Where the tool registry is loaded from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegistryLocation {
    File(PathBuf),
    Url(String),
    #[default]
    None,
}

/// Settings consumed by the integration router
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Bearer credential for Gateway calls
    pub gateway_token: Option<String>,
    /// Default dispatch timeout
    pub timeout: Duration,
    pub health_timeout: Duration,
    /// Freshness window for cached health observations
    pub health_ttl: Duration,
    pub health_cache_capacity: usize,
    pub refresh_interval: Duration,
    pub registry: RegistryLocation,
    /// Explicit fallback substitutions, in declaration order
    pub fallbacks: Vec<(String, String)>,
    /// `metadata.source` in the Gateway envelope
    pub source: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            gateway_token: None,
            timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
            health_ttl: Duration::from_secs(60),
            health_cache_capacity: 1024,
            refresh_interval: Duration::from_secs(3600),
            registry: RegistryLocation::None,
            fallbacks: Vec::new(),
            source: "switchyard".to_string(),
        }
    }
}

impl RouterSettings {
    pub fn with_gateway_token(mut self, token: impl Into<String>) -> Self {
        self.gateway_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_ttl(mut self, ttl: Duration) -> Self {
        self.health_ttl = ttl;
        self
    }

    pub fn with_fallback(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.fallbacks.push((from.into(), to.into()));
        self
    }
}

/// Settings consumed by the connection pool manager
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Declared backends; names are unique
    pub backends: Vec<BackendSpec>,
    pub allowed_tables: Vec<String>,
    /// HTTP timeout for REST backends that do not set their own
    pub request_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            allowed_tables: DEFAULT_ALLOWED_TABLES.iter().map(|t| t.to_string()).collect(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchyardConfig {
    pub router: RouterSettings,
    pub pool: PoolSettings,
}

impl SwitchyardConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load from explicit key/value pairs
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(PREFIX))
            .collect();
        let vars = Vars(vars);

        Self {
            router: vars.router_settings(),
            pool: vars.pool_settings(),
        }
    }
}

struct Vars(HashMap<String, String>);

impl Vars {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&format!("{}{}", PREFIX, key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
                key: format!("{}{}", PREFIX, key),
                value: raw.to_string(),
            }),
        }
    }

    /// Parse a router key, falling back to the default on malformed input
    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.parse(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                warn!("[Config] {}; using default", e);
                default
            }
        }
    }

    fn router_settings(&self) -> RouterSettings {
        let defaults = RouterSettings::default();

        let registry = if let Some(path) = self.get("REGISTRY_PATH") {
            RegistryLocation::File(PathBuf::from(path))
        } else if let Some(url) = self.get("REGISTRY_URL") {
            RegistryLocation::Url(url.to_string())
        } else {
            RegistryLocation::None
        };

        RouterSettings {
            gateway_token: self.get("GATEWAY_TOKEN").map(str::to_string),
            timeout: Duration::from_millis(
                self.parse_or("TIMEOUT_MS", defaults.timeout.as_millis() as u64),
            ),
            health_timeout: Duration::from_millis(
                self.parse_or("HEALTH_TIMEOUT_MS", defaults.health_timeout.as_millis() as u64),
            ),
            health_ttl: Duration::from_secs(
                self.parse_or("HEALTH_TTL_SECS", defaults.health_ttl.as_secs()),
            ),
            health_cache_capacity: self
                .parse_or("HEALTH_CACHE_CAPACITY", defaults.health_cache_capacity)
                .max(1),
            refresh_interval: Duration::from_secs(
                self.parse_or("REFRESH_INTERVAL_SECS", defaults.refresh_interval.as_secs())
                    .max(1),
            ),
            registry,
            fallbacks: self.get("FALLBACKS").map(parse_fallbacks).unwrap_or_default(),
            source: self
                .get("SOURCE")
                .map(str::to_string)
                .unwrap_or(defaults.source),
        }
    }

    fn pool_settings(&self) -> PoolSettings {
        let mut settings = PoolSettings::default();

        if let Some(tables) = self.get("ALLOWED_TABLES") {
            settings.allowed_tables = split_list(tables).map(str::to_lowercase).collect();
        }

        settings.request_timeout = match self.parse::<u64>("REQUEST_TIMEOUT_SECS") {
            Ok(secs) => secs.map(Duration::from_secs),
            Err(e) => {
                warn!("[Config] {}; using backend defaults", e);
                None
            }
        };

        let Some(declared) = self.get("BACKENDS") else {
            return settings;
        };

        for item in split_list(declared) {
            let (name, kind) = item.split_once(':').unwrap_or((item, "relational"));
            let name = name.trim();
            if settings.backends.iter().any(|b| b.name() == name) {
                warn!("[Config] Skipping duplicate backend '{}'", name);
                continue;
            }
            match self.backend_spec(name, kind.trim(), settings.request_timeout) {
                Ok(spec) => settings.backends.push(spec),
                Err(e) => warn!("[Config] Skipping backend '{}': {}", name, e),
            }
        }

        settings
    }

    fn backend_spec(
        &self,
        name: &str,
        kind: &str,
        request_timeout: Option<Duration>,
    ) -> Result<BackendSpec, ConfigError> {
        let kind = BackendKind::parse(kind).ok_or_else(|| ConfigError::UnknownKind {
            backend: name.to_string(),
            kind: kind.to_string(),
        })?;
        let scope = backend_scope(name);
        let required = |key: &str| -> Result<String, ConfigError> {
            let full = format!("{}_{}", scope, key);
            self.get(&full)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingKey {
                    backend: name.to_string(),
                    key: format!("{}{}", PREFIX, full),
                })
        };
        let optional = |key: &str| self.get(&format!("{}_{}", scope, key)).map(str::to_string);
        let request_timeout = self
            .parse::<u64>(&format!("{}_REQUEST_TIMEOUT_SECS", scope))?
            .map(Duration::from_secs)
            .or(request_timeout);

        let spec = match kind {
            BackendKind::Relational => {
                let mut spec = RelationalSpec::new(required("URL")?);
                if let Some(max) = self.parse::<u32>(&format!("{}_MAX_CONNECTIONS", scope))? {
                    spec.max_connections = max.max(1);
                }
                if let Some(secs) = self.parse::<u64>(&format!("{}_IDLE_TIMEOUT_SECS", scope))? {
                    spec.idle_timeout = Duration::from_secs(secs);
                }
                if let Some(secs) = self.parse::<u64>(&format!("{}_CONNECT_TIMEOUT_SECS", scope))? {
                    spec.connect_timeout = Duration::from_secs(secs);
                }
                spec.query_timeout = self
                    .parse::<u64>(&format!("{}_QUERY_TIMEOUT_SECS", scope))?
                    .map(Duration::from_secs);
                BackendSpec::Relational {
                    name: name.to_string(),
                    spec,
                }
            }
            BackendKind::Analytical => {
                let mut spec = AnalyticalSpec::new(required("PROJECT")?, required("TOKEN")?);
                if let Some(location) = optional("LOCATION") {
                    spec.location = location;
                }
                if let Some(endpoint) = optional("ENDPOINT") {
                    spec.endpoint = endpoint;
                }
                if let Some(timeout) = request_timeout {
                    spec.request_timeout = timeout;
                }
                BackendSpec::Analytical {
                    name: name.to_string(),
                    spec,
                }
            }
            BackendKind::Document => {
                let mut spec = DocumentSpec::new(required("PROJECT")?, required("TOKEN")?);
                if let Some(database) = optional("DATABASE") {
                    spec.database = database;
                }
                if let Some(endpoint) = optional("ENDPOINT") {
                    spec.endpoint = endpoint;
                }
                if let Some(timeout) = request_timeout {
                    spec.request_timeout = timeout;
                }
                BackendSpec::Document {
                    name: name.to_string(),
                    spec,
                }
            }
        };

        Ok(spec)
    }
}

/// Key scope for a backend name: upper-cased, `-` replaced by `_`
fn backend_scope(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_fallbacks(raw: &str) -> Vec<(String, String)> {
    split_list(raw)
        .filter_map(|pair| match pair.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Some((from.trim().to_string(), to.trim().to_string()))
            }
            _ => {
                warn!("[Config] Ignoring malformed fallback pair '{}'", pair);
                None
            }
        })
        .collect()
}
