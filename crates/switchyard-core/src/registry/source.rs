//! Registry sources
//!
//! Each source returns the complete, validated list of entries on every
//! `load`. Sources do not cache; the router owns the loaded snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::validation::{parse_registry_json, parse_registry_value, validate_entries};
use super::RegistryError;
use crate::config::RegistryLocation;
use crate::domain::ToolRegistryEntry;

/// Source of truth for the tool registry
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Load the full registry
    async fn load(&self) -> Result<Vec<ToolRegistryEntry>, RegistryError>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Build the source named by configuration
pub fn source_for(location: &RegistryLocation) -> Arc<dyn RegistrySource> {
    match location {
        RegistryLocation::File(path) => Arc::new(FileRegistrySource::new(path.clone())),
        RegistryLocation::Url(url) => Arc::new(HttpRegistrySource::new(url.clone())),
        RegistryLocation::None => Arc::new(StaticRegistrySource::default()),
    }
}

/// Registry stored as a JSON file on disk
pub struct FileRegistrySource {
    path: PathBuf,
}

impl FileRegistrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistrySource for FileRegistrySource {
    async fn load(&self) -> Result<Vec<ToolRegistryEntry>, RegistryError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| RegistryError::Io {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                })?;

        let entries = parse_registry_json(&content)?;
        debug!(
            "[Registry] Read {} entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Registry served as JSON over HTTP
pub struct HttpRegistrySource {
    url: String,
    client: reqwest::Client,
}

impl HttpRegistrySource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Switchyard/1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn load(&self) -> Result<Vec<ToolRegistryEntry>, RegistryError> {
        info!("[Registry] Fetching registry from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status.as_u16()));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;

        parse_registry_value(value)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Fixed in-memory registry
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrySource {
    entries: Vec<ToolRegistryEntry>,
}

impl StaticRegistrySource {
    pub fn new(entries: Vec<ToolRegistryEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RegistrySource for StaticRegistrySource {
    async fn load(&self) -> Result<Vec<ToolRegistryEntry>, RegistryError> {
        validate_entries(&self.entries)?;
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}
