use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default BigQuery REST root
pub const DEFAULT_ANALYTICAL_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Default Firestore REST root
pub const DEFAULT_DOCUMENT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// HTTP timeout for a single BigQuery request
pub const DEFAULT_ANALYTICAL_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP timeout for a single Firestore request
pub const DEFAULT_DOCUMENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Kind of data-access target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Relational,
    Analytical,
    Document,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "relational" | "postgres" | "sql" => Some(BackendKind::Relational),
            "analytical" | "bigquery" | "warehouse" => Some(BackendKind::Analytical),
            "document" | "firestore" => Some(BackendKind::Document),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Relational => write!(f, "relational"),
            BackendKind::Analytical => write!(f, "analytical"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

/// Connection parameters for a pooled relational database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalSpec {
    /// Connection string (postgres://... or sqlite://...)
    pub url: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Optional per-query timeout
    pub query_timeout: Option<Duration>,
}

impl RelationalSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            query_timeout: None,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

/// Parameters for the analytical warehouse client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticalSpec {
    pub project: String,
    pub token: String,
    pub location: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl AnalyticalSpec {
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            token: token.into(),
            location: "US".to_string(),
            endpoint: DEFAULT_ANALYTICAL_ENDPOINT.to_string(),
            request_timeout: DEFAULT_ANALYTICAL_REQUEST_TIMEOUT,
        }
    }
}

/// Parameters for the document-store client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSpec {
    pub project: String,
    pub token: String,
    /// Namespace the client is scoped to
    pub database: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl DocumentSpec {
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            token: token.into(),
            database: "(default)".to_string(),
            endpoint: DEFAULT_DOCUMENT_ENDPOINT.to_string(),
            request_timeout: DEFAULT_DOCUMENT_REQUEST_TIMEOUT,
        }
    }
}

/// A configured backend, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    Relational { name: String, spec: RelationalSpec },
    Analytical { name: String, spec: AnalyticalSpec },
    Document { name: String, spec: DocumentSpec },
}

impl BackendSpec {
    pub fn name(&self) -> &str {
        match self {
            BackendSpec::Relational { name, .. } => name,
            BackendSpec::Analytical { name, .. } => name,
            BackendSpec::Document { name, .. } => name,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSpec::Relational { .. } => BackendKind::Relational,
            BackendSpec::Analytical { .. } => BackendKind::Analytical,
            BackendSpec::Document { .. } => BackendKind::Document,
        }
    }
}
