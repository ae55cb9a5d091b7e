use serde::{Deserialize, Serialize};
use std::fmt;

/// How calls to a tool are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationType {
    /// Routed through the central broker with an enveloped payload and credentials
    Gateway,
    /// Sent straight to the endpoint with the raw payload, marked as a fallback path
    Direct,
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationType::Gateway => write!(f, "Gateway"),
            IntegrationType::Direct => write!(f, "Direct"),
        }
    }
}

/// Operator-declared availability of a tool.
///
/// Orthogonal to observed endpoint health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Active,
    Disabled,
    Deprecated,
}

impl ToolStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ToolStatus::Active)
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Active => write!(f, "active"),
            ToolStatus::Disabled => write!(f, "disabled"),
            ToolStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// A single row of the router's tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRegistryEntry {
    /// Name callers use to address this integration (matched case-insensitively)
    pub tool: String,

    /// Delivery path
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,

    #[serde(default)]
    pub status: ToolStatus,

    /// HTTP target for this tool
    pub endpoint: String,

    /// Opaque correlation id attached to every outbound call
    #[serde(default)]
    pub doctrine_id: String,

    /// Opaque grouping tag, forwarded as a header
    #[serde(default)]
    pub branch: String,
}

impl ToolRegistryEntry {
    pub fn new(
        tool: impl Into<String>,
        integration_type: IntegrationType,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            integration_type,
            status: ToolStatus::Active,
            endpoint: endpoint.into(),
            doctrine_id: String::new(),
            branch: String::new(),
        }
    }

    pub fn gateway(tool: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(tool, IntegrationType::Gateway, endpoint)
    }

    pub fn direct(tool: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(tool, IntegrationType::Direct, endpoint)
    }

    pub fn with_status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_doctrine_id(mut self, doctrine_id: impl Into<String>) -> Self {
        self.doctrine_id = doctrine_id.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Registry key (trimmed, lower-cased tool name)
    pub fn key(&self) -> String {
        tool_key(&self.tool)
    }

    pub fn is_dispatchable(&self) -> bool {
        self.status.is_active()
    }

    /// Eligible as a default-tier fallback target
    pub fn is_direct_fallback(&self) -> bool {
        self.integration_type == IntegrationType::Direct && self.status.is_active()
    }
}

/// Normalize a tool name for case-insensitive lookup
pub fn tool_key(name: &str) -> String {
    name.trim().to_lowercase()
}
