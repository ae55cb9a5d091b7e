//! Registry document parsing and validation
//!
//! A document is either a bare JSON array of entries or an object with a
//! `tools` array. Validation is all-or-nothing: one bad entry rejects the
//! whole document.

use std::collections::HashSet;

use serde::Deserialize;

use super::RegistryError;
use crate::domain::ToolRegistryEntry;

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    List(Vec<ToolRegistryEntry>),
    Wrapped { tools: Vec<ToolRegistryEntry> },
}

/// Parse and validate a registry document
pub fn parse_registry_json(json: &str) -> Result<Vec<ToolRegistryEntry>, RegistryError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;
    parse_registry_value(value)
}

pub fn parse_registry_value(
    value: serde_json::Value,
) -> Result<Vec<ToolRegistryEntry>, RegistryError> {
    let entries = match serde_json::from_value::<RegistryDocument>(value)
        .map_err(|e| RegistryError::Parse(e.to_string()))?
    {
        RegistryDocument::List(entries) => entries,
        RegistryDocument::Wrapped { tools } => tools,
    };

    validate_entries(&entries)?;
    Ok(entries)
}

/// Check names are present and unique (case-insensitively) and endpoints are absolute http(s) URLs
pub fn validate_entries(entries: &[ToolRegistryEntry]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.tool.trim().is_empty() {
            return Err(RegistryError::Invalid("entry with empty tool name".to_string()));
        }

        if !seen.insert(entry.key()) {
            return Err(RegistryError::Invalid(format!(
                "duplicate tool name '{}'",
                entry.tool
            )));
        }

        match url::Url::parse(&entry.endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(RegistryError::Invalid(format!(
                    "tool '{}' has invalid endpoint '{}'",
                    entry.tool, entry.endpoint
                )))
            }
        }
    }

    Ok(())
}
