//! Fallback selection
//!
//! Two tiers, checked in order:
//! 1. Explicit name-to-name substitutions (deterministic, operator intent)
//! 2. The first active Direct entry in registry order
//!
//! An explicit target that is missing or not active is skipped in favour of
//! the second tier. The failing tool itself is never selected.

use std::collections::HashMap;

use switchyard_core::ToolRegistryEntry;
use tracing::{debug, warn};

use super::registry::Registry;

#[derive(Debug, Clone, Default)]
pub struct FallbackPolicy {
    /// lower-cased source name -> target name
    explicit: HashMap<String, String>,
}

impl FallbackPolicy {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let explicit = pairs
            .into_iter()
            .map(|(from, to)| (from.as_ref().to_lowercase(), to.as_ref().to_string()))
            .collect();
        Self { explicit }
    }

    /// Explicit target for a tool, if one is declared
    pub fn explicit_target(&self, tool: &str) -> Option<&str> {
        self.explicit.get(&tool.to_lowercase()).map(|s| s.as_str())
    }

    /// Pick the fallback for `failed`, or `None` if no candidate exists
    pub fn resolve<'a>(
        &self,
        registry: &'a Registry,
        failed: &ToolRegistryEntry,
    ) -> Option<&'a ToolRegistryEntry> {
        let failed_key = failed.key();

        if let Some(target) = self.explicit_target(&failed.tool) {
            match registry.get(target) {
                Some(entry) if entry.is_dispatchable() && entry.key() != failed_key => {
                    debug!(
                        "[Router] Explicit fallback {} -> {}",
                        failed.tool, entry.tool
                    );
                    return Some(entry);
                }
                Some(entry) => warn!(
                    "[Router] Explicit fallback target '{}' for '{}' is not usable (status: {})",
                    entry.tool, failed.tool, entry.status
                ),
                None => warn!(
                    "[Router] Explicit fallback target '{}' for '{}' is not in the registry",
                    target, failed.tool
                ),
            }
        }

        registry
            .entries()
            .iter()
            .find(|e| e.is_direct_fallback() && e.key() != failed_key)
    }
}
