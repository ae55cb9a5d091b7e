//! Registry snapshot and its atomic holder
//!
//! A `Registry` is immutable once built. `RegistryStore` publishes the current
//! snapshot behind a single pointer; a refresh builds the replacement first
//! and swaps it in, so readers see either the old registry or the new one,
//! never a partial one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_core::{tool_key, ToolRegistryEntry};

/// Ordered tool entries with a lower-cased name index
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<ToolRegistryEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build from entries already validated for unique names
    pub fn new(entries: Vec<ToolRegistryEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key(), i))
            .collect();
        Self { entries, index }
    }

    /// Case-insensitive lookup
    pub fn get(&self, tool: &str) -> Option<&ToolRegistryEntry> {
        self.index
            .get(&tool_key(tool))
            .map(|&i| &self.entries[i])
    }

    /// Entries in registry order
    pub fn entries(&self) -> &[ToolRegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holder for the current registry snapshot
#[derive(Debug, Default)]
pub struct RegistryStore {
    current: RwLock<Arc<Registry>>,
}

impl RegistryStore {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current snapshot; stays valid even if a refresh swaps in a new one
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.read().clone()
    }

    /// Publish a fully built registry, returning the one it replaced
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let next = Arc::new(registry);
        std::mem::replace(&mut *self.current.write(), next)
    }
}
