//! Static registry of demand-source adapters.
//!
//! Resolved once at startup: each adapter registers under its name, aliases
//! map alternate request-facing names onto a registered adapter, and the
//! registration index doubles as the deterministic tie-break order during
//! winner selection. No runtime reflection, no global state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::BidAdapter;

struct CatalogEntry {
    name: String,
    adapter: Arc<dyn BidAdapter>,
    enabled: bool,
}

/// A source resolved out of the catalog for one auction.
#[derive(Clone)]
pub struct ResolvedSource {
    /// The name the request used (may be an alias)
    pub requested: String,
    /// The canonical registered name
    pub canonical: String,
    /// Registration index; first-registered wins exact-price ties
    pub index: usize,
    pub adapter: Arc<dyn BidAdapter>,
}

/// Mapping of source names to adapter implementations.
#[derive(Default)]
pub struct BidderCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl BidderCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own name. Re-registering a name replaces
    /// the adapter but keeps the original registration index.
    pub fn register(&mut self, adapter: Arc<dyn BidAdapter>) {
        let name = adapter.name().to_string();
        log::info!("Registering demand source: {}", name);
        match self.by_name.get(&name) {
            Some(&index) => self.entries[index].adapter = adapter,
            None => {
                self.by_name.insert(name.clone(), self.entries.len());
                self.entries.push(CatalogEntry {
                    name,
                    adapter,
                    enabled: true,
                });
            }
        }
    }

    /// Map an alternate request-facing name onto a registered source.
    /// Diagnostics keep the alias; the canonical adapter does the work.
    pub fn register_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        let alias = alias.into();
        let canonical = canonical.into();
        if !self.by_name.contains_key(&canonical) {
            log::warn!(
                "Alias '{}' points at unregistered source '{}'",
                alias,
                canonical
            );
        }
        self.aliases.insert(alias, canonical);
    }

    /// Disable a source without unregistering it (keeps indices stable).
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(&index) = self.by_name.get(name) {
            self.entries[index].enabled = enabled;
        }
    }

    /// Resolve a request-facing name to its adapter, following one level of
    /// aliasing. Returns `None` for unknown or disabled sources.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> Option<ResolvedSource> {
        let canonical = self.aliases.get(requested).map_or(requested, String::as_str);
        let &index = self.by_name.get(canonical)?;
        let entry = &self.entries[index];
        if !entry.enabled {
            return None;
        }
        Some(ResolvedSource {
            requested: requested.to_string(),
            canonical: entry.name.clone(),
            index,
            adapter: Arc::clone(&entry.adapter),
        })
    }

    /// Whether the name resolves to a registered source or alias.
    #[must_use]
    pub fn is_valid_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Number of registered sources (aliases not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
