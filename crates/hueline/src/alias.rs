//! Friendly names for resources.
//!
//! An [`AliasTable`] is resolved once from a startup snapshot and then shared
//! read-only with every handler.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::models::{BridgeResource, Resource};

/// Alias name to resource, resolved from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, Arc<Resource>>,
}

impl AliasTable {
    /// Bind every alias in `alias_map` (resource id to alias name) to the
    /// snapshot resource with that id.
    ///
    /// When two resources claim the same alias, the later one in snapshot
    /// order wins. Ids that are not in the snapshot are left unbound.
    pub fn resolve(snapshot: &[Resource], alias_map: &HashMap<String, String>) -> Self {
        let mut entries: HashMap<String, Arc<Resource>> = HashMap::new();
        let mut found = HashSet::new();

        for resource in snapshot {
            let Some(alias) = alias_map.get(resource.id()) else {
                continue;
            };
            found.insert(resource.id());
            if let Some(previous) = entries.insert(alias.clone(), Arc::new(resource.clone())) {
                warn!(
                    alias = %alias,
                    previous = previous.id(),
                    current = resource.id(),
                    "alias bound twice, keeping the later resource"
                );
            }
        }

        for (id, alias) in alias_map {
            if !found.contains(id.as_str()) {
                warn!(alias = %alias, id = %id, "aliased resource not found on the bridge");
            }
        }

        debug!(bound = entries.len(), requested = alias_map.len(), "aliases resolved");
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.entries.get(name).map(Arc::as_ref)
    }

    /// Shared handle to the aliased resource.
    pub fn get_arc(&self, name: &str) -> Option<Arc<Resource>> {
        self.entries.get(name).cloned()
    }

    /// Typed lookup; `None` if unbound or of another type.
    pub fn get_as<R: BridgeResource>(&self, name: &str) -> Option<&R> {
        self.get(name)?.downcast_ref::<R>()
    }

    /// Bound alias names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.entries
            .iter()
            .map(|(name, resource)| (name.as_str(), resource.as_ref()))
    }
}
