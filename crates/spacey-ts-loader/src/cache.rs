// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache keyed by canonical URL
//!
//! Every URL owns one slot. The first task to reach a slot builds the record;
//! concurrent tasks for the same URL wait on the slot and receive the same
//! record. A failed build leaves the slot empty so a later import retries.

use crate::module_record::ModuleRecord;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Per-URL future slot
pub type ModuleSlot = Arc<OnceCell<ModuleRecord>>;

/// Thread-safe, append-only module cache
#[derive(Debug, Default)]
pub struct ModuleCache {
    slots: DashMap<String, ModuleSlot>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Slot for `url`, created on first use
    pub fn slot(&self, url: &str) -> ModuleSlot {
        if let Some(slot) = self.slots.get(url) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        )
    }

    /// Get a finished module by URL
    pub fn get(&self, url: &str) -> Option<ModuleRecord> {
        self.slots.get(url).and_then(|slot| slot.get().cloned())
    }

    /// Check if a finished module is cached
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// URLs of all finished modules
    pub fn urls(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Get the number of finished modules
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Check if the cache holds no finished module
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_record::SyntheticModule;

    fn synthetic(url: &str) -> ModuleRecord {
        ModuleRecord::Synthetic(Arc::new(SyntheticModule::new(url, Vec::new(), |_| Ok(()))))
    }

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = ModuleCache::new();
        assert!(cache.is_empty());

        let slot = cache.slot("lodash");
        assert!(!cache.contains("lodash"));
        assert!(cache.urls().is_empty());

        slot.get_or_init(|| async { synthetic("lodash") }).await;
        assert!(cache.contains("lodash"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.urls(), vec!["lodash".to_string()]);
    }

    #[tokio::test]
    async fn test_same_slot_for_same_url() {
        let cache = ModuleCache::new();
        let a = cache.slot("file:///app/a.ts");
        let b = cache.slot("file:///app/a.ts");
        assert!(Arc::ptr_eq(&a, &b));

        let first = a
            .get_or_init(|| async { synthetic("file:///app/a.ts") })
            .await
            .clone();
        let second = b
            .get_or_init(|| async { synthetic("file:///app/a.ts") })
            .await
            .clone();
        assert!(first.ptr_eq(&second));
    }
}
