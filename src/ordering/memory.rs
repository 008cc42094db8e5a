use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::models::{OrderedItem, sort_items};
use super::store::OrderStore;

/// Process-local store. Used by tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<OrderedItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection's contents. Insertion order is the tie-break.
    pub fn seed(&self, collection: &str, items: Vec<OrderedItem>) -> Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;
        guard.insert(collection.to_string(), items);
        Ok(())
    }

    pub fn insert(&self, collection: &str, item: OrderedItem) -> Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;
        guard.entry(collection.to_string()).or_default().push(item);
        Ok(())
    }

    /// Current key of one item, if present.
    pub fn key_of(&self, collection: &str, item_id: &str) -> Option<f64> {
        let guard = self.collections.read().ok()?;
        guard
            .get(collection)?
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.sort_key)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_items(&self, collection: &str) -> Result<Vec<OrderedItem>> {
        let guard = self
            .collections
            .read()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;
        let mut items = guard.get(collection).cloned().unwrap_or_default();
        sort_items(&mut items);
        Ok(items)
    }

    async fn update_sort_key(&self, collection: &str, item_id: &str, key: f64) -> Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;
        let item = guard
            .get_mut(collection)
            .and_then(|items| items.iter_mut().find(|i| i.id == item_id))
            .ok_or_else(|| anyhow!("Item {} not found in {}", item_id, collection))?;
        item.sort_key = key;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
