use anyhow::Result;
use async_trait::async_trait;

use super::models::OrderedItem;

/// Persistent ordered-list backend.
///
/// Implementations return items in ascending key order with equal keys in
/// insertion order, and persist exactly the key field on update.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Read every item of `collection`, ascending by key.
    async fn list_items(&self, collection: &str) -> Result<Vec<OrderedItem>>;

    /// Persist a new key for one item.
    async fn update_sort_key(&self, collection: &str, item_id: &str, key: f64) -> Result<()>;

    /// Persist several keys. The default issues one update per pair and
    /// stops at the first failure.
    async fn update_sort_keys(&self, collection: &str, writes: &[(String, f64)]) -> Result<()> {
        for (item_id, key) in writes {
            self.update_sort_key(collection, item_id, *key).await?;
        }
        Ok(())
    }

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
