//! Optimistic move flow.
//!
//! 1. Take the collection's lock so reindex-and-persist never interleaves
//!    on one collection.
//! 2. Plan the move and apply the new order to the caller's view at once.
//! 3. Persist only the moved key, or every changed key after a renumber.
//! 4. On a failed write, put back the previous keys of a multi-key batch
//!    (stores may have committed part of it), throw the optimistic order
//!    away and reload the view from the store. The move is not retried.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::models::{CollectionView, DropEvent, OrderedItem};
use super::plan::{OrderingPolicy, plan_move, renumber_in_place};
use super::store::OrderStore;
use crate::errors::OrderingError;

/// What a move ended up doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Dropped at its current position; nothing written.
    Unchanged,
    /// One key written.
    Applied { item_id: String, key: f64 },
    /// The slot had no room; the collection was renumbered.
    Renumbered {
        item_id: String,
        key: f64,
        written: usize,
    },
    /// The write failed and the view was reloaded from the store.
    Resynced { reason: String },
}

/// Holds one collection's lock. The map entry is dropped once no other
/// task holds or waits on it, so the map only tracks collections in use.
struct CollectionGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    collection: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CollectionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.collection, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Applies moves against an [`OrderStore`], serialized per collection.
pub struct Reorderer<S> {
    store: Arc<S>,
    policy: OrderingPolicy,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: OrderStore> Reorderer<S> {
    pub fn new(store: Arc<S>, policy: OrderingPolicy) -> Self {
        Self {
            store,
            policy,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &OrderingPolicy {
        &self.policy
    }

    async fn lock_collection(&self, collection: &str) -> CollectionGuard<'_> {
        let lock = self
            .locks
            .entry(collection.to_string())
            .or_default()
            .value()
            .clone();
        CollectionGuard {
            locks: &self.locks,
            collection: collection.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Fetch the authoritative list for `collection`.
    pub async fn load(&self, collection: &str) -> Result<CollectionView, OrderingError> {
        let items = self
            .store
            .list_items(collection)
            .await
            .map_err(OrderingError::Store)?;
        debug!(
            collection,
            count = items.len(),
            backend = self.store.backend(),
            "loaded collection"
        );
        Ok(CollectionView::new(collection, items))
    }

    /// Move one item within a view the caller already holds.
    pub async fn move_item(
        &self,
        view: &mut CollectionView,
        event: &DropEvent,
    ) -> Result<MoveOutcome, OrderingError> {
        let _guard = self.lock_collection(&view.collection).await;
        self.move_locked(view, event).await
    }

    /// Load the collection and move one item in it, under a single lock
    /// hold. Returns the outcome and the resulting view.
    pub async fn move_fresh(
        &self,
        collection: &str,
        event: &DropEvent,
    ) -> Result<(MoveOutcome, CollectionView), OrderingError> {
        let _guard = self.lock_collection(collection).await;
        let mut view = self.load(collection).await?;
        let outcome = self.move_locked(&mut view, event).await?;
        Ok((outcome, view))
    }

    async fn move_locked(
        &self,
        view: &mut CollectionView,
        event: &DropEvent,
    ) -> Result<MoveOutcome, OrderingError> {
        let plan = plan_move(&view.items, &event.item_id, &event.target, &self.policy)?;
        if plan.is_noop() {
            return Ok(MoveOutcome::Unchanged);
        }

        // Optimistic: the view shows the new order before the store answers.
        let previous = std::mem::replace(&mut view.items, plan.order.clone());

        match self
            .store
            .update_sort_keys(&view.collection, &plan.writes)
            .await
        {
            Ok(()) if plan.needs_renumber => {
                info!(
                    collection = %view.collection,
                    item_id = %plan.item_id,
                    written = plan.writes.len(),
                    "slot exhausted; collection renumbered"
                );
                Ok(MoveOutcome::Renumbered {
                    item_id: plan.item_id,
                    key: plan.key,
                    written: plan.writes.len(),
                })
            }
            Ok(()) => {
                info!(
                    collection = %view.collection,
                    item_id = %plan.item_id,
                    from = plan.from_index,
                    to = plan.to_index,
                    key = plan.key,
                    "item moved"
                );
                Ok(MoveOutcome::Applied {
                    item_id: plan.item_id,
                    key: plan.key,
                })
            }
            Err(e) => {
                let reason = format!("failed to persist order: {:#}", e);
                warn!(
                    collection = %view.collection,
                    item_id = %plan.item_id,
                    error = %e,
                    "move not persisted; reloading"
                );
                self.roll_back(&view.collection, &plan.writes, &previous).await;
                self.resync(view, previous, reason).await
            }
        }
    }

    /// Rewrite the pre-move key of every item in `writes`. A single failed
    /// write committed nothing, so only batches need this.
    async fn roll_back(
        &self,
        collection: &str,
        writes: &[(String, f64)],
        previous: &[OrderedItem],
    ) {
        if writes.len() < 2 {
            return;
        }
        let restore: Vec<(String, f64)> = writes
            .iter()
            .filter_map(|(id, _)| previous.iter().find(|item| &item.id == id))
            .map(|item| (item.id.clone(), item.sort_key))
            .collect();
        match self.store.update_sort_keys(collection, &restore).await {
            Ok(()) => debug!(collection, restored = restore.len(), "previous keys restored"),
            Err(e) => warn!(
                collection,
                error = %e,
                "could not restore previous keys; store may hold a partial batch"
            ),
        }
    }

    async fn resync(
        &self,
        view: &mut CollectionView,
        previous: Vec<OrderedItem>,
        reason: String,
    ) -> Result<MoveOutcome, OrderingError> {
        match self.store.list_items(&view.collection).await {
            Ok(items) => {
                *view = CollectionView::new(view.collection.clone(), items);
                Ok(MoveOutcome::Resynced { reason })
            }
            Err(source) => {
                // Without a fresh list the pre-move order is the best local copy.
                view.items = previous;
                Err(OrderingError::Resync { reason, source })
            }
        }
    }

    /// Rewrite every key of the view's collection with even spacing.
    /// Returns how many keys were written.
    pub async fn renumber(&self, view: &mut CollectionView) -> Result<usize, OrderingError> {
        let _guard = self.lock_collection(&view.collection).await;

        let mut order = view.items.clone();
        let writes = renumber_in_place(&mut order, self.policy.renumber_step, None);
        if writes.is_empty() {
            return Ok(0);
        }
        match self.store.update_sort_keys(&view.collection, &writes).await {
            Ok(()) => {
                view.items = order;
                info!(collection = %view.collection, written = writes.len(), "collection renumbered");
                Ok(writes.len())
            }
            Err(e) => {
                let reason = format!("failed to renumber: {:#}", e);
                warn!(collection = %view.collection, error = %e, "renumber not persisted; reloading");
                let previous = view.items.clone();
                self.roll_back(&view.collection, &writes, &previous).await;
                match self.resync(view, previous, reason.clone()).await {
                    Ok(_) => Err(OrderingError::Store(anyhow::anyhow!(reason))),
                    Err(resync) => Err(resync),
                }
            }
        }
    }
}
