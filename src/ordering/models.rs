use serde::{Deserialize, Serialize};

/// One entry of an ordered collection as seen by the reorder flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub id: String,
    pub sort_key: f64,
}

impl OrderedItem {
    pub fn new(id: impl Into<String>, sort_key: f64) -> Self {
        Self {
            id: id.into(),
            sort_key,
        }
    }
}

/// Stable ascending sort by key. Equal keys keep their incoming order,
/// which every store supplies as insertion order.
pub fn sort_items(items: &mut [OrderedItem]) {
    items.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
}

/// The list currently displayed for one collection.
///
/// Owned by a single controller (an API request, a CLI invocation); the
/// reorder flow mutates it optimistically and replaces it on resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionView {
    pub collection: String,
    pub items: Vec<OrderedItem>,
}

impl CollectionView {
    pub fn new(collection: impl Into<String>, mut items: Vec<OrderedItem>) -> Self {
        sort_items(&mut items);
        Self {
            collection: collection.into(),
            items,
        }
    }

    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == item_id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }
}

/// A drop reported by the UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub item_id: String,
    pub target: MoveTarget,
}

impl DropEvent {
    pub fn to_index(item_id: impl Into<String>, target_index: usize) -> Self {
        Self {
            item_id: item_id.into(),
            target: MoveTarget::Index(target_index),
        }
    }

    pub fn between(
        item_id: impl Into<String>,
        prev: Option<String>,
        next: Option<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            target: MoveTarget::Between { prev, next },
        }
    }
}

/// Where the moved item should land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    /// Index within the displayed list after the move.
    Index(usize),
    /// Ids of the intended neighbours. `prev` wins when both are given.
    Between {
        prev: Option<String>,
        next: Option<String>,
    },
}
