use serde::{Deserialize, Serialize};

use crate::ordering::OrderedItem;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: i64,
    pub collection: String,
    pub title: String,
    pub sort_key: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl Item {
    pub fn to_ordered(&self) -> OrderedItem {
        OrderedItem::new(self.id.to_string(), self.sort_key)
    }
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionSummary {
    pub name: String,
    pub item_count: i64,
}
