//! Fractional ordering for drag-and-drop lists.
//!
//! ## Module Map
//!
//! | Module    | Responsibility                                             |
//! |-----------|------------------------------------------------------------|
//! | `key`     | Pure key arithmetic: `insertion_key`, bounds, renumbering  |
//! | `models`  | `OrderedItem`, `CollectionView`, `DropEvent`, `MoveTarget` |
//! | `plan`    | Relocate an item in memory and pick its new key            |
//! | `store`   | `OrderStore` trait: list items, update one key             |
//! | `memory`  | In-process `MemoryStore`                                   |
//! | `reorder` | `Reorderer`: optimistic apply, persist, resync on failure  |
//!
//! ## Typical flow (drop an item at index 1)
//!
//! 1. `Reorderer::move_item(&mut view, &DropEvent::to_index(id, 1))`
//! 2. `plan::plan_move()` relocates the item and calls
//!    `key::insertion_key(prev, next)`; if the result does not fit strictly
//!    between the neighbours the plan renumbers the whole list instead.
//! 3. The view takes the planned order immediately.
//! 4. `OrderStore::update_sort_keys()` writes the changed keys.
//! 5. If that fails, `OrderStore::list_items()` replaces the view.

pub mod key;
pub mod memory;
pub mod models;
pub mod plan;
pub mod reorder;
pub mod store;

pub use key::{APPEND_GAP, DEFAULT_KEY, RENUMBER_STEP, insertion_key};
pub use memory::MemoryStore;
pub use models::{CollectionView, DropEvent, MoveTarget, OrderedItem};
pub use plan::{MovePlan, OrderingPolicy, plan_move};
pub use reorder::{MoveOutcome, Reorderer};
pub use store::OrderStore;
