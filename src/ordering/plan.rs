//! Move planning over an in-memory ordered list.
//!
//! Planning is pure: it relocates the moved item, derives its new key from
//! the neighbours in the relocated list, and decides whether the slot still
//! has room. Persisting the result is the reorder flow's job.

use super::key::{
    APPEND_GAP, DEFAULT_KEY, RENUMBER_STEP, fits_between, gap_exhausted, insertion_key_with,
    renumbered_keys,
};
use super::models::{MoveTarget, OrderedItem};
use crate::errors::OrderingError;

/// Tunables for key assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderingPolicy {
    pub default_key: f64,
    pub append_gap: f64,
    pub renumber_step: f64,
    /// Minimum neighbour gap before a move triggers a full renumber.
    pub rekey_epsilon: f64,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self {
            default_key: DEFAULT_KEY,
            append_gap: APPEND_GAP,
            renumber_step: RENUMBER_STEP,
            rekey_epsilon: 1e-6,
        }
    }
}

/// Result of planning one move.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    pub item_id: String,
    pub from_index: usize,
    pub to_index: usize,
    /// The list after the move, with new keys already applied.
    pub order: Vec<OrderedItem>,
    /// Key assigned to the moved item.
    pub key: f64,
    pub prev_key: Option<f64>,
    pub next_key: Option<f64>,
    /// The slot had no room; `order` carries a full renumber.
    pub needs_renumber: bool,
    /// Keys that must be persisted, in list order.
    pub writes: Vec<(String, f64)>,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Remove `item_id` and reinsert it at `to_index` (clamped to the end).
/// Returns the new list and the item's original index.
pub fn relocate(
    items: &[OrderedItem],
    item_id: &str,
    to_index: usize,
) -> Result<(Vec<OrderedItem>, usize), OrderingError> {
    let from = items
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| OrderingError::ItemNotFound {
            item_id: item_id.to_string(),
        })?;
    let mut order = items.to_vec();
    let moved = order.remove(from);
    let to = to_index.min(order.len());
    order.insert(to, moved);
    Ok((order, from))
}

/// Keys of the items immediately before and after `index`.
pub fn neighbour_keys(order: &[OrderedItem], index: usize) -> (Option<f64>, Option<f64>) {
    let prev = index
        .checked_sub(1)
        .and_then(|i| order.get(i))
        .map(|i| i.sort_key);
    let next = order.get(index + 1).map(|i| i.sort_key);
    (prev, next)
}

/// Resolve a target to the moved item's index in the final list.
pub fn resolve_target(
    items: &[OrderedItem],
    item_id: &str,
    target: &MoveTarget,
) -> Result<usize, OrderingError> {
    let last = items.len().saturating_sub(1);
    match target {
        MoveTarget::Index(i) => Ok((*i).min(last)),
        MoveTarget::Between { prev, next } => {
            let remaining: Vec<&OrderedItem> = items.iter().filter(|i| i.id != item_id).collect();
            let find = |id: &str| {
                remaining
                    .iter()
                    .position(|i| i.id == id)
                    .ok_or_else(|| OrderingError::NeighbourNotFound {
                        item_id: id.to_string(),
                    })
            };
            match (prev, next) {
                (Some(p), Some(n)) => {
                    let idx = find(p)? + 1;
                    find(n)?;
                    Ok(idx)
                }
                (Some(p), None) => Ok(find(p)? + 1),
                (None, Some(n)) => find(n),
                (None, None) => Ok(0),
            }
        }
    }
}

/// Plan moving `item_id` to `target` within the displayed `items`.
pub fn plan_move(
    items: &[OrderedItem],
    item_id: &str,
    target: &MoveTarget,
    policy: &OrderingPolicy,
) -> Result<MovePlan, OrderingError> {
    let to = resolve_target(items, item_id, target)?;
    let (mut order, from) = relocate(items, item_id, to)?;

    if from == to {
        let key = order[to].sort_key;
        let (prev_key, next_key) = neighbour_keys(&order, to);
        return Ok(MovePlan {
            item_id: item_id.to_string(),
            from_index: from,
            to_index: to,
            order,
            key,
            prev_key,
            next_key,
            needs_renumber: false,
            writes: Vec::new(),
        });
    }

    let (prev_key, next_key) = neighbour_keys(&order, to);
    let candidate =
        insertion_key_with(prev_key, next_key, policy.append_gap, policy.default_key);
    let needs_renumber = !fits_between(candidate, prev_key, next_key)
        || gap_exhausted(prev_key, next_key, policy.rekey_epsilon);

    let writes = if needs_renumber {
        renumber_in_place(&mut order, policy.renumber_step, Some(item_id))
    } else {
        order[to].sort_key = candidate;
        vec![(item_id.to_string(), candidate)]
    };

    Ok(MovePlan {
        item_id: item_id.to_string(),
        from_index: from,
        to_index: to,
        key: order[to].sort_key,
        order,
        prev_key,
        next_key,
        needs_renumber,
        writes,
    })
}

/// Rewrite every key with evenly spaced values, keeping list order.
/// Returns the `(id, key)` pairs whose value changed; `always` is included
/// regardless.
pub fn renumber_in_place(
    order: &mut [OrderedItem],
    step: f64,
    always: Option<&str>,
) -> Vec<(String, f64)> {
    let keys = renumbered_keys(order.len(), step);
    let mut writes = Vec::new();
    for (item, key) in order.iter_mut().zip(keys) {
        let forced = always.is_some_and(|id| id == item.id);
        if item.sort_key != key || forced {
            item.sort_key = key;
            writes.push((item.id.clone(), key));
        }
    }
    writes
}
