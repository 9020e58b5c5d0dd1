// Ordering module - pure logic shared by the store and the reorder engine.
// No storage or document access here, so every rule is unit testable.

use std::collections::HashMap;

use crate::state::Entity;

/// Anything that can be placed in an id-ordered collection.
pub trait HasId {
    fn id(&self) -> &str;
}

impl HasId for Entity {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for String {
    fn id(&self) -> &str {
        self
    }
}

pub fn ids_of<T: HasId>(items: &[T]) -> Vec<String> {
    items.iter().map(|i| i.id().to_string()).collect()
}

/// Rebuilds `items` following `new_order`.
/// Returns true if the order changed, false otherwise.
///
/// Algorithm:
/// 1. Map existing items by ID for O(1) lookup
/// 2. Rebuild vector based on new_order (unknown ids are skipped)
/// 3. Append any items missing from new_order, keeping their relative order
pub fn apply_order<T: HasId>(items: &mut Vec<T>, new_order: &[String]) -> bool {
    if items.is_empty() || new_order.is_empty() {
        return false;
    }

    let old_order = ids_of(items);

    let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
    let index: HashMap<String, usize> = old_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();

    let mut reordered = Vec::with_capacity(slots.len());
    for id in new_order {
        if let Some(&i) = index.get(id) {
            if let Some(item) = slots[i].take() {
                reordered.push(item);
            }
        }
    }

    // Never drop an item the caller forgot to mention.
    reordered.extend(slots.into_iter().flatten());

    let changed = old_order != ids_of(&reordered);
    *items = reordered;
    changed
}

/// Which id a move could not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingId(pub String);

/// Removes `moved_id` and reinserts it immediately before `anchor_id`.
///
/// Returns `Ok(true)` when the order changed. Moving an item before itself,
/// or before the item that already follows it, is `Ok(false)`.
pub fn move_before<T: HasId>(
    items: &mut Vec<T>,
    moved_id: &str,
    anchor_id: &str,
) -> Result<bool, MissingId> {
    let from = items
        .iter()
        .position(|i| i.id() == moved_id)
        .ok_or_else(|| MissingId(moved_id.to_string()))?;
    if !items.iter().any(|i| i.id() == anchor_id) {
        return Err(MissingId(anchor_id.to_string()));
    }
    if moved_id == anchor_id {
        return Ok(false);
    }

    let item = items.remove(from);
    let to = items
        .iter()
        .position(|i| i.id() == anchor_id)
        .unwrap_or(items.len());
    items.insert(to, item);
    Ok(from != to)
}
