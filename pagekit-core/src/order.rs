//! Sibling ordering.
//!
//! `order` values only need to be totally ordered among siblings; ties fall
//! back to storage index. Reordering exchanges two values instead of
//! renumbering the whole list.

use crate::tree::{find_by_id, find_parent_of, siblings_mut};
use crate::{BuilderError, BuilderResult, Element, ElementId};

/// Siblings sorted for display: by `order`, then by storage index.
#[must_use]
pub fn ordered(siblings: &[Element]) -> Vec<&Element> {
    let mut sorted: Vec<_> = siblings.iter().collect();
    // Stable sort keeps storage order for equal keys.
    sorted.sort_by_key(|e| e.order);
    sorted
}

/// The order value for an element appended after `siblings`.
#[must_use]
pub fn next_order(siblings: &[Element]) -> i64 {
    siblings
        .iter()
        .map(|e| e.order)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Id of the container holding `id`, or `None` for a root.
///
/// # Errors
///
/// Returns [`BuilderError::ElementNotFound`] if `id` is not in the forest.
pub fn parent_of(roots: &[Element], id: &str) -> BuilderResult<Option<ElementId>> {
    if find_by_id(roots, id).is_none() {
        return Err(BuilderError::ElementNotFound(id.to_string()));
    }
    Ok(find_parent_of(roots, id).map(|p| p.id.clone()))
}

/// Exchange the `order` of two siblings in place.
///
/// Both ids must resolve to the same parent (or both be roots). Nothing is
/// touched when the check fails.
///
/// # Errors
///
/// Returns [`BuilderError::ElementNotFound`] for an unknown id and
/// [`BuilderError::SiblingMismatch`] when the parents differ.
pub fn swap_orders(roots: &mut Vec<Element>, first: &str, second: &str) -> BuilderResult<()> {
    let first_parent = parent_of(roots, first)?;
    let second_parent = parent_of(roots, second)?;
    if first_parent != second_parent {
        return Err(BuilderError::SiblingMismatch {
            first: first.to_string(),
            second: second.to_string(),
        });
    }

    let siblings = siblings_mut(roots, first_parent.as_ref())
        .ok_or_else(|| BuilderError::ParentNotFound(format!("{first_parent:?}")))?;
    let a = index_of(siblings, first)?;
    let b = index_of(siblings, second)?;

    let (order_a, order_b) = (siblings[a].order, siblings[b].order);
    siblings[a].order = order_b;
    siblings[b].order = order_a;
    Ok(())
}

/// Put back the two order values a swap of `first` and `second` exchanged.
///
/// After the swap `first` held `second_value` and `second` held
/// `first_value`. Later swaps may have moved those values to other siblings,
/// so the exchange goes to whichever siblings hold them now, preferring the
/// original pair on ties.
///
/// # Errors
///
/// Returns [`BuilderError::ElementNotFound`] when both elements are gone or
/// neither value is held by any sibling.
pub(crate) fn exchange_order_values(
    roots: &mut Vec<Element>,
    first: &str,
    second: &str,
    first_value: i64,
    second_value: i64,
) -> BuilderResult<()> {
    let anchor = if find_by_id(roots, first).is_some() {
        first
    } else {
        second
    };
    let parent = parent_of(roots, anchor)?;
    let siblings = siblings_mut(roots, parent.as_ref())
        .ok_or_else(|| BuilderError::ParentNotFound(format!("{parent:?}")))?;

    let holds_second = holder_of(siblings, second_value, first)?;
    let holds_first = holder_of(siblings, first_value, second)?;
    siblings[holds_second].order = first_value;
    siblings[holds_first].order = second_value;
    Ok(())
}

fn holder_of(siblings: &[Element], value: i64, preferred: &str) -> BuilderResult<usize> {
    siblings
        .iter()
        .position(|e| e.id == preferred && e.order == value)
        .or_else(|| siblings.iter().position(|e| e.order == value))
        .ok_or_else(|| BuilderError::ElementNotFound(format!("sibling with order {value}")))
}

fn index_of(siblings: &[Element], id: &str) -> BuilderResult<usize> {
    siblings
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))
}
