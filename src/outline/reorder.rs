//! Same-parent reordering by list position.
//!
//! One generic routine serves groupings, chapters, sub-chapters and any other
//! orderable list. The output is always a pure permutation of the input with
//! `order` renormalized to positional indices; nothing is created or dropped.

/// Move `list[src]` so it lands at index `dst`, returning the permuted list.
///
/// Returns `None` when either index is out of range (callers treat that as a
/// no-op, not an error).
pub fn move_item<T: Clone>(list: &[T], src: usize, dst: usize) -> Option<Vec<T>> {
    if src >= list.len() || dst >= list.len() {
        return None;
    }

    let mut next = list.to_vec();
    let moved = next.remove(src);
    next.insert(dst, moved);
    Some(next)
}

/// Reorder a sibling list and hand back `(id, new_order)` assignments with
/// orders renormalized to `0..len-1`.
///
/// `id_of` extracts the correlation key, so the same routine works for every
/// entity kind.
pub fn reorder_assignments<T: Clone>(
    list: &[T],
    src: usize,
    dst: usize,
    id_of: impl Fn(&T) -> String,
) -> Option<Vec<(String, u32)>> {
    let permuted = move_item(list, src, dst)?;
    Some(
        permuted
            .iter()
            .enumerate()
            .map(|(idx, item)| (id_of(item), idx as u32))
            .collect(),
    )
}
