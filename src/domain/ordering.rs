//! Pure ordering functions over the board's lists.
//!
//! Every move is expressed as "remove at `source_index`, insert at
//! `destination_index`" where the destination is an index into the list as it
//! looks *after* the removal. Destinations past the end are clamped to an
//! append; sources past the end are an error.

use crate::domain::mutation::SiblingPosition;
use crate::error::{DndError, Result};

/// Moves the item at `source_index` to `destination_index` within one list.
///
/// Items between the two indices shift by one position. O(n).
///
/// # Examples
/// ```
/// use kanban_dnd_core::domain::ordering::reorder_within_list;
///
/// let list = vec!["A", "B", "C"];
/// let reordered = reorder_within_list(list, 2, 0).unwrap();
/// assert_eq!(reordered, vec!["C", "A", "B"]);
/// ```
pub fn reorder_within_list<T>(mut list: Vec<T>, source_index: usize, destination_index: usize) -> Result<Vec<T>> {
    if source_index >= list.len() {
        return Err(DndError::IndexOutOfBounds {
            index: source_index,
            len: list.len(),
        });
    }

    let item = list.remove(source_index);
    let destination = clamp_index(destination_index, list.len());
    list.insert(destination, item);
    Ok(list)
}

/// Moves the item at `source_index` of `source` into `destination` at
/// `destination_index`, returning both new lists.
///
/// Relative order of every untouched item is preserved in both lists.
pub fn move_across_lists<T>(
    mut source: Vec<T>,
    mut destination: Vec<T>,
    source_index: usize,
    destination_index: usize,
) -> Result<(Vec<T>, Vec<T>)> {
    if source_index >= source.len() {
        return Err(DndError::IndexOutOfBounds {
            index: source_index,
            len: source.len(),
        });
    }

    let item = source.remove(source_index);
    let destination_index = clamp_index(destination_index, destination.len());
    destination.insert(destination_index, item);
    Ok((source, destination))
}

/// Dense 0..n-1 positions for ids in list order
pub fn dense_positions<I, S>(ids: I) -> Vec<SiblingPosition>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| SiblingPosition {
            id: id.into(),
            position: index as i64,
        })
        .collect()
}

/// Clamps an insertion index to `0..=len`
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len)
}

/// Checks that `positions` is strictly increasing (a total order with no duplicates)
pub fn is_strictly_ordered(positions: &[i64]) -> bool {
    positions.windows(2).all(|pair| pair[0] < pair[1])
}
