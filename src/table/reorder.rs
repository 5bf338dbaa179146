//! Drag-and-drop row repositioning

use crate::error::{GrimoireError, Result};
use crate::model::RecordId;
use std::collections::HashSet;

/// Compute the row order after moving `moved` to `target`
///
/// `target` is an offset into the rows that remain once the moved rows
/// are taken out. The moved rows keep their relative order and are
/// inserted as one block; an offset past the end appends them.
///
/// The request is rejected, with no partial effect, unless `moved` is a
/// strict subset of `current`: it must be non-empty, free of repeats,
/// known to `current` and leave at least one row behind.
pub fn reorder(current: &[RecordId], moved: &[RecordId], target: usize) -> Result<Vec<RecordId>> {
    if moved.is_empty() {
        return Err(GrimoireError::InvalidReorderRequest(
            "no rows selected".to_string(),
        ));
    }

    let moved_set: HashSet<RecordId> = moved.iter().copied().collect();
    if moved_set.len() != moved.len() {
        return Err(GrimoireError::InvalidReorderRequest(
            "selection repeats a row".to_string(),
        ));
    }
    let known: HashSet<RecordId> = current.iter().copied().collect();
    if let Some(unknown) = moved.iter().find(|id| !known.contains(id)) {
        return Err(GrimoireError::InvalidReorderRequest(format!(
            "row {} is not in the table",
            unknown
        )));
    }
    if moved_set.len() == known.len() {
        return Err(GrimoireError::InvalidReorderRequest(
            "cannot move every row".to_string(),
        ));
    }

    let remaining: Vec<RecordId> = current
        .iter()
        .copied()
        .filter(|id| !moved_set.contains(id))
        .collect();
    let block: Vec<RecordId> = current
        .iter()
        .copied()
        .filter(|id| moved_set.contains(id))
        .collect();
    let split = target.min(remaining.len());

    let mut order = Vec::with_capacity(current.len());
    order.extend_from_slice(&remaining[..split]);
    order.extend_from_slice(&block);

    let mut placed: HashSet<RecordId> = order.iter().copied().collect();
    for id in &remaining[split..] {
        if placed.insert(*id) {
            order.push(*id);
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<RecordId> {
        raw.iter().copied().map(RecordId).collect()
    }

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;
    const D: u64 = 4;
    const E: u64 = 5;

    #[test]
    fn test_move_into_middle() {
        let order = reorder(&ids(&[A, B, C, D, E]), &ids(&[B, D]), 1).unwrap();
        assert_eq!(order, ids(&[A, B, D, C, E]));
    }

    #[test]
    fn test_move_to_front() {
        let order = reorder(&ids(&[A, B, C, D, E]), &ids(&[D, E]), 0).unwrap();
        assert_eq!(order, ids(&[D, E, A, B, C]));
    }

    #[test]
    fn test_move_to_back() {
        let current = ids(&[A, B, C, D, E]);
        assert_eq!(reorder(&current, &ids(&[A, C]), 3).unwrap(), ids(&[B, D, E, A, C]));
        assert_eq!(reorder(&current, &ids(&[A, C]), 100).unwrap(), ids(&[B, D, E, A, C]));
    }

    #[test]
    fn test_block_keeps_table_order() {
        let order = reorder(&ids(&[A, B, C, D, E]), &ids(&[D, B]), 2).unwrap();
        assert_eq!(order, ids(&[A, C, B, D, E]));
    }

    #[test]
    fn test_move_onto_itself_is_noop() {
        let current = ids(&[A, B, C, D, E]);
        assert_eq!(reorder(&current, &ids(&[B, C]), 1).unwrap(), current);
    }

    #[test]
    fn test_rejects_moving_every_row() {
        let current = ids(&[A, B, C]);
        let err = reorder(&current, &ids(&[C, A, B]), 0).unwrap_err();
        assert!(matches!(err, GrimoireError::InvalidReorderRequest(_)));
        assert!(reorder(&ids(&[A]), &ids(&[A]), 0).is_err());
    }

    #[test]
    fn test_rejects_invalid_requests() {
        let current = ids(&[A, B, C]);
        for (moved, target) in [(ids(&[]), 0), (ids(&[B, B]), 1), (ids(&[A, 42]), 0)] {
            let err = reorder(&current, &moved, target).unwrap_err();
            assert!(matches!(err, GrimoireError::InvalidReorderRequest(_)));
        }
    }
}
