//! Dependency edges between cells.
//!
//! Edges live on the cells themselves as position sets:
//!
//! ```text
//! A.outgoing ∋ B   ⇔   B.incoming ∋ A   ⇔   "A reads B"
//! ```
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** the two sets are exact inverses.
//! 2. **Acyclic:** no cell reads itself, directly or transitively.
//!    `would_create_cycle` is checked before every `replace_edges`.
//! 3. **Edge targets exist:** every position in an `outgoing` set holds a
//!    cell, materialized as an empty placeholder if never written.

use rustc_hash::FxHashSet;

use crate::position::Position;
use crate::storage::CellStore;

/// Would `cell` reading `new_refs` close a loop?
///
/// Walks backward along existing "is read by" edges starting at `cell`. Reaching
/// any cell `cell` is about to read means that cell already depends on `cell`.
/// Referenced positions that hold no cell have no dependents and cannot take
/// part in a cycle, except `cell` itself.
pub(crate) fn would_create_cycle(store: &CellStore, cell: Position, new_refs: &[Position]) -> bool {
    let targets: FxHashSet<Position> = new_refs
        .iter()
        .copied()
        .filter(|pos| store.contains(*pos))
        .collect();
    if targets.is_empty() {
        return false;
    }

    let mut visited: FxHashSet<Position> = FxHashSet::default();
    let mut stack = vec![cell];
    visited.insert(cell);

    while let Some(current) = stack.pop() {
        if targets.contains(&current) {
            return true;
        }
        let Some(node) = store.get(current) else {
            continue;
        };
        for &dependent in &node.incoming {
            if visited.insert(dependent) {
                stack.push(dependent);
            }
        }
    }

    false
}

/// Replace all outgoing edges of `cell` atomically.
///
/// 1. Removes `cell` from its old referents' `incoming` sets
/// 2. Materializes placeholders for referents that hold no cell yet
/// 3. Adds `cell` to every new referent's `incoming` set
/// 4. Stores the new `outgoing` set
///
/// Pass an empty slice to clear all edges. The caller must have ruled out
/// cycles and `cell` must exist.
///
/// Returns the old referents `cell` no longer reads; the caller decides
/// whether any of them is now an orphaned placeholder.
pub(crate) fn replace_edges(
    store: &mut CellStore,
    cell: Position,
    new_refs: &[Position],
) -> Vec<Position> {
    let old_refs = match store.get_mut(cell) {
        Some(node) => std::mem::take(&mut node.outgoing),
        None => return Vec::new(),
    };

    // Step 1: Remove old edges
    for pred in &old_refs {
        if let Some(node) = store.get_mut(*pred) {
            node.incoming.remove(&cell);
        }
    }

    // Steps 2-3: Add new edges
    let mut outgoing = FxHashSet::default();
    for &pred in new_refs {
        if store.ensure(pred) {
            log::trace!("{}: placeholder created for reference from {}", pred, cell);
        }
        if let Some(node) = store.get_mut(pred) {
            node.incoming.insert(cell);
        }
        outgoing.insert(pred);
    }

    log::trace!(
        "{}: edges replaced ({} removed, {} added)",
        cell,
        old_refs.len(),
        outgoing.len()
    );

    let released: Vec<Position> = old_refs
        .into_iter()
        .filter(|pred| !outgoing.contains(pred))
        .collect();

    // Step 4: Store new precedents
    if let Some(node) = store.get_mut(cell) {
        node.outgoing = outgoing;
    }
    released
}

/// Drop the cached value of `cell` and of every cell that transitively reads it.
///
/// `cell` itself is always invalidated. A dependent whose cache is already
/// invalid is not expanded: a valid cache is only ever computed from valid
/// inputs, so nothing downstream of an invalid cache can still be valid.
/// Returns the number of dependents whose cache was dropped.
pub(crate) fn invalidate(store: &mut CellStore, cell: Position) -> usize {
    let mut stack: Vec<Position> = match store.get_mut(cell) {
        Some(node) => {
            node.content_mut().invalidate_cache();
            node.incoming.iter().copied().collect()
        }
        None => return 0,
    };

    let mut invalidated = 0;
    while let Some(current) = stack.pop() {
        let Some(node) = store.get_mut(current) else {
            continue;
        };
        if !node.content_mut().invalidate_cache() {
            continue;
        }
        invalidated += 1;
        stack.extend(node.incoming.iter().copied());
    }

    if invalidated > 0 {
        log::trace!("{}: invalidated {} dependent caches", cell, invalidated);
    }
    invalidated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a1: &str) -> Position {
        Position::from_a1(a1).unwrap()
    }

    /// Store with `edges` already linked, each (reader, read) pair.
    fn store_with(edges: &[(&str, &[&str])]) -> CellStore {
        let mut store = CellStore::default();
        for (reader, reads) in edges {
            let reader = pos(reader);
            store.ensure(reader);
            let refs: Vec<Position> = reads.iter().map(|a| pos(a)).collect();
            replace_edges(&mut store, reader, &refs);
        }
        store
    }

    fn incoming(store: &CellStore, a1: &str) -> Vec<Position> {
        let mut v: Vec<Position> = store.get(pos(a1)).unwrap().incoming.iter().copied().collect();
        v.sort();
        v
    }

    #[test]
    fn test_replace_edges_links_both_directions() {
        let store = store_with(&[("A1", &["B1", "C1"])]);
        let a1 = store.get(pos("A1")).unwrap();
        assert!(a1.outgoing.contains(&pos("B1")));
        assert!(a1.outgoing.contains(&pos("C1")));
        assert_eq!(incoming(&store, "B1"), vec![pos("A1")]);
        assert_eq!(incoming(&store, "C1"), vec![pos("A1")]);
    }

    #[test]
    fn test_replace_edges_creates_placeholders() {
        let store = store_with(&[("A1", &["D4"])]);
        let d4 = store.get(pos("D4")).unwrap();
        assert!(d4.is_empty());
        assert!(d4.is_referenced());
    }

    #[test]
    fn test_replace_edges_removes_old_edges() {
        let mut store = store_with(&[("A1", &["B1"])]);
        replace_edges(&mut store, pos("A1"), &[pos("C1")]);
        assert!(incoming(&store, "B1").is_empty());
        assert_eq!(incoming(&store, "C1"), vec![pos("A1")]);
        // Old placeholder is kept; reclaiming is the sheet's job
        assert!(store.contains(pos("B1")));
    }

    #[test]
    fn test_replace_edges_reports_released_referents() {
        let mut store = store_with(&[("A1", &["B1", "C1"])]);
        let mut released = replace_edges(&mut store, pos("A1"), &[pos("C1"), pos("D1")]);
        released.sort();
        assert_eq!(released, vec![pos("B1")]);

        let released = replace_edges(&mut store, pos("A1"), &[]);
        assert_eq!(released.len(), 2);
    }

    #[test]
    fn test_replace_edges_with_empty_clears() {
        let mut store = store_with(&[("A1", &["B1"])]);
        replace_edges(&mut store, pos("A1"), &[]);
        assert!(store.get(pos("A1")).unwrap().outgoing.is_empty());
        assert!(incoming(&store, "B1").is_empty());
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let mut store = CellStore::default();
        store.ensure(pos("A1"));
        assert!(would_create_cycle(&store, pos("A1"), &[pos("A1")]));
    }

    #[test]
    fn test_transitive_cycle() {
        // A1 reads B1, B1 reads C1. C1 reading A1 would close the loop.
        let store = store_with(&[("A1", &["B1"]), ("B1", &["C1"])]);
        assert!(would_create_cycle(&store, pos("C1"), &[pos("A1")]));
        assert!(would_create_cycle(&store, pos("C1"), &[pos("B1")]));
        assert!(!would_create_cycle(&store, pos("C1"), &[pos("D1")]));
    }

    #[test]
    fn test_diamond_is_not_cycle() {
        // A1 reads B1 and C1, both read D1.
        let store = store_with(&[("A1", &["B1", "C1"]), ("B1", &["D1"]), ("C1", &["D1"])]);
        assert!(!would_create_cycle(&store, pos("D1"), &[pos("E1")]));
        assert!(!would_create_cycle(&store, pos("E1"), &[pos("A1"), pos("D1")]));
        assert!(would_create_cycle(&store, pos("D1"), &[pos("E1"), pos("A1")]));
    }

    #[test]
    fn test_unallocated_refs_cannot_cycle() {
        let mut store = CellStore::default();
        store.ensure(pos("A1"));
        assert!(!would_create_cycle(&store, pos("A1"), &[pos("Z99")]));
    }
}
