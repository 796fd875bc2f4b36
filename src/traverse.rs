//! Graph traversal primitives (spec.md §4.4): a checked DFS walk and a
//! deterministic topological sort. Grounded on
//! `alembic/script/revision.py::_iterate_related_revisions` and
//! `topological_sort`; cross-checked against the independent, simpler
//! traversal in `examples/original_source/tree.py`.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::RevisionError;
use crate::map::{EdgeSet, RevisionMap};

/// DFS over `starts`, following `edges`, visiting each reachable id exactly
/// once. Fails with [`RevisionError::BrokenMap`] if `edges` names an id the
/// map doesn't contain (per spec.md §4.4; in practice this can't happen
/// through the public API since dangling edges are dropped at build time,
/// but the check is kept for defense against a hand-built [`RevisionMap`]).
pub fn walk(map: &RevisionMap, starts: &[Arc<str>], edges: EdgeSet) -> Result<Vec<Arc<str>>, RevisionError> {
    let mut seen: BTreeSet<Arc<str>> = BTreeSet::new();
    let mut stack: Vec<Arc<str>> = starts.to_vec();
    let mut order = Vec::new();

    while let Some(id) = stack.pop() {
        if seen.contains(&id) {
            continue;
        }
        if !map.contains_id(&id) {
            return Err(RevisionError::BrokenMap);
        }
        seen.insert(id.clone());
        order.push(id.clone());
        for next in map.edge_ids_pub(&id, edges) {
            if !seen.contains(&next) {
                stack.push(next);
            }
        }
    }
    Ok(order)
}

/// As [`walk`], but additionally rejects overlapping reachability: if two
/// distinct entries of `starts` can each reach some third node (other than
/// themselves), that's an ambiguous range and this returns
/// [`RevisionError::Overlap`]. Used by the planners to catch a caller
/// passing overlapping current/target sets.
pub fn walk_checked(
    map: &RevisionMap,
    starts: &[Arc<str>],
    edges: EdgeSet,
) -> Result<Vec<Arc<str>>, RevisionError> {
    let mut seen: BTreeSet<Arc<str>> = BTreeSet::new();
    let mut order = Vec::new();
    let start_set: BTreeSet<Arc<str>> = starts.iter().cloned().collect();

    for start in starts {
        let mut per_target: BTreeSet<Arc<str>> = BTreeSet::new();
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            per_target.insert(id.clone());
            if seen.contains(&id) {
                continue;
            }
            if !map.contains_id(&id) {
                return Err(RevisionError::BrokenMap);
            }
            seen.insert(id.clone());
            order.push(id.clone());
            for next in map.edge_ids_pub(&id, edges) {
                stack.push(next);
            }
        }
        let overlaps: Vec<Arc<str>> = per_target
            .intersection(&start_set)
            .filter(|id| *id != start)
            .cloned()
            .collect();
        if !overlaps.is_empty() {
            return Err(RevisionError::Overlap { target: start.clone(), overlaps });
        }
    }
    Ok(order)
}

/// Kahn-style topological sort over `down ∪ resolved_deps`, restricted to
/// `ids`. Ties are broken lexicographically by id, giving deterministic
/// output (spec.md §4.4). Reverse the result for a reverse-topological
/// order (the downgrade planner does this).
pub fn topological_sort(map: &RevisionMap, ids: &[Arc<str>]) -> Vec<Arc<str>> {
    let scope: BTreeSet<Arc<str>> = ids.iter().cloned().collect();

    // in_degree counts predecessor edges restricted to `scope`.
    let mut in_degree: FxHashMap<Arc<str>, usize> = FxHashMap::default();
    for id in &scope {
        in_degree.insert(id.clone(), 0);
    }
    for id in &scope {
        for pred in map.edge_ids_pub(id, EdgeSet::Full) {
            if scope.contains(&pred) {
                *in_degree.get_mut(id).unwrap() += 1;
            }
        }
    }

    let mut ready: BTreeSet<Arc<str>> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut remaining = in_degree;
    let mut out = Vec::with_capacity(scope.len());

    while let Some(id) = ready.iter().next().cloned() {
        ready.remove(&id);
        out.push(id.clone());
        for succ in map.edge_ids_pub(&id, EdgeSet::AllNextRev) {
            if !scope.contains(&succ) {
                continue;
            }
            if let Some(deg) = remaining.get_mut(&succ) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(succ);
                }
            }
        }
    }
    out
}
