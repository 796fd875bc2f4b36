//! Property-based tests for spec.md §8 invariants 1 (arena membership /
//! ancestor-exclusion), 4 (topological soundness), 6 (partial-id
//! resolution), and 7 (build idempotence).

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use revision_graph::map::EdgeSet;
use revision_graph::{resolve, traverse, Revision, RevisionMap};

/// Build an acyclic-by-construction provider from a list of (down_mask,
/// deps_mask) bytes: node `i`'s `down`/`deps` can only reference nodes
/// `0..i`, so no cycle is representable regardless of mask values.
fn acyclic_provider(masks: &[(u8, u8)]) -> Vec<Revision> {
    let mut revisions = Vec::with_capacity(masks.len());
    for (i, &(down_mask, deps_mask)) in masks.iter().enumerate() {
        let id = format!("n{i}");
        let mut down = Vec::new();
        let mut deps = Vec::new();
        let reach = i.min(8);
        for j in 0..reach {
            if down_mask & (1 << j) != 0 {
                down.push(format!("n{j}"));
            }
        }
        for j in 0..reach {
            // Keep deps disjoint from down so a parent isn't double-wired
            // through two different roles on the same edge.
            let candidate = format!("n{j}");
            if deps_mask & (1 << j) != 0 && !down.contains(&candidate) {
                deps.push(candidate);
            }
        }
        revisions.push(Revision::new(id, down, deps, ()).unwrap());
    }
    revisions
}

fn masks_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((any::<u8>(), any::<u8>()), 1..10)
}

/// Direct parents of `id` (down ∪ resolved_deps), via the public API.
fn parents_of(map: &RevisionMap, id: &str) -> Vec<Arc<str>> {
    let mut parents: Vec<Arc<str>> = map.revision(id).map(|r| r.down().to_vec()).unwrap_or_default();
    parents.extend(map.resolved_deps(id).unwrap_or(&[]).iter().cloned());
    parents
}

/// Ancestors of `id` strictly excluding itself: the full-view reachable set
/// from `id`'s direct parents.
fn strict_ancestors(map: &RevisionMap, id: &str) -> BTreeSet<Arc<str>> {
    traverse::walk(map, &parents_of(map, id), EdgeSet::Full).unwrap().into_iter().collect()
}

fn structurally_equal(a: &RevisionMap, b: &RevisionMap) -> bool {
    let sorted = |s: &[Arc<str>]| -> Vec<Arc<str>> {
        let mut v = s.to_vec();
        v.sort();
        v
    };
    if sorted(a.heads()) != sorted(b.heads())
        || sorted(a.real_heads()) != sorted(b.real_heads())
        || sorted(a.bases()) != sorted(b.bases())
        || sorted(a.real_bases()) != sorted(b.real_bases())
    {
        return false;
    }
    let mut ids: BTreeSet<Arc<str>> = BTreeSet::new();
    ids.extend(a.heads().iter().cloned());
    ids.extend(a.bases().iter().cloned());
    ids.extend(a.real_heads().iter().cloned());
    for id in &ids {
        if sorted(a.resolved_deps(id).unwrap_or(&[])) != sorted(b.resolved_deps(id).unwrap_or(&[]))
            || sorted(a.normalized_deps(id).unwrap_or(&[])) != sorted(b.normalized_deps(id).unwrap_or(&[]))
            || sorted(a.nextrev(id).unwrap_or(&[])) != sorted(b.nextrev(id).unwrap_or(&[]))
            || sorted(a.all_nextrev(id).unwrap_or(&[])) != sorted(b.all_nextrev(id).unwrap_or(&[]))
        {
            return false;
        }
    }
    true
}

proptest! {
    /// Invariant 1: every built revision is findable by its own id, every
    /// normalized-dep id is present in the map, and no revision is its own
    /// strict ancestor.
    #[test]
    fn arena_membership_and_acyclicity(masks in masks_strategy()) {
        let provider = acyclic_provider(&masks);
        let (map, _warnings) = RevisionMap::build(provider).unwrap();
        for i in 0..masks.len() {
            let id = format!("n{i}");
            let id_arc: Arc<str> = Arc::from(id.as_str());
            prop_assert_eq!(map.revision(&id).map(|r| r.id().clone()), Some(id_arc.clone()));
            for dep in map.normalized_deps(&id).unwrap_or(&[]) {
                prop_assert!(map.contains_id(dep));
            }
            prop_assert!(!strict_ancestors(&map, &id).contains(&id_arc));
        }
    }

    /// Invariant 4: `topological_sort` returns a permutation of its input,
    /// and every in-scope parent precedes its child in the output.
    #[test]
    fn topological_sort_is_a_sound_permutation(masks in masks_strategy()) {
        let provider = acyclic_provider(&masks);
        let (map, _warnings) = RevisionMap::build(provider).unwrap();

        let ids: Vec<Arc<str>> = (0..masks.len()).map(|i| Arc::from(format!("n{i}"))).collect();
        let scope: BTreeSet<Arc<str>> = ids.iter().cloned().collect();
        let sorted = traverse::topological_sort(&map, &ids);

        let mut got = sorted.clone();
        got.sort();
        let mut want = ids.clone();
        want.sort();
        prop_assert_eq!(got, want);

        let position = |id: &Arc<str>| sorted.iter().position(|p| p == id).unwrap();
        for id in &ids {
            for parent in parents_of(&map, id) {
                if scope.contains(&parent) {
                    prop_assert!(position(&parent) < position(id));
                }
            }
        }
    }

    /// Invariant 6: a prefix long enough to uniquely identify a revision
    /// resolves to it; a too-short prefix with no exact match fails.
    #[test]
    fn partial_id_resolves_unique_prefix(
        suffix_a in "[a-z]{4,8}",
        suffix_b in "[a-z]{4,8}",
    ) {
        // "anch1"/"anch2" diverge at the 5th character, so "anch1" alone is
        // already a unique 5-character prefix for `id_a` regardless of the
        // random suffixes.
        let id_a = format!("anch1{suffix_a}");
        let id_b = format!("anch2{suffix_b}");
        let provider = vec![
            Revision::new(id_a.clone(), (), (), ()).unwrap(),
            Revision::new(id_b, (), (), ()).unwrap(),
        ];
        let (map, _warnings) = RevisionMap::build(provider).unwrap();

        let unique_prefix = &id_a[..5];
        let resolved = resolve::resolve_literal(&map, unique_prefix).unwrap();
        prop_assert_eq!(&*resolved, id_a.as_str());

        let too_short = &id_a[..3];
        prop_assert!(resolve::resolve_literal(&map, too_short).is_err());
    }

    /// Invariant 7: building twice from equal provider output yields
    /// structurally equal maps.
    #[test]
    fn build_is_idempotent(masks in masks_strategy()) {
        let provider_a = acyclic_provider(&masks);
        let provider_b = acyclic_provider(&masks);
        let (map_a, _) = RevisionMap::build(provider_a).unwrap();
        let (map_b, _) = RevisionMap::build(provider_b).unwrap();
        prop_assert!(structurally_equal(&map_a, &map_b));
    }
}
