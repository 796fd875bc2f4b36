//! The revision map: the arena, its indexes, and the single-pass builder
//! (spec.md §3, §4.2). Grounded on
//! `migration/src/revision.rs::RevisionGraph::try_from` for the
//! arena-plus-index shape, and on
//! `alembic/script/revision.py::RevisionMap._revision_map` /
//! `_detect_cycles` / `_map_branch_labels` / `_add_depends_on` /
//! `_normalize_depends_on` / `_add_branches` for exact algorithm semantics.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tinyvec::TinyVec;

use crate::error::BuildError;
use crate::revision::Revision;

/// A non-fatal defect found while building or extending a map (spec.md §7:
/// "missing edges encountered during build are warned only").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The same id was supplied by the provider more than once; the first
    /// insertion wins.
    DuplicateId(Arc<str>),
    /// A `down`/`deps` entry named a revision or label absent from the map;
    /// the edge is skipped.
    MissingEdgeTarget { from: Arc<str>, missing: Arc<str> },
}

/// Receives [`Warning`]s emitted during build. The default sink is a
/// `Vec<Warning>`; embedding applications that already have a logger can
/// implement this trait to forward warnings to it instead. This crate
/// carries no `log`/`tracing` dependency of its own, so warnings are
/// structured data the embedding application can render through whatever
/// logging it already uses.
pub trait WarningSink {
    fn warn(&mut self, warning: Warning);
}

impl WarningSink for Vec<Warning> {
    fn warn(&mut self, warning: Warning) {
        self.push(warning);
    }
}

/// The arena slot for one revision: the caller-supplied record plus every
/// field derived at build time (spec.md §3).
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) revision: Revision,
    pub(crate) resolved_deps: TinyVec<[Arc<str>; 1]>,
    pub(crate) normalized_deps: TinyVec<[Arc<str>; 1]>,
    pub(crate) nextrev: TinyVec<[Arc<str>; 2]>,
    pub(crate) all_nextrev: TinyVec<[Arc<str>; 2]>,
    pub(crate) effective_labels: TinyVec<[Arc<str>; 1]>,
}

impl Node {
    fn new(revision: Revision) -> Self {
        Node {
            revision,
            resolved_deps: TinyVec::new(),
            normalized_deps: TinyVec::new(),
            nextrev: TinyVec::new(),
            all_nextrev: TinyVec::new(),
            effective_labels: TinyVec::new(),
        }
    }

    pub(crate) fn is_head(&self) -> bool {
        self.nextrev.is_empty()
    }

    pub(crate) fn is_real_head(&self) -> bool {
        self.all_nextrev.is_empty()
    }

    pub(crate) fn is_branch_point(&self) -> bool {
        self.nextrev.len() > 1
    }

    pub(crate) fn is_real_branch_point(&self) -> bool {
        self.all_nextrev.len() > 1
    }
}

/// Which predecessor/successor relation a traversal should follow
/// (spec.md §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeSet {
    /// `down` only (the versioned view).
    Down,
    /// `down ∪ resolved_deps` (the full view).
    Full,
    /// `down ∪ normalized_deps`.
    Normalized,
    /// Forward versioned edges (`nextrev`).
    NextRev,
    /// Forward full edges (`all_nextrev`).
    AllNextRev,
}

/// The built revision graph: a flat arena of [`Node`]s plus the indexes
/// spec.md §3 calls for (`by_id`, `by_label`, `heads`/`real_heads`/
/// `bases`/`real_bases`). Immutable except through [`RevisionMap::add_revision`].
#[derive(Clone, Debug)]
pub struct RevisionMap {
    pub(crate) nodes: Vec<Node>,
    pub(crate) by_id: FxHashMap<Arc<str>, usize>,
    pub(crate) by_label: FxHashMap<Arc<str>, usize>,
    pub(crate) ids_sorted: BTreeSet<Arc<str>>,
    pub(crate) heads: Vec<Arc<str>>,
    pub(crate) real_heads: Vec<Arc<str>>,
    pub(crate) bases: Vec<Arc<str>>,
    pub(crate) real_bases: Vec<Arc<str>>,
}

impl RevisionMap {
    /// Build a map from a provider's output, collecting non-fatal
    /// [`Warning`]s into a plain `Vec`. Structural defects (label
    /// collisions, cycles) abort with [`BuildError`].
    pub fn build<I>(provider: I) -> Result<(RevisionMap, Vec<Warning>), BuildError>
    where
        I: IntoIterator<Item = Revision>,
    {
        let mut warnings = Vec::new();
        let map = Self::build_with_sink(provider, &mut warnings)?;
        Ok((map, warnings))
    }

    /// As [`RevisionMap::build`], but warnings are delivered to a
    /// caller-supplied [`WarningSink`] instead of accumulated in a `Vec`.
    pub fn build_with_sink<I>(
        provider: I,
        sink: &mut dyn WarningSink,
    ) -> Result<RevisionMap, BuildError>
    where
        I: IntoIterator<Item = Revision>,
    {
        let mut nodes: Vec<Node> = Vec::new();
        let mut by_id: FxHashMap<Arc<str>, usize> = FxHashMap::default();
        let mut ids_sorted: BTreeSet<Arc<str>> = BTreeSet::new();

        // Step 1: insert records, initialize heads/bases.
        let mut heads: BTreeSet<Arc<str>> = BTreeSet::new();
        let mut real_heads: BTreeSet<Arc<str>> = BTreeSet::new();
        let mut bases: Vec<Arc<str>> = Vec::new();
        let mut real_bases: Vec<Arc<str>> = Vec::new();

        for revision in provider {
            let id = revision.id().clone();
            if by_id.contains_key(&id) {
                sink.warn(Warning::DuplicateId(id));
                continue;
            }
            if revision.is_base() {
                bases.push(id.clone());
            }
            if revision.is_real_base() {
                real_bases.push(id.clone());
            }
            heads.insert(id.clone());
            real_heads.insert(id.clone());
            ids_sorted.insert(id.clone());

            let idx = nodes.len();
            by_id.insert(id, idx);
            nodes.push(Node::new(revision));
        }

        // Step 2: install branch labels.
        let mut by_label: FxHashMap<Arc<str>, usize> = FxHashMap::default();
        for idx in 0..nodes.len() {
            let labels: Vec<Arc<str>> = nodes[idx].revision.branch_labels().to_vec();
            for label in labels {
                if let Some(&existing) = by_id.get(&label) {
                    return Err(BuildError::LabelCollision {
                        label: label.clone(),
                        revision: nodes[idx].revision.id().clone(),
                        existing: nodes[existing].revision.id().clone(),
                    });
                }
                if let Some(&existing) = by_label.get(&label) {
                    return Err(BuildError::LabelCollision {
                        label: label.clone(),
                        revision: nodes[idx].revision.id().clone(),
                        existing: nodes[existing].revision.id().clone(),
                    });
                }
                by_label.insert(label, idx);
            }
        }

        // Step 3: resolve deps against by_id ∪ by_label.
        for idx in 0..nodes.len() {
            let deps: Vec<Arc<str>> = nodes[idx].revision.deps().to_vec();
            let mut resolved: TinyVec<[Arc<str>; 1]> = TinyVec::new();
            for dep in deps {
                if let Some(&target) = by_id.get(&dep) {
                    resolved.push(nodes[target].revision.id().clone());
                } else if let Some(&target) = by_label.get(&dep) {
                    resolved.push(nodes[target].revision.id().clone());
                } else {
                    sink.warn(Warning::MissingEdgeTarget {
                        from: nodes[idx].revision.id().clone(),
                        missing: dep,
                    });
                }
            }
            nodes[idx].resolved_deps = resolved;
        }

        // Step 4: wire forward edges, shrink heads/real_heads.
        for idx in 0..nodes.len() {
            let down: Vec<Arc<str>> = nodes[idx].revision.down().to_vec();
            let resolved_deps: Vec<Arc<str>> = nodes[idx].resolved_deps.to_vec();
            let self_id = nodes[idx].revision.id().clone();

            // A node whose `down` is non-empty but every entry is dangling
            // (warned about above) has no real versioned parent left once
            // the missing edge is dropped; treat it as an effective root so
            // it isn't mistaken for part of a cycle below.
            if !down.is_empty() && !down.iter().any(|p| by_id.contains_key(p)) {
                if !bases.contains(&self_id) {
                    bases.push(self_id.clone());
                }
                if resolved_deps.is_empty() && !real_bases.contains(&self_id) {
                    real_bases.push(self_id.clone());
                }
            }

            for p in down.iter().chain(resolved_deps.iter()) {
                let Some(&parent_idx) = by_id.get(p) else {
                    sink.warn(Warning::MissingEdgeTarget {
                        from: self_id.clone(),
                        missing: p.clone(),
                    });
                    continue;
                };
                if !nodes[parent_idx].all_nextrev.contains(&self_id) {
                    nodes[parent_idx].all_nextrev.push(self_id.clone());
                }
                real_heads.remove(p);
            }
            for p in &down {
                if let Some(&parent_idx) = by_id.get(p) {
                    if !nodes[parent_idx].nextrev.contains(&self_id) {
                        nodes[parent_idx].nextrev.push(self_id.clone());
                    }
                    heads.remove(p);
                }
            }
        }

        let mut map = RevisionMap {
            nodes,
            by_id,
            by_label,
            ids_sorted,
            heads: heads.into_iter().collect(),
            real_heads: real_heads.into_iter().collect(),
            bases,
            real_bases,
        };

        // Step 5: normalize dependencies.
        map.normalize_dependencies();

        // Step 6: cycle detection, versioned then full view.
        map.detect_cycles()?;

        // Step 7: propagate branch labels.
        map.propagate_labels();

        Ok(map)
    }

    fn normalize_dependencies(&mut self) {
        for idx in 0..self.nodes.len() {
            if self.nodes[idx].resolved_deps.is_empty() {
                continue;
            }
            let mut normalized: BTreeSet<Arc<str>> =
                self.nodes[idx].resolved_deps.iter().cloned().collect();
            for ancestor in self.ancestors_full(&[idx]) {
                if ancestor == idx {
                    continue;
                }
                for d in &self.nodes[ancestor].resolved_deps {
                    normalized.remove(d);
                }
            }
            self.nodes[idx].normalized_deps = normalized.into_iter().collect();
        }
    }

    fn detect_cycles(&self) -> Result<(), BuildError> {
        if self.nodes.is_empty() {
            return Ok(());
        }

        // Versioned view.
        if self.heads.is_empty() || self.bases.is_empty() {
            let ids = self.nodes.iter().map(|n| n.revision.id().clone()).collect();
            return Err(BuildError::CycleDetected(ids));
        }
        let head_idx = self.indices(&self.heads);
        let base_idx = self.indices(&self.bases);
        let reach_from_heads: BTreeSet<usize> =
            self.walk_indices(&head_idx, EdgeSet::Down).into_iter().collect();
        let reach_from_bases: BTreeSet<usize> =
            self.walk_indices(&base_idx, EdgeSet::NextRev).into_iter().collect();
        let total_space: BTreeSet<usize> =
            reach_from_heads.intersection(&reach_from_bases).copied().collect();
        let deleted: Vec<Arc<str>> = (0..self.nodes.len())
            .filter(|i| !total_space.contains(i))
            .map(|i| self.nodes[i].revision.id().clone())
            .collect();
        if !deleted.is_empty() {
            return Err(BuildError::CycleDetected(sorted(deleted)));
        }

        // Full view.
        if self.real_heads.is_empty() || self.real_bases.is_empty() {
            let ids = self.nodes.iter().map(|n| n.revision.id().clone()).collect();
            return Err(BuildError::DependencyCycleDetected(ids));
        }
        let real_head_idx = self.indices(&self.real_heads);
        let real_base_idx = self.indices(&self.real_bases);
        let reach_from_real_heads: BTreeSet<usize> =
            self.walk_indices(&real_head_idx, EdgeSet::Full).into_iter().collect();
        let reach_from_real_bases: BTreeSet<usize> =
            self.walk_indices(&real_base_idx, EdgeSet::AllNextRev).into_iter().collect();
        let total_space: BTreeSet<usize> = reach_from_real_heads
            .intersection(&reach_from_real_bases)
            .copied()
            .collect();
        let deleted: Vec<Arc<str>> = (0..self.nodes.len())
            .filter(|i| !total_space.contains(i))
            .map(|i| self.nodes[i].revision.id().clone())
            .collect();
        if !deleted.is_empty() {
            return Err(BuildError::DependencyCycleDetected(sorted(deleted)));
        }

        Ok(())
    }

    fn propagate_labels(&mut self) {
        let labeled: Vec<(usize, Vec<Arc<str>>)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.revision.branch_labels().is_empty())
            .map(|(i, n)| (i, n.revision.branch_labels().to_vec()))
            .collect();

        for (root_idx, labels) in labeled {
            let descendants = self.walk_indices(&[root_idx], EdgeSet::AllNextRev);
            for &d in &descendants {
                add_labels(&mut self.nodes[d], &labels);
            }
            for &d in &descendants {
                let mut cur = d;
                loop {
                    if self.nodes[cur].is_real_branch_point() || self.nodes[cur].revision.is_merge_point() {
                        break;
                    }
                    add_labels(&mut self.nodes[cur], &labels);
                    let down = self.nodes[cur].revision.down();
                    if down.len() == 1 {
                        let Some(&parent) = self.by_id.get(&down[0]) else { break };
                        cur = parent;
                    } else {
                        break;
                    }
                }
            }
        }
    }

    fn indices(&self, ids: &[Arc<str>]) -> Vec<usize> {
        ids.iter().filter_map(|id| self.by_id.get(id).copied()).collect()
    }

    /// Ancestors of `starts` via the full view (`down ∪ resolved_deps`),
    /// including the starts themselves.
    pub(crate) fn ancestors_full(&self, starts: &[usize]) -> Vec<usize> {
        self.walk_indices(starts, EdgeSet::Full)
    }

    /// Plain DFS over the arena's internal index space, parameterized by
    /// [`EdgeSet`]. Returns each reached index exactly once. Panics are
    /// impossible here: forward edges are only ever recorded between
    /// indices that exist in the arena, and `down`/`resolved_deps` entries
    /// that don't resolve were already warned about and skipped during
    /// build, so they are simply absent from `by_id` lookups.
    pub(crate) fn walk_indices(&self, starts: &[usize], edges: EdgeSet) -> Vec<usize> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = starts.to_vec();
        let mut order = Vec::new();
        while let Some(idx) = stack.pop() {
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            order.push(idx);
            for id in self.edge_ids(idx, edges) {
                if let Some(&next) = self.by_id.get(&id) {
                    if !seen[next] {
                        stack.push(next);
                    }
                }
            }
        }
        order
    }

    /// The ids reachable from `idx` along the chosen edge set. Returns an
    /// owned `Vec` uniformly since `Full`/`Normalized` are unions of two
    /// stored fields with no single backing slice to borrow.
    /// As [`RevisionMap::edge_ids`], looked up by id instead of arena
    /// index, for use by sibling modules (`traverse`, `resolve`, `plan`)
    /// that work in id space rather than index space. Returns an empty
    /// `Vec` for an unknown id.
    pub(crate) fn edge_ids_pub(&self, id: &str, edges: EdgeSet) -> Vec<Arc<str>> {
        match self.by_id.get(id) {
            Some(&idx) => self.edge_ids(idx, edges),
            None => Vec::new(),
        }
    }

    pub(crate) fn edge_ids(&self, idx: usize, edges: EdgeSet) -> Vec<Arc<str>> {
        let node = &self.nodes[idx];
        match edges {
            EdgeSet::Down => node.revision.down().to_vec(),
            EdgeSet::Full => node
                .revision
                .down()
                .iter()
                .chain(node.resolved_deps.iter())
                .cloned()
                .collect(),
            EdgeSet::Normalized => node
                .revision
                .down()
                .iter()
                .chain(node.normalized_deps.iter())
                .cloned()
                .collect(),
            EdgeSet::NextRev => node.nextrev.to_vec(),
            EdgeSet::AllNextRev => node.all_nextrev.to_vec(),
        }
    }

    // -- public accessors ----------------------------------------------

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn revision(&self, id: &str) -> Option<&Revision> {
        self.by_id.get(id).map(|&i| &self.nodes[i].revision)
    }

    pub fn heads(&self) -> &[Arc<str>] {
        &self.heads
    }

    pub fn real_heads(&self) -> &[Arc<str>] {
        &self.real_heads
    }

    pub fn bases(&self) -> &[Arc<str>] {
        &self.bases
    }

    pub fn real_bases(&self) -> &[Arc<str>] {
        &self.real_bases
    }

    pub fn resolved_deps(&self, id: &str) -> Option<&[Arc<str>]> {
        self.by_id.get(id).map(|&i| &*self.nodes[i].resolved_deps)
    }

    pub fn normalized_deps(&self, id: &str) -> Option<&[Arc<str>]> {
        self.by_id.get(id).map(|&i| &*self.nodes[i].normalized_deps)
    }

    pub fn nextrev(&self, id: &str) -> Option<&[Arc<str>]> {
        self.by_id.get(id).map(|&i| &*self.nodes[i].nextrev)
    }

    pub fn all_nextrev(&self, id: &str) -> Option<&[Arc<str>]> {
        self.by_id.get(id).map(|&i| &*self.nodes[i].all_nextrev)
    }

    pub fn effective_labels(&self, id: &str) -> Option<&[Arc<str>]> {
        self.by_id.get(id).map(|&i| &*self.nodes[i].effective_labels)
    }

    pub fn is_head(&self, id: &str) -> bool {
        self.by_id.get(id).is_some_and(|&i| self.nodes[i].is_head())
    }

    pub fn is_real_head(&self, id: &str) -> bool {
        self.by_id.get(id).is_some_and(|&i| self.nodes[i].is_real_head())
    }

    pub fn is_branch_point(&self, id: &str) -> bool {
        self.by_id.get(id).is_some_and(|&i| self.nodes[i].is_branch_point())
    }

    pub fn is_real_branch_point(&self, id: &str) -> bool {
        self.by_id.get(id).is_some_and(|&i| self.nodes[i].is_real_branch_point())
    }

    /// Every id whose byte-prefix equals `prefix` (spec.md §9: "store ids
    /// in a structure that supports prefix enumeration").
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<Arc<str>> {
        self.ids_sorted
            .range(Arc::from(prefix)..)
            .take_while(|id| id.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn label_revision(&self, label: &str) -> Option<&Revision> {
        self.by_label.get(label).map(|&i| &self.nodes[i].revision)
    }

    /// Add a single revision to an already-built map (spec.md §4.7). Does
    /// not re-run global cycle detection (spec.md §9, open question 1): the
    /// caller is responsible for not forming one incrementally.
    pub fn add_revision(
        &mut self,
        revision: Revision,
        replace: bool,
    ) -> Result<Vec<Warning>, BuildError> {
        let mut warnings = Vec::new();
        let id = revision.id().clone();
        let present = self.by_id.contains_key(&id);

        if replace && !present {
            return Err(BuildError::NotPresentForReplace(id));
        }
        if !replace && present {
            warnings.push(Warning::DuplicateId(id.clone()));
        }

        for label in revision.branch_labels() {
            if let Some(&existing) = self.by_id.get(label) {
                return Err(BuildError::LabelCollision {
                    label: label.clone(),
                    revision: id.clone(),
                    existing: self.nodes[existing].revision.id().clone(),
                });
            }
            if let Some(&existing) = self.by_label.get(label) {
                return Err(BuildError::LabelCollision {
                    label: label.clone(),
                    revision: id.clone(),
                    existing: self.nodes[existing].revision.id().clone(),
                });
            }
        }

        let idx = if let Some(&existing) = self.by_id.get(&id) {
            self.nodes[existing] = Node::new(revision.clone());
            existing
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Node::new(revision.clone()));
            self.by_id.insert(id.clone(), idx);
            self.ids_sorted.insert(id.clone());
            idx
        };

        for label in revision.branch_labels() {
            self.by_label.insert(label.clone(), idx);
        }

        let mut resolved: TinyVec<[Arc<str>; 1]> = TinyVec::new();
        for dep in revision.deps() {
            if let Some(&target) = self.by_id.get(dep) {
                resolved.push(self.nodes[target].revision.id().clone());
            } else if let Some(&target) = self.by_label.get(dep) {
                resolved.push(self.nodes[target].revision.id().clone());
            } else {
                warnings.push(Warning::MissingEdgeTarget { from: id.clone(), missing: dep.clone() });
            }
        }
        self.nodes[idx].resolved_deps = resolved;

        if revision.is_base() && !self.bases.contains(&id) {
            self.bases.push(id.clone());
        }
        if revision.is_real_base() && !self.real_bases.contains(&id) {
            self.real_bases.push(id.clone());
        }

        let down: Vec<Arc<str>> = revision.down().to_vec();
        let resolved_deps: Vec<Arc<str>> = self.nodes[idx].resolved_deps.to_vec();
        for p in down.iter().chain(resolved_deps.iter()) {
            match self.by_id.get(p).copied() {
                Some(parent_idx) => {
                    if !self.nodes[parent_idx].all_nextrev.contains(&id) {
                        self.nodes[parent_idx].all_nextrev.push(id.clone());
                    }
                }
                None => warnings.push(Warning::MissingEdgeTarget { from: id.clone(), missing: p.clone() }),
            }
        }
        for p in &down {
            if let Some(&parent_idx) = self.by_id.get(p) {
                if !self.nodes[parent_idx].nextrev.contains(&id) {
                    self.nodes[parent_idx].nextrev.push(id.clone());
                }
            }
        }

        self.normalize_single(idx);

        let is_real_head = self.nodes[idx].is_real_head();
        let is_head = self.nodes[idx].is_head();
        let all_down: BTreeSet<Arc<str>> = down
            .iter()
            .cloned()
            .chain(resolved_deps.iter().cloned())
            .chain(std::iter::once(id.clone()))
            .collect();
        if is_real_head {
            self.real_heads.retain(|h| !all_down.contains(h));
            self.real_heads.push(id.clone());
        }
        let versioned_down: BTreeSet<Arc<str>> =
            down.iter().cloned().chain(std::iter::once(id.clone())).collect();
        if is_head {
            self.heads.retain(|h| !versioned_down.contains(h));
            self.heads.push(id.clone());
        }

        Ok(warnings)
    }

    fn normalize_single(&mut self, idx: usize) {
        if self.nodes[idx].resolved_deps.is_empty() {
            self.nodes[idx].normalized_deps = TinyVec::new();
            return;
        }
        let mut normalized: BTreeSet<Arc<str>> =
            self.nodes[idx].resolved_deps.iter().cloned().collect();
        for ancestor in self.ancestors_full(&[idx]) {
            if ancestor == idx {
                continue;
            }
            for d in &self.nodes[ancestor].resolved_deps {
                normalized.remove(d);
            }
        }
        self.nodes[idx].normalized_deps = normalized.into_iter().collect();
    }
}

fn add_labels(node: &mut Node, labels: &[Arc<str>]) {
    for l in labels {
        if !node.effective_labels.contains(l) {
            node.effective_labels.push(l.clone());
        }
    }
}

fn sorted(mut v: Vec<Arc<str>>) -> Vec<Arc<str>> {
    v.sort();
    v
}
