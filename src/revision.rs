use std::sync::Arc;

use tinyvec::TinyVec;

use crate::error::RevisionNewError;

const ILLEGAL_CHARS: [char; 3] = ['@', '-', '+'];

/// An identifier, or an ordered collection of them, as accepted at the
/// public edge (the `down`/`deps` constructor arguments, and most resolver
/// entry points). Mirrors the "null, a single id string, or an ordered
/// collection" contract from spec.md §6.
pub trait IdSeq {
    fn into_ids(self) -> Vec<Arc<str>>;
}

impl IdSeq for () {
    fn into_ids(self) -> Vec<Arc<str>> {
        Vec::new()
    }
}

impl IdSeq for &str {
    fn into_ids(self) -> Vec<Arc<str>> {
        vec![Arc::from(self)]
    }
}

impl IdSeq for String {
    fn into_ids(self) -> Vec<Arc<str>> {
        vec![Arc::from(self.as_str())]
    }
}

impl IdSeq for Arc<str> {
    fn into_ids(self) -> Vec<Arc<str>> {
        vec![self]
    }
}

impl<T: IdSeq> IdSeq for Option<T> {
    fn into_ids(self) -> Vec<Arc<str>> {
        self.map(IdSeq::into_ids).unwrap_or_default()
    }
}

impl<T: Into<Arc<str>>> IdSeq for Vec<T> {
    fn into_ids(self) -> Vec<Arc<str>> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Arc<str>> + Clone, const N: usize> IdSeq for [T; N] {
    fn into_ids(self) -> Vec<Arc<str>> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Arc<str>> + Clone> IdSeq for &[T] {
    fn into_ids(self) -> Vec<Arc<str>> {
        self.iter().cloned().map(Into::into).collect()
    }
}

/// A single migration record: a string identity, its declared versioned
/// predecessors (`down`), its declared cross-branch dependencies (`deps`,
/// initially symbolic: ids or branch labels), and any branch labels it
/// declares on itself.
///
/// All derived fields (resolved/normalized dependencies, forward edges,
/// effective labels) live on [`crate::map::Node`] once this record has been
/// placed into a [`crate::map::RevisionMap`]. `Revision` itself is just the
/// caller-supplied input.
#[derive(Clone, Debug)]
pub struct Revision {
    pub(crate) id: Arc<str>,
    pub(crate) down: TinyVec<[Arc<str>; 1]>,
    pub(crate) deps: TinyVec<[Arc<str>; 1]>,
    pub(crate) branch_labels: TinyVec<[Arc<str>; 1]>,
}

impl Revision {
    /// Construct a new revision record, validating the identity and
    /// rejecting self-loops. This is the only point at which
    /// [`RevisionNewError`] can be raised: these are defects in a single
    /// record, not the graph as a whole.
    pub fn new(
        id: impl Into<Arc<str>>,
        down: impl IdSeq,
        deps: impl IdSeq,
        branch_labels: impl IdSeq,
    ) -> Result<Self, RevisionNewError> {
        let id: Arc<str> = id.into();
        verify_rev_id(&id)?;

        let down: TinyVec<[Arc<str>; 1]> = down.into_ids().into_iter().collect();
        let deps: TinyVec<[Arc<str>; 1]> = deps.into_ids().into_iter().collect();
        let branch_labels: TinyVec<[Arc<str>; 1]> = branch_labels.into_ids().into_iter().collect();

        if down.iter().any(|d| **d == *id) {
            return Err(RevisionNewError::LoopDetected(id));
        }
        if deps.iter().any(|d| **d == *id) {
            return Err(RevisionNewError::DependencyLoopDetected(id));
        }

        Ok(Revision { id, down, deps, branch_labels })
    }

    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn down(&self) -> &[Arc<str>] {
        &self.down
    }

    pub fn deps(&self) -> &[Arc<str>] {
        &self.deps
    }

    pub fn branch_labels(&self) -> &[Arc<str>] {
        &self.branch_labels
    }

    /// `down = []`.
    pub fn is_base(&self) -> bool {
        self.down.is_empty()
    }

    /// `down = [] && deps = []`.
    pub fn is_real_base(&self) -> bool {
        self.down.is_empty() && self.deps.is_empty()
    }

    /// `|down| > 1`.
    pub fn is_merge_point(&self) -> bool {
        self.down.len() > 1
    }
}

fn verify_rev_id(id: &str) -> Result<(), RevisionNewError> {
    if id.is_empty() {
        return Err(RevisionNewError::IllegalChars {
            id: Arc::from(id),
            chars: String::new(),
        });
    }
    let illegal: String = id
        .chars()
        .filter(|c| ILLEGAL_CHARS.contains(c))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    if !illegal.is_empty() {
        return Err(RevisionNewError::IllegalChars {
            id: Arc::from(id),
            chars: illegal,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_illegal_characters() {
        let err = Revision::new("a@b", (), (), ()).unwrap_err();
        assert!(matches!(err, RevisionNewError::IllegalChars { .. }));
    }

    #[test]
    fn rejects_self_loop() {
        let err = Revision::new("a", "a", (), ()).unwrap_err();
        assert!(matches!(err, RevisionNewError::LoopDetected(id) if &*id == "a"));
    }

    #[test]
    fn rejects_dependency_self_loop() {
        let err = Revision::new("a", (), "a", ()).unwrap_err();
        assert!(matches!(err, RevisionNewError::DependencyLoopDetected(id) if &*id == "a"));
    }

    #[test]
    fn accepts_multi_parent_and_labels() {
        let rev = Revision::new("c", vec!["a", "b"], vec!["x"], vec!["mybranch"]).unwrap();
        assert_eq!(rev.down().len(), 2);
        assert_eq!(&*rev.down()[0], "a");
        assert_eq!(&*rev.down()[1], "b");
        assert!(rev.is_merge_point());
        assert!(!rev.is_base());
    }

    #[test]
    fn base_revision_has_no_down() {
        let rev = Revision::new("a", (), (), ()).unwrap();
        assert!(rev.is_base());
        assert!(rev.is_real_base());
    }
}
