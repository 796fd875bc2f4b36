use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Raised by [`crate::revision::Revision::new`] for defects that must be
/// caught before a revision is ever handed to a map.
#[derive(Debug, Error)]
pub enum RevisionNewError {
    #[error("character(s) '{chars}' not allowed in revision identifier '{id}'")]
    IllegalChars { id: Arc<str>, chars: String },
    #[error("self-loop detected in revision {0}")]
    LoopDetected(Arc<str>),
    #[error("dependency self-loop detected in revision {0}")]
    DependencyLoopDetected(Arc<str>),
}

/// Raised while building or incrementally extending a [`crate::map::RevisionMap`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("branch name '{label}' in revision {revision} already used by revision {existing}")]
    LabelCollision {
        label: Arc<str>,
        revision: Arc<str>,
        existing: Arc<str>,
    },
    #[error("Cycle is detected in revisions ({0:?})")]
    CycleDetected(Vec<Arc<str>>),
    #[error("Dependency cycle is detected in revisions ({0:?})")]
    DependencyCycleDetected(Vec<Arc<str>>),
    #[error("revision {0} not in map")]
    NotPresentForReplace(Arc<str>),
}

/// A resolution request that could not be satisfied unambiguously.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResolutionError {
    pub message: String,
    pub argument: String,
}

/// More than one head satisfied an argument that required exactly one.
#[derive(Debug, Error)]
#[error("multiple heads are present for given argument '{argument}'; {heads:?}")]
pub struct MultipleHeadsError {
    pub heads: Vec<Arc<str>>,
    pub argument: String,
}

/// A requested downgrade/upgrade range was not linearly ordered.
///
/// `lower`/`upper` are `None` to mean "base", matching the convention used
/// throughout the resolver and planners.
#[derive(Debug)]
pub struct RangeNotAncestorError {
    pub lower: Option<Arc<str>>,
    pub upper: Option<Arc<str>>,
}

impl fmt::Display for RangeNotAncestorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "revision {} is not an ancestor of revision {}",
            self.lower.as_deref().unwrap_or("base"),
            self.upper.as_deref().unwrap_or("base"),
        )
    }
}

impl std::error::Error for RangeNotAncestorError {}

/// The general runtime error surface for traversal, resolution, and planning.
#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("dependency resolution failed; broken map")]
    BrokenMap,
    #[error("requested revision {target} overlaps with other requested revisions ({overlaps:?})")]
    Overlap {
        target: Arc<str>,
        overlaps: Vec<Arc<str>>,
    },
    #[error("relative revision didn't produce {0} migrations")]
    RelativeUnsatisfied(i64),
    #[error("walked too far")]
    WalkedTooFar,
    #[error("tried to walk down across a merge")]
    WalkAcrossMerge,
    #[error("tried to walk up across a branch")]
    WalkAcrossBranch,
    #[error("ambiguous upgrade: multiple current revisions with no anchor symbol")]
    AmbiguousUpgrade,
    #[error("ambiguous downgrade: multiple current revisions with no anchor symbol")]
    AmbiguousDowngrade,
    #[error("revision identifier is not a string")]
    NotAString,
    #[error("revision {0} is not a member of branch '{1}'")]
    NotInBranch(Arc<str>, String),
    #[error("revision {0} used as a branch qualifier does not carry exactly one declared label")]
    AmbiguousBranchLabel(Arc<str>),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    MultipleHeads(#[from] MultipleHeadsError),
    #[error(transparent)]
    RangeNotAncestor(#[from] RangeNotAncestorError),
    #[error(transparent)]
    Build(#[from] BuildError),
}
