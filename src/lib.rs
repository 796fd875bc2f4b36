//! A directed acyclic revision graph engine for schema-migration tools, in
//! the shape of Alembic's `RevisionMap`/`ScriptDirectory` core: a set of
//! immutable migration records (each naming its versioned predecessors and
//! any cross-branch dependencies) is built once into an indexed
//! [`RevisionMap`], after which identifiers can be resolved and upgrade/
//! downgrade plans computed against it.
//!
//! The pieces, in dependency order:
//!
//! - [`revision`]: [`Revision`], the caller-supplied migration record.
//! - [`map`]: [`RevisionMap`], the arena and its derived indexes, built by
//!   [`RevisionMap::build`].
//! - [`ident`]: parses a raw identifier string (`"heads"`, `"abcd1234"`,
//!   `"mybranch@head-2"`, ...) into a structured [`ident::ParsedIdent`].
//! - [`resolve`]: turns a parsed absolute identifier into concrete ids.
//! - [`traverse`]: DFS walks and a deterministic topological sort, shared by
//!   the resolver and the planners.
//! - [`plan`]: the upgrade and downgrade planners.
//! - [`lazy`]: [`lazy::LazyRevisionMap`], a build-once-reuse-forever wrapper
//!   for embedding applications with a fixed, compiled-in revision set.
//! - [`error`]: the crate's error taxonomy.
//!
//! # Example
//!
//! ```
//! use revision_graph::{RevisionMap, Revision};
//!
//! let revisions = vec![
//!     Revision::new("a", (), (), ()).unwrap(),
//!     Revision::new("b", "a", (), ()).unwrap(),
//!     Revision::new("c", "b", (), ()).unwrap(),
//! ];
//! let (map, warnings) = RevisionMap::build(revisions).unwrap();
//! assert!(warnings.is_empty());
//! assert_eq!(map.real_heads().len(), 1);
//! assert_eq!(&*map.real_heads()[0], "c");
//! ```

pub mod error;
pub mod ident;
pub mod lazy;
pub mod map;
pub mod plan;
pub mod resolve;
pub mod revision;
pub mod traverse;

pub use error::{
    BuildError, MultipleHeadsError, RangeNotAncestorError, ResolutionError, RevisionError,
    RevisionNewError,
};
pub use ident::{parse_arg, parse_one, Body, IdArg, ParsedIdent, Symbol};
pub use lazy::LazyRevisionMap;
pub use map::{EdgeSet, RevisionMap, Warning, WarningSink};
pub use plan::downgrade::{plan_downgrade, DowngradeOptions};
pub use plan::upgrade::{plan_upgrade, UpgradeOptions};
pub use revision::{IdSeq, Revision};
