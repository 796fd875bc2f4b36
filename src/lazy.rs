//! A memoizing wrapper around a revision provider. Grounded on
//! `migration/src/migrator.rs`'s `static GRAPH: OnceCell<RevisionGraph>`
//! pattern, generalized from a single process-wide static to an
//! instance-scoped cell so a program can hold more than one graph (e.g. one
//! per migrated component).

use once_cell::sync::OnceCell;

use crate::error::BuildError;
use crate::map::{RevisionMap, Warning};
use crate::revision::Revision;

/// Builds a [`RevisionMap`] from `provider` at most once, on first access,
/// and reuses the result thereafter.
///
/// `provider` typically reads a fixed set of compiled-in or on-disk
/// revisions, so the expensive parts of [`RevisionMap::build`] (dependency
/// resolution, cycle detection, label propagation) only need to run once
/// even if the caller calls [`LazyRevisionMap::get`] on every request.
pub struct LazyRevisionMap<F> {
    provider: F,
    cell: OnceCell<(RevisionMap, Vec<Warning>)>,
}

impl<F> LazyRevisionMap<F>
where
    F: Fn() -> Vec<Revision>,
{
    pub fn new(provider: F) -> Self {
        Self { provider, cell: OnceCell::new() }
    }

    /// Build (on first call) or return the memoized [`RevisionMap`].
    pub fn get(&self) -> Result<&RevisionMap, BuildError> {
        self.cell
            .get_or_try_init(|| RevisionMap::build((self.provider)()))
            .map(|(map, _warnings)| map)
    }

    /// As [`LazyRevisionMap::get`], but also exposes the non-fatal build
    /// warnings collected the first time the map was built.
    pub fn get_with_warnings(&self) -> Result<(&RevisionMap, &[Warning]), BuildError> {
        self.cell
            .get_or_try_init(|| RevisionMap::build((self.provider)()))
            .map(|(map, warnings)| (map, warnings.as_slice()))
    }

    /// Whether the underlying map has already been built.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // Not thread-shared; local to a single test, counting provider calls.
    thread_local! {
        static CALLS: Cell<u32> = Cell::new(0);
    }

    fn counting_provider() -> Vec<Revision> {
        CALLS.with(|c| c.set(c.get() + 1));
        vec![Revision::new("a", (), (), ()).unwrap(), Revision::new("b", "a", (), ()).unwrap()]
    }

    #[test]
    fn builds_once_and_memoizes() {
        CALLS.with(|c| c.set(0));
        let lazy = LazyRevisionMap::new(counting_provider);
        assert!(!lazy.is_initialized());

        let map1 = lazy.get().unwrap();
        assert_eq!(map1.len(), 2);
        let map2 = lazy.get().unwrap();
        assert_eq!(map2.len(), 2);

        assert_eq!(CALLS.with(|c| c.get()), 1);
        assert!(lazy.is_initialized());
    }

    #[test]
    fn surfaces_build_errors() {
        let lazy = LazyRevisionMap::new(|| {
            vec![
                Revision::new("a", (), (), "shared").unwrap(),
                Revision::new("b", "a", (), "shared").unwrap(),
            ]
        });
        let err = lazy.get().unwrap_err();
        assert!(matches!(err, BuildError::LabelCollision { .. }));
    }

    #[test]
    fn exposes_build_warnings() {
        let lazy = LazyRevisionMap::new(|| {
            vec![
                Revision::new("a", (), (), ()).unwrap(),
                Revision::new("b", "missing", (), ()).unwrap(),
            ]
        });
        let (map, warnings) = lazy.get_with_warnings().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::MissingEdgeTarget { .. }));
    }
}
