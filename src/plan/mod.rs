//! Shared single-path walkers used by both planners (spec.md §4.5/§4.6):
//! `walk_up`/`walk_down` resolve a relative offset (`symbol±N`) to a
//! concrete revision. Grounded on
//! `alembic/script/revision.py::walk_up`/`walk_down`.

pub mod downgrade;
pub mod upgrade;

use std::sync::Arc;

use crate::error::RevisionError;
use crate::map::RevisionMap;

/// Walk up the tree along a single path, `steps` times. `start = None`
/// begins from every real base (`down = []`); a `branch` filter restricts
/// candidates at each step to those carrying that effective label. Returns
/// `Ok(None)` if the walk runs out of nodes before `steps` is exhausted
/// ("walked too far"); fails with [`RevisionError::WalkAcrossBranch`] if a
/// step would have to choose between more than one candidate.
pub fn walk_up(
    map: &RevisionMap,
    start: Option<&str>,
    steps: i64,
    branch: Option<&str>,
) -> Result<Option<Arc<str>>, RevisionError> {
    let mut cur: Option<Arc<str>> = start.map(Arc::from);
    for _ in 0..steps {
        let candidates: Vec<Arc<str>> = match &cur {
            None => map.bases().to_vec(),
            Some(id) => map.nextrev(id).map(|s| s.to_vec()).unwrap_or_default(),
        };
        let filtered: Vec<Arc<str>> = candidates
            .into_iter()
            .filter(|id| match branch {
                None => true,
                Some(b) => map
                    .effective_labels(id)
                    .map(|labels| labels.iter().any(|l| &**l == b))
                    .unwrap_or(false),
            })
            .collect();
        match filtered.len() {
            0 => return Ok(None),
            1 => cur = Some(filtered.into_iter().next().unwrap()),
            _ => return Err(RevisionError::WalkAcrossBranch),
        }
    }
    Ok(cur)
}

/// Walk down the tree along a single path, `steps` times, following
/// `down`. Returns `Ok(None)` if the walk runs off the end before `steps`
/// is exhausted; fails with [`RevisionError::WalkAcrossMerge`] if a step
/// would have to choose between more than one versioned predecessor.
pub fn walk_down(map: &RevisionMap, start: &str, steps: u32) -> Result<Option<Arc<str>>, RevisionError> {
    let mut cur: Arc<str> = Arc::from(start);
    for _ in 0..steps {
        let down: Vec<Arc<str>> = map.revision(&cur).map(|r| r.down().to_vec()).unwrap_or_default();
        match down.len() {
            0 => return Ok(None),
            1 => cur = down.into_iter().next().unwrap(),
            _ => return Err(RevisionError::WalkAcrossMerge),
        }
    }
    Ok(Some(cur))
}
