//! The downgrade planner (spec.md §4.6). Grounded on
//! `alembic/script/revision.py::_iterate_revisions_downgrade`/
//! `_parse_downgrade_target`/`_drop_inclusive`; control-flow shape shared
//! with [`crate::plan::upgrade`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{RangeNotAncestorError, RevisionError};
use crate::ident::{self, Body, Symbol};
use crate::map::EdgeSet;
use crate::map::RevisionMap;
use crate::plan::{walk_down, walk_up};
use crate::resolve;
use crate::traverse;

/// Downgrade planner flags (spec.md §4.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct DowngradeOptions {
    pub inclusive: bool,
    pub implicit_base: bool,
}

/// Compute the reverse-topologically ordered (children-first) set of
/// revisions to retire when moving from `upper` down to `target`.
///
/// `target` is a raw identifier string (absolute, symbolic, branch-qualified,
/// or relative) per spec.md §6; `upper` is the caller's already-resolved
/// current stamp(s), with an optional branch qualifier restricting which of
/// those stamps participate (spec.md §4.6 step 1).
pub fn plan_downgrade(
    map: &RevisionMap,
    target: &str,
    upper: &[Arc<str>],
    upper_branch: Option<&str>,
    opts: DowngradeOptions,
) -> Result<Vec<Arc<str>>, RevisionError> {
    let targets = resolve_downgrade_target(map, target, upper)?;

    let mut upper_revs: Vec<Arc<str>> = upper.to_vec();
    if let Some(branch) = upper_branch {
        upper_revs.retain(|id| {
            map.effective_labels(id)
                .map(|labels| labels.iter().any(|l| &**l == branch))
                .unwrap_or(false)
        });
    }

    // Roots-to-drop (spec.md §4.6 step 2): walking down from `upper` must
    // pass through one of these before reaching `target`.
    let mut roots: BTreeSet<Arc<str>> = if targets.is_empty() {
        map.real_bases().iter().cloned().collect()
    } else if opts.inclusive {
        targets.iter().cloned().collect()
    } else {
        let mut children = BTreeSet::new();
        for t in &targets {
            if let Some(next) = map.nextrev(t) {
                children.extend(next.iter().cloned());
            }
        }
        children
    };

    let parsed = ident::parse_one(target);
    if roots.len() > 1 {
        if let Some(branch) = &parsed.branch {
            let branch_rev = resolve::resolve_branch_qualifier(map, branch)?;
            let ancestors_of_branch: BTreeSet<Arc<str>> =
                traverse::walk(map, &[branch_rev], EdgeSet::Full)?.into_iter().collect();
            roots = roots.intersection(&ancestors_of_branch).cloned().collect();
        }
    }

    let roots_vec: Vec<Arc<str>> = roots.into_iter().collect();
    let descendants_of_roots: BTreeSet<Arc<str>> =
        traverse::walk(map, &roots_vec, EdgeSet::AllNextRev)?.into_iter().collect();
    let ancestors_of_upper: BTreeSet<Arc<str>> =
        traverse::walk(map, &upper_revs, EdgeSet::Full)?.into_iter().collect();

    let mut drop: BTreeSet<Arc<str>> =
        descendants_of_roots.intersection(&ancestors_of_upper).cloned().collect();

    if drop.is_empty() {
        return Err(RangeNotAncestorError {
            lower: targets.first().cloned(),
            upper: upper_revs.first().cloned(),
        }
        .into());
    }

    if opts.implicit_base {
        // Retire every active revision in `upper`'s full ancestry that
        // isn't underneath a surviving (kept) subtree, not just the ones
        // reachable from `roots` (spec.md §9, open question 2).
        let kept: BTreeSet<Arc<str>> =
            ancestors_of_upper.difference(&drop).cloned().collect();
        let kept_vec: Vec<Arc<str>> = kept.into_iter().collect();
        let protected: BTreeSet<Arc<str>> =
            traverse::walk(map, &kept_vec, EdgeSet::Full)?.into_iter().collect();
        drop = ancestors_of_upper.difference(&protected).cloned().collect();
    }

    let drop_vec: Vec<Arc<str>> = drop.into_iter().collect();
    let mut order = traverse::topological_sort(map, &drop_vec);
    order.reverse();
    Ok(order)
}

fn resolve_downgrade_target(
    map: &RevisionMap,
    target: &str,
    upper: &[Arc<str>],
) -> Result<Vec<Arc<str>>, RevisionError> {
    let parsed = ident::parse_one(target);

    match &parsed.body {
        Body::Relative { symbol, offset } => {
            if *offset < 0 {
                let anchor = match symbol {
                    Some(sym) => resolve_symbol_anchor(map, sym)?,
                    None => {
                        if upper.len() != 1 {
                            return Err(RevisionError::AmbiguousDowngrade);
                        }
                        upper[0].clone()
                    }
                };
                match walk_down(map, &anchor, offset.unsigned_abs() as u32)? {
                    Some(id) => Ok(vec![id]),
                    None => Err(RevisionError::RelativeUnsatisfied(*offset)),
                }
            } else {
                let Some(sym) = symbol else {
                    return Err(RevisionError::RelativeUnsatisfied(*offset));
                };
                let anchor = match &parsed.branch {
                    Some(branch) => resolve_symbol_anchor(map, &format!("{branch}@{sym}"))?,
                    None => resolve_symbol_anchor(map, sym)?,
                };
                match walk_up(map, Some(&anchor), *offset, parsed.branch.as_deref())? {
                    Some(id) => Ok(vec![id]),
                    None => Err(RevisionError::WalkedTooFar),
                }
            }
        }
        Body::Reserved(Symbol::Base) => Ok(Vec::new()),
        _ => resolve::resolve(map, &parsed),
    }
}

fn resolve_symbol_anchor(map: &RevisionMap, symbol: &str) -> Result<Arc<str>, RevisionError> {
    let parsed = ident::parse_one(symbol);
    let candidates = resolve::resolve(map, &parsed)?;
    match candidates.len() {
        1 => Ok(candidates.into_iter().next().unwrap()),
        0 => Err(RevisionError::WalkedTooFar),
        _ => Err(RevisionError::AmbiguousDowngrade),
    }
}
