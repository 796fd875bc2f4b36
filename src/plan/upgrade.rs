//! The upgrade planner (spec.md §4.5). Grounded on
//! `alembic/script/revision.py::_iterate_revisions_upgrade`/
//! `_parse_upgrade_target`; control-flow shape (an `exec_up`-style driver
//! over a computed plan) grounded on `migration/src/migrator.rs`.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::RevisionError;
use crate::ident::{self, Body, Symbol};
use crate::map::EdgeSet;
use crate::map::RevisionMap;
use crate::plan::{walk_down, walk_up};
use crate::resolve;
use crate::traverse;

/// Upgrade planner flags (spec.md §4.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct UpgradeOptions {
    pub inclusive: bool,
    pub implicit_base: bool,
}

/// Compute the topologically ordered (parents-first) set of revisions to
/// apply to move from `lower` to `upper`.
///
/// `upper` is a raw identifier string (absolute, symbolic, branch-qualified,
/// or relative) per spec.md §6; `lower` is the caller's already-resolved
/// current stamp(s), with an optional branch qualifier for filtering
/// (spec.md §4.5 step 1's "if `lower` is branch-qualified" clause).
pub fn plan_upgrade(
    map: &RevisionMap,
    upper: &str,
    lower: &[Arc<str>],
    lower_branch: Option<&str>,
    opts: UpgradeOptions,
) -> Result<Vec<Arc<str>>, RevisionError> {
    let mut targets = resolve_upgrade_target(map, upper, lower)?;

    if let Some(branch) = lower_branch {
        targets.retain(|id| {
            map.effective_labels(id)
                .map(|labels| labels.iter().any(|l| &**l == branch))
                .unwrap_or(false)
        });
    }

    let required: BTreeSet<Arc<str>> = traverse::walk(map, &targets, EdgeSet::Full)?
        .into_iter()
        .collect();

    let current: BTreeSet<Arc<str>> = traverse::walk(map, lower, EdgeSet::Full)?
        .into_iter()
        .collect();

    let mut needs: BTreeSet<Arc<str>> = required.difference(&current).cloned().collect();

    if opts.inclusive {
        needs.extend(lower.iter().cloned());
    }

    if !lower.is_empty() && !opts.implicit_base {
        let lower_descendants: BTreeSet<Arc<str>> =
            traverse::walk(map, lower, EdgeSet::NextRev)?.into_iter().collect();
        needs = needs.intersection(&lower_descendants).cloned().collect();
    }

    let needs_vec: Vec<Arc<str>> = needs.into_iter().collect();
    Ok(traverse::topological_sort(map, &needs_vec))
}

fn resolve_upgrade_target(
    map: &RevisionMap,
    upper: &str,
    lower: &[Arc<str>],
) -> Result<Vec<Arc<str>>, RevisionError> {
    let parsed = ident::parse_one(upper);

    match &parsed.body {
        Body::Relative { symbol, offset } => {
            if *offset > 0 {
                let target = match symbol {
                    Some(sym) => {
                        let anchor = resolve_symbol_anchor(map, sym)?;
                        walk_up(map, Some(&anchor), *offset, parsed.branch.as_deref())?
                    }
                    None => {
                        if lower.len() != 1 {
                            return Err(RevisionError::AmbiguousUpgrade);
                        }
                        walk_up(map, Some(&lower[0]), *offset, parsed.branch.as_deref())?
                    }
                };
                match target {
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
                match walk_down(map, &anchor, offset.unsigned_abs() as u32)? {
                    Some(id) => Ok(vec![id]),
                    None => Err(RevisionError::WalkedTooFar),
                }
            }
        }
        Body::Reserved(Symbol::Base) => Err(RevisionError::RelativeUnsatisfied(0)),
        _ => resolve::resolve(map, &parsed),
    }
}

/// Resolve a bare symbol (`head`, `heads`, or a literal/partial id) used as
/// a relative anchor to a single concrete id.
fn resolve_symbol_anchor(map: &RevisionMap, symbol: &str) -> Result<Arc<str>, RevisionError> {
    let parsed = ident::parse_one(symbol);
    let candidates = resolve::resolve(map, &parsed)?;
    match candidates.len() {
        1 => Ok(candidates.into_iter().next().unwrap()),
        0 => Err(RevisionError::WalkedTooFar),
        _ => Err(RevisionError::AmbiguousUpgrade),
    }
}
