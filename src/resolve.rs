//! The revision resolver (spec.md §4.3): turns a parsed absolute
//! identifier into concrete revision ids, including partial-prefix
//! matching and branch-lineage checks. Grounded on
//! `alembic/script/revision.py::get_revisions`, `_revision_for_ident`,
//! `_resolve_branch`, `_shares_lineage`, `filter_for_lineage`.

use std::sync::Arc;

use crate::error::{MultipleHeadsError, ResolutionError, RevisionError};
use crate::ident::{Body, ParsedIdent, Symbol};
use crate::map::{EdgeSet, RevisionMap};

/// The minimum prefix length spec.md §4.3/§9 requires before a partial id
/// is eligible for prefix matching.
pub const MIN_PARTIAL_LEN: usize = 4;

/// Resolve a single parsed identifier (not a relative form; callers
/// resolve those via the planners' `walk_up`/`walk_down`) to the concrete
/// revision ids it denotes. May be empty (`base`, no heads), a singleton,
/// or several (`heads`, an ambiguous-but-branch-qualified set).
pub fn resolve(map: &RevisionMap, parsed: &ParsedIdent) -> Result<Vec<Arc<str>>, RevisionError> {
    let branch_rev = match &parsed.branch {
        Some(b) => Some(resolve_branch_qualifier(map, b)?),
        None => None,
    };

    match &parsed.body {
        Body::Reserved(Symbol::Base) => Ok(Vec::new()),
        Body::Reserved(Symbol::Head) => {
            let candidates = filtered_heads(map, branch_rev.as_deref(), false);
            match candidates.len() {
                0 => Ok(Vec::new()),
                1 => Ok(candidates),
                _ => Err(MultipleHeadsError {
                    heads: candidates,
                    argument: describe(parsed),
                }
                .into()),
            }
        }
        Body::Reserved(Symbol::Heads) => {
            Ok(filtered_heads(map, branch_rev.as_deref(), branch_rev.is_none()))
        }
        Body::Id(id) => {
            let resolved = resolve_literal(map, id)?;
            if let Some(branch) = &branch_rev {
                if !shares_lineage(map, branch, &resolved) {
                    return Err(ResolutionError {
                        message: format!(
                            "revision {resolved} is not a member of branch '{branch}'"
                        ),
                        argument: describe(parsed),
                    }
                    .into());
                }
            }
            Ok(vec![resolved])
        }
        Body::Relative { .. } => Err(RevisionError::NotAString),
    }
}

/// `heads`/`real_heads` filtered to those sharing lineage with
/// `branch_rev` (a revision id, already resolved from a branch qualifier
/// by [`resolve_branch_qualifier`]), when given. `prefer_real` selects
/// `real_heads` as the base set when no branch is given (spec.md §4.3:
/// "`heads` → all heads (filtered by branch label if given; otherwise
/// `real_heads`)").
fn filtered_heads(map: &RevisionMap, branch_rev: Option<&str>, prefer_real: bool) -> Vec<Arc<str>> {
    let base: &[Arc<str>] = if prefer_real { map.real_heads() } else { map.heads() };
    match branch_rev {
        None => base.to_vec(),
        Some(rev) => filter_for_lineage(map, base, rev),
    }
}

/// Resolve a literal/partial id string against `by_id`, applying the
/// 4-character partial-match rule (spec.md §4.3/§9).
pub fn resolve_literal(map: &RevisionMap, query: &str) -> Result<Arc<str>, RevisionError> {
    if let Some(rev) = map.revision(query) {
        return Ok(rev.id().clone());
    }
    if query.len() < MIN_PARTIAL_LEN {
        return Err(ResolutionError {
            message: format!(
                "revision {query} not found; please ensure at least four characters are \
                 present for partial matching"
            ),
            argument: query.to_string(),
        }
        .into());
    }
    let matches = map.ids_with_prefix(query);
    match matches.len() {
        0 => Err(ResolutionError {
            message: format!("no such revision '{query}'"),
            argument: query.to_string(),
        }
        .into()),
        1 => Ok(matches[0].clone()),
        _ => Err(ResolutionError {
            message: format!(
                "revision {query} is ambiguous; candidates: {}",
                matches.iter().map(|m| m.as_ref()).collect::<Vec<_>>().join(", ")
            ),
            argument: query.to_string(),
        }
        .into()),
    }
}

/// Resolve a branch qualifier (the text before `@`) to the revision it
/// names: either a declared branch label, or a revision id that itself
/// carries exactly one declared label (spec.md §9, open question 4).
pub fn resolve_branch_qualifier(map: &RevisionMap, qualifier: &str) -> Result<Arc<str>, RevisionError> {
    if let Some(rev) = map.label_revision(qualifier) {
        return Ok(rev.id().clone());
    }
    let id = resolve_literal(map, qualifier)?;
    match map.revision(&id).map(|r| r.branch_labels().len()) {
        Some(1) => Ok(id),
        _ => Err(RevisionError::AmbiguousBranchLabel(id)),
    }
}

/// Whether `a` and `b` share lineage under the full view: either is an
/// ancestor or descendant of the other (lineage is the union of a
/// revision's ancestors and descendants under the chosen view). Identity
/// counts as sharing lineage with itself.
pub fn shares_lineage(map: &RevisionMap, a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let Some(a_idx) = map.index_of(a) else { return false };
    let Some(b_idx) = map.index_of(b) else { return false };
    let ancestors_of_b = map.walk_indices(&[b_idx], EdgeSet::Full);
    if ancestors_of_b.contains(&a_idx) {
        return true;
    }
    let descendants_of_b = map.walk_indices(&[b_idx], EdgeSet::AllNextRev);
    descendants_of_b.contains(&a_idx)
}

/// Restrict `ids` to those sharing lineage with `branch_rev` (spec.md
/// §4.3's branch-qualifier filter, exposed standalone for the planners).
pub fn filter_for_lineage(map: &RevisionMap, ids: &[Arc<str>], branch_rev: &str) -> Vec<Arc<str>> {
    ids.iter().filter(|id| shares_lineage(map, branch_rev, id)).cloned().collect()
}

fn describe(parsed: &ParsedIdent) -> String {
    match (&parsed.branch, &parsed.body) {
        (Some(b), Body::Id(id)) => format!("{b}@{id}"),
        (Some(b), Body::Reserved(Symbol::Head)) => format!("{b}@head"),
        (Some(b), Body::Reserved(Symbol::Heads)) => format!("{b}@heads"),
        (Some(b), Body::Reserved(Symbol::Base)) => format!("{b}@base"),
        (None, Body::Id(id)) => id.to_string(),
        (None, Body::Reserved(Symbol::Head)) => "head".to_string(),
        (None, Body::Reserved(Symbol::Heads)) => "heads".to_string(),
        (None, Body::Reserved(Symbol::Base)) => "base".to_string(),
        _ => "<relative>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::parse_one;
    use crate::map::RevisionMap;
    use crate::revision::Revision;

    fn build(revs: Vec<Revision>) -> RevisionMap {
        RevisionMap::build(revs).unwrap().0
    }

    #[test]
    fn resolves_exact_and_partial_id() {
        let map = build(vec![
            Revision::new("abcdef", (), (), ()).unwrap(),
            Revision::new("abcdxyz", "abcdef", (), ()).unwrap(),
        ]);
        assert_eq!(resolve_literal(&map, "abcdef").unwrap(), Arc::<str>::from("abcdef"));
        // "ab" is too short to trigger partial matching.
        assert!(resolve_literal(&map, "ab").is_err());
        // "abcd" is long enough but ambiguous between the two ids, which share
        // that whole prefix.
        assert!(resolve_literal(&map, "abcd").is_err());
    }

    #[test]
    fn null_resolves_to_an_empty_set() {
        let map = build(vec![Revision::new("a", (), (), ()).unwrap()]);
        let parsed = parse_one("null");
        assert_eq!(resolve(&map, &parsed).unwrap(), Vec::<Arc<str>>::new());
    }

    #[test]
    fn resolves_unique_prefix() {
        let map = build(vec![
            Revision::new("abcdef", (), (), ()).unwrap(),
            Revision::new("zzzzzz", "abcdef", (), ()).unwrap(),
        ]);
        assert_eq!(resolve_literal(&map, "abcd").unwrap(), Arc::<str>::from("abcdef"));
    }

    #[test]
    fn head_symbol_errors_on_multiple_heads() {
        let map = build(vec![
            Revision::new("a", (), (), ()).unwrap(),
            Revision::new("b", "a", (), ()).unwrap(),
            Revision::new("c", "a", (), ()).unwrap(),
        ]);
        let parsed = parse_one("head");
        let err = resolve(&map, &parsed).unwrap_err();
        assert!(matches!(err, RevisionError::MultipleHeads(_)));
    }

    #[test]
    fn heads_symbol_returns_all_real_heads() {
        let map = build(vec![
            Revision::new("a", (), (), ()).unwrap(),
            Revision::new("b", "a", (), ()).unwrap(),
            Revision::new("c", "a", (), ()).unwrap(),
        ]);
        let parsed = parse_one("heads");
        let mut got = resolve(&map, &parsed).unwrap();
        got.sort();
        assert_eq!(got, vec![Arc::<str>::from("b"), Arc::from("c")]);
    }

    #[test]
    fn branch_qualified_relative_anchor_resolves_within_chain() {
        let map = build(vec![
            Revision::new("h", (), (), "label").unwrap(),
            Revision::new("m", "h", (), ()).unwrap(),
            Revision::new("t", "m", (), ()).unwrap(),
        ]);
        let parsed = parse_one("label@t");
        let resolved = resolve(&map, &parsed).unwrap();
        assert_eq!(resolved, vec![Arc::<str>::from("t")]);
    }
}
