//! Identifier parsing: classifies user-supplied strings into absolute or
//! relative forms, per spec.md §4.1/§6. Grounded directly on the original
//! `alembic/script/revision.py::_relative_destination` regex
//! (`(?:(.+?)@)?(\w+)?((?:\+|-)\d+)`) since the distilled spec states the
//! grammar but not a ready-made implementation.

use std::sync::Arc;

use crate::error::RevisionError;

/// One or more identifiers as accepted at the public resolver edge: `null`,
/// a single string, or an ordered collection of strings (spec.md §4.1).
#[derive(Clone, Debug)]
pub enum IdArg {
    Null,
    Single(Arc<str>),
    Many(Vec<Arc<str>>),
}

impl From<()> for IdArg {
    fn from(_: ()) -> Self {
        IdArg::Null
    }
}

impl From<&str> for IdArg {
    fn from(value: &str) -> Self {
        IdArg::Single(Arc::from(value))
    }
}

impl From<String> for IdArg {
    fn from(value: String) -> Self {
        IdArg::Single(Arc::from(value.as_str()))
    }
}

impl From<Arc<str>> for IdArg {
    fn from(value: Arc<str>) -> Self {
        IdArg::Single(value)
    }
}

impl<T: Into<Arc<str>>> From<Vec<T>> for IdArg {
    fn from(value: Vec<T>) -> Self {
        IdArg::Many(value.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for IdArg
where
    IdArg: From<T>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            None => IdArg::Null,
            Some(v) => IdArg::from(v),
        }
    }
}

/// The reserved absolute tokens, per spec.md §4.1/§6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Base,
    Head,
    Heads,
}

/// An identifier body after branch-qualifier extraction, classified into
/// absolute or relative form (spec.md §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// One of `base`/`head`/`heads`.
    Reserved(Symbol),
    /// An ordinary id, possibly a partial prefix.
    Id(Arc<str>),
    /// `{symbol?}{+|-}{digits}`.
    Relative { symbol: Option<Arc<str>>, offset: i64 },
}

/// A single parsed identifier: an optional branch qualifier plus the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedIdent {
    pub branch: Option<Arc<str>>,
    pub body: Body,
}

/// Parse one identifier string into branch qualifier + body.
///
/// Grammar (spec.md §4.1): extract a branch prefix (`{branch}@`, if
/// present), then classify the remainder. If the remainder matches
/// `{symbol?}{sign}{digits}` it's relative; `base`/`head`/`heads` are
/// reserved; anything else is an absolute (possibly partial) id.
pub fn parse_one(raw: &str) -> ParsedIdent {
    let (branch, body_str) = match raw.split_once('@') {
        Some((b, rest)) => (Some(Arc::from(b)), rest),
        None => (None, raw),
    };

    if let Some((symbol, offset)) = parse_relative(body_str) {
        return ParsedIdent {
            branch,
            body: Body::Relative { symbol, offset },
        };
    }

    let body = match body_str {
        "base" | "null" => Body::Reserved(Symbol::Base),
        "head" => Body::Reserved(Symbol::Head),
        "heads" => Body::Reserved(Symbol::Heads),
        other => Body::Id(Arc::from(other)),
    };
    ParsedIdent { branch, body }
}

/// Try to split `body` into `{symbol?}{+|-}{digits}`. The sign and at least
/// one digit are mandatory; the symbol prefix (a run of characters none of
/// which are `@`, `-`, `+`) is optional.
fn parse_relative(body: &str) -> Option<(Option<Arc<str>>, i64)> {
    let sign_pos = body.rfind(['+', '-'])?;
    let (symbol_part, sign_and_digits) = body.split_at(sign_pos);
    let sign = match sign_and_digits.as_bytes()[0] {
        b'+' => 1i64,
        b'-' => -1i64,
        _ => return None,
    };
    let digits = &sign_and_digits[1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude: i64 = digits.parse().ok()?;
    let symbol = if symbol_part.is_empty() {
        None
    } else {
        Some(Arc::from(symbol_part))
    };
    Some((symbol, sign * magnitude))
}

/// Parse the top-level `IdArg` accepted at the resolver edge into a
/// flat list of [`ParsedIdent`], or reject non-string-like shapes (spec.md
/// §4.1: "Rejects any other shape with a fatal error").
pub fn parse_arg(arg: &IdArg) -> Result<Vec<ParsedIdent>, RevisionError> {
    match arg {
        IdArg::Null => Ok(Vec::new()),
        IdArg::Single(s) => Ok(vec![parse_one(s)]),
        IdArg::Many(items) => Ok(items.iter().map(|s| parse_one(s)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_id() {
        let p = parse_one("abc123");
        assert_eq!(p.branch, None);
        assert_eq!(p.body, Body::Id(Arc::from("abc123")));
    }

    #[test]
    fn parses_reserved_symbols() {
        assert_eq!(parse_one("head").body, Body::Reserved(Symbol::Head));
        assert_eq!(parse_one("heads").body, Body::Reserved(Symbol::Heads));
        assert_eq!(parse_one("base").body, Body::Reserved(Symbol::Base));
    }

    #[test]
    fn null_is_an_alias_for_base() {
        assert_eq!(parse_one("null").body, Body::Reserved(Symbol::Base));
    }

    #[test]
    fn parses_branch_qualified_id() {
        let p = parse_one("mybranch@abc123");
        assert_eq!(p.branch.as_deref(), Some("mybranch"));
        assert_eq!(p.body, Body::Id(Arc::from("abc123")));
    }

    #[test]
    fn parses_relative_with_symbol() {
        let p = parse_one("head-2");
        assert_eq!(p.branch, None);
        assert_eq!(
            p.body,
            Body::Relative { symbol: Some(Arc::from("head")), offset: -2 }
        );
    }

    #[test]
    fn parses_relative_without_symbol() {
        let p = parse_one("+3");
        assert_eq!(p.body, Body::Relative { symbol: None, offset: 3 });
    }

    #[test]
    fn parses_branch_and_relative() {
        let p = parse_one("mybranch@head-2");
        assert_eq!(p.branch.as_deref(), Some("mybranch"));
        assert_eq!(
            p.body,
            Body::Relative { symbol: Some(Arc::from("head")), offset: -2 }
        );
    }

    #[test]
    fn plain_offset_is_relative_not_id() {
        let p = parse_one("-1");
        assert_eq!(p.body, Body::Relative { symbol: None, offset: -1 });
    }
}
