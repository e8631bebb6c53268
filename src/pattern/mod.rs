//! Dialect-neutral wildcard and regular expression patterns.
//!
//! A [`PatternList`] is the right-hand operand of LIKE. It is parsed from a
//! wildcard string (SQL Server, AML, simple search or Visual Basic syntax) or
//! from regular expression text, and rendered back into any of them.
//!
//! # Example
//! ```
//! use aml_query::pattern::{PatternList, WildcardSyntax};
//!
//! let pattern = PatternList::parse_wildcard("%ab_c%", &WildcardSyntax::SQL_SERVER).unwrap();
//! assert_eq!(pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(), "%ab_c%");
//! assert_eq!(pattern.render_regex(), "ab.c");
//! ```

mod regexp;
mod simplify;
mod wildcard;

#[cfg(test)]
mod tests;

use std::fmt;

pub use wildcard::WildcardSyntax;

/// Alternatives of a pattern (`a|b` in regex syntax).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternList {
    pub alternatives: Vec<Pattern>,
}

/// A sequence of matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    pub matches: Vec<PatternMatch>,
}

/// One element of a pattern together with how often it repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub kind: MatchKind,
    pub repeat: Repetition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Anchor(Anchor),
    CharSet(CharSet),
    StringMatch(String),
    Capture(PatternList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
    WordBoundary,
}

/// Predefined character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Any single character.
    Any,
    Digit,
    Word,
    Whitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSetItem {
    Char(char),
    Range(char, char),
    Class(ClassKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharSet {
    pub items: Vec<CharSetItem>,
    pub inverted: bool,
}

/// Repetition range. `max == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    pub min: u32,
    pub max: Option<u32>,
    pub greedy: bool,
}

impl Repetition {
    pub const ONCE: Repetition = Repetition {
        min: 1,
        max: Some(1),
        greedy: true,
    };

    pub const ANY: Repetition = Repetition {
        min: 0,
        max: None,
        greedy: true,
    };

    pub fn exactly(n: u32) -> Self {
        Self {
            min: n,
            max: Some(n),
            greedy: true,
        }
    }

    pub fn is_once(&self) -> bool {
        self.min == 1 && self.max == Some(1)
    }
}

impl Default for Repetition {
    fn default() -> Self {
        Self::ONCE
    }
}

impl CharSet {
    pub fn class(kind: ClassKind) -> Self {
        Self {
            items: vec![CharSetItem::Class(kind)],
            inverted: false,
        }
    }

    pub fn is_class(&self, kind: ClassKind) -> bool {
        !self.inverted && self.items == [CharSetItem::Class(kind)]
    }

    /// The character when this set matches exactly one literal character.
    pub fn single_char(&self) -> Option<char> {
        match self.items.as_slice() {
            [CharSetItem::Char(c)] if !self.inverted => Some(*c),
            [CharSetItem::Range(a, b)] if !self.inverted && a == b => Some(*a),
            _ => None,
        }
    }
}

impl PatternMatch {
    pub fn new(kind: MatchKind, repeat: Repetition) -> Self {
        Self { kind, repeat }
    }

    pub fn anchor(anchor: Anchor) -> Self {
        Self::new(MatchKind::Anchor(anchor), Repetition::ONCE)
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(MatchKind::StringMatch(text.into()), Repetition::ONCE)
    }

    /// Any run of characters (`%` in SQL).
    pub fn any_run() -> Self {
        Self::new(MatchKind::CharSet(CharSet::class(ClassKind::Any)), Repetition::ANY)
    }

    pub fn any_char() -> Self {
        Self::new(MatchKind::CharSet(CharSet::class(ClassKind::Any)), Repetition::ONCE)
    }

    pub fn is_any_run(&self) -> bool {
        matches!(&self.kind, MatchKind::CharSet(set) if set.is_class(ClassKind::Any))
            && self.repeat.min == 0
            && self.repeat.max.is_none()
    }

    pub fn is_anchor(&self, anchor: Anchor) -> bool {
        matches!(self.kind, MatchKind::Anchor(a) if a == anchor)
    }

    fn literal_text(&self) -> Option<&str> {
        match &self.kind {
            MatchKind::StringMatch(s) if self.repeat.is_once() => Some(s),
            _ => None,
        }
    }
}

/// How a LIKE pattern reduces to a plain string test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeShape {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
}

impl PatternList {
    pub fn single(pattern: Pattern) -> Self {
        Self {
            alternatives: vec![pattern],
        }
    }

    /// Anchored pattern matching exactly `text`.
    pub fn from_literal(text: &str) -> Self {
        let mut matches = vec![PatternMatch::anchor(Anchor::Start)];
        if !text.is_empty() {
            matches.push(PatternMatch::literal(text));
        }
        matches.push(PatternMatch::anchor(Anchor::End));
        Self::single(Pattern { matches })
    }

    /// Pattern for a [`LikeShape`] test against `text`.
    pub fn from_shape(shape: LikeShape, text: &str) -> Self {
        let mut matches = vec![PatternMatch::anchor(Anchor::Start)];
        if matches!(shape, LikeShape::EndsWith | LikeShape::Contains) {
            matches.push(PatternMatch::any_run());
        }
        if !text.is_empty() {
            matches.push(PatternMatch::literal(text));
        }
        if matches!(shape, LikeShape::StartsWith | LikeShape::Contains) {
            matches.push(PatternMatch::any_run());
        }
        matches.push(PatternMatch::anchor(Anchor::End));
        Self::single(Pattern { matches })
    }

    /// Parse a wildcard string in the given syntax. The result is anchored
    /// at both ends and simplified.
    pub fn parse_wildcard(text: &str, syntax: &WildcardSyntax) -> crate::QueryResult<Self> {
        wildcard::parse(text, syntax).map(|p| p.simplify())
    }

    pub fn render_wildcard(&self, syntax: &WildcardSyntax) -> crate::QueryResult<String> {
        wildcard::render(self, syntax)
    }

    /// Parse regular expression text.
    pub fn parse_regex(text: &str) -> crate::QueryResult<Self> {
        regexp::parse(text).map(|p| p.simplify())
    }

    /// Render as regular expression text. A leading `^.*` and a trailing
    /// `.*$` are dropped.
    pub fn render_regex(&self) -> String {
        regexp::render(self)
    }

    pub fn simplify(self) -> Self {
        simplify::simplify_list(self)
    }

    /// The matched text when the pattern contains no wildcard at all.
    pub fn literal(&self) -> Option<String> {
        let body = self.anchored_body()?;
        let mut text = String::new();
        for m in body {
            text.push_str(m.literal_text()?);
        }
        Some(text)
    }

    /// Reduce to an equality or a starts-with/ends-with/contains test.
    pub fn decompose(&self) -> Option<(LikeShape, String)> {
        let [pattern] = self.alternatives.as_slice() else {
            return None;
        };
        let mut body = pattern.matches.as_slice();
        let mut leading = true;
        let mut trailing = true;
        if let Some((first, rest)) = body.split_first() {
            if first.is_anchor(Anchor::Start) {
                leading = false;
                body = rest;
            }
        }
        if let Some((last, rest)) = body.split_last() {
            if last.is_anchor(Anchor::End) {
                trailing = false;
                body = rest;
            }
        }
        if let Some((first, rest)) = body.split_first() {
            if first.is_any_run() {
                leading = true;
                body = rest;
            }
        }
        if let Some((last, rest)) = body.split_last() {
            if last.is_any_run() {
                trailing = true;
                body = rest;
            }
        }
        let text = match body {
            [] => String::new(),
            [m] => m.literal_text()?.to_string(),
            _ => return None,
        };
        let shape = match (leading, trailing) {
            (false, false) => LikeShape::Equals,
            (false, true) => LikeShape::StartsWith,
            (true, false) => LikeShape::EndsWith,
            (true, true) => LikeShape::Contains,
        };
        Some((shape, text))
    }

    pub fn has_wildcards(&self) -> bool {
        self.literal().is_none()
    }

    fn anchored_body(&self) -> Option<&[PatternMatch]> {
        let [pattern] = self.alternatives.as_slice() else {
            return None;
        };
        let (first, rest) = pattern.matches.split_first()?;
        let (last, body) = rest.split_last()?;
        (first.is_anchor(Anchor::Start) && last.is_anchor(Anchor::End)).then_some(body)
    }
}

impl fmt::Display for PatternList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.render_regex())
    }
}
