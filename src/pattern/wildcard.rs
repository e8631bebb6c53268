//! Wildcard syntaxes: SQL LIKE, AML, simple search and Visual Basic.

use super::{
    Anchor, CharSet, CharSetItem, ClassKind, MatchKind, Pattern, PatternList, PatternMatch,
    Repetition,
};
use crate::error::{QueryError, QueryResult};

/// Description of a wildcard dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildcardSyntax {
    /// Characters matching any run of characters. The first one is used
    /// when rendering.
    pub any_run: &'static [char],
    pub single_char: Option<char>,
    pub single_digit: Option<char>,
    /// Character making the next character literal.
    pub escape: Option<char>,
    /// Whether `[...]` character classes are understood.
    pub brackets: bool,
    /// Character inverting a bracket class (`^` or `!`).
    pub bracket_negation: char,
}

impl WildcardSyntax {
    /// SQL Server LIKE: `% _ [...] [^...]`.
    pub const SQL_SERVER: WildcardSyntax = WildcardSyntax {
        any_run: &['%'],
        single_char: Some('_'),
        single_digit: None,
        escape: None,
        brackets: true,
        bracket_negation: '^',
    };

    /// AML `like` criteria, which accept both `%` and `*`.
    pub const AML: WildcardSyntax = WildcardSyntax {
        any_run: &['%', '*'],
        single_char: Some('_'),
        single_digit: None,
        escape: None,
        brackets: true,
        bracket_negation: '^',
    };

    /// Search box text: `*` and `%`, backslash escapes.
    pub const SIMPLE_SEARCH: WildcardSyntax = WildcardSyntax {
        any_run: &['*', '%'],
        single_char: None,
        single_digit: None,
        escape: Some('\\'),
        brackets: false,
        bracket_negation: '^',
    };

    /// Visual Basic `Like`: `* ? # [...] [!...]`.
    pub const VISUAL_BASIC: WildcardSyntax = WildcardSyntax {
        any_run: &['*'],
        single_char: Some('?'),
        single_digit: Some('#'),
        escape: None,
        brackets: true,
        bracket_negation: '!',
    };

    fn is_special(&self, c: char) -> bool {
        self.any_run.contains(&c)
            || self.single_char == Some(c)
            || self.single_digit == Some(c)
            || self.escape == Some(c)
            || (self.brackets && c == '[')
    }
}

pub(super) fn parse(text: &str, syntax: &WildcardSyntax) -> QueryResult<PatternList> {
    let chars: Vec<char> = text.chars().collect();
    let mut matches = vec![PatternMatch::anchor(Anchor::Start)];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if syntax.escape == Some(c) {
            match chars.get(i + 1) {
                Some(next) => {
                    matches.push(PatternMatch::literal(next.to_string()));
                    i += 2;
                }
                None => {
                    matches.push(PatternMatch::literal(c.to_string()));
                    i += 1;
                }
            }
            continue;
        }
        if syntax.any_run.contains(&c) {
            matches.push(PatternMatch::any_run());
        } else if syntax.single_char == Some(c) {
            matches.push(PatternMatch::any_char());
        } else if syntax.single_digit == Some(c) {
            matches.push(PatternMatch::new(
                MatchKind::CharSet(CharSet::class(ClassKind::Digit)),
                Repetition::ONCE,
            ));
        } else if syntax.brackets && c == '[' {
            let (set, next) = parse_bracket(&chars, i, syntax)?;
            matches.push(PatternMatch::new(MatchKind::CharSet(set), Repetition::ONCE));
            i = next;
            continue;
        } else {
            matches.push(PatternMatch::literal(c.to_string()));
        }
        i += 1;
    }
    matches.push(PatternMatch::anchor(Anchor::End));
    Ok(PatternList::single(Pattern { matches }))
}

/// Parse `[...]` starting at `start`; returns the set and the index after `]`.
fn parse_bracket(
    chars: &[char],
    start: usize,
    syntax: &WildcardSyntax,
) -> QueryResult<(CharSet, usize)> {
    let mut i = start + 1;
    let mut set = CharSet::default();
    if chars.get(i) == Some(&syntax.bracket_negation) {
        set.inverted = true;
        i += 1;
    }
    let mut first = true;
    loop {
        let Some(&c) = chars.get(i) else {
            return Err(QueryError::parse(start, "unterminated character class"));
        };
        if c == ']' && !first {
            return Ok((set, i + 1));
        }
        first = false;
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|e| *e != ']') {
            set.items.push(CharSetItem::Range(c, chars[i + 2]));
            i += 3;
        } else {
            set.items.push(CharSetItem::Char(c));
            i += 1;
        }
    }
}

pub(super) fn render(list: &PatternList, syntax: &WildcardSyntax) -> QueryResult<String> {
    let pattern = match list.alternatives.as_slice() {
        [] => return Ok(String::new()),
        [single] => single,
        _ => {
            return Err(QueryError::unsupported(
                "alternatives cannot be expressed as a wildcard pattern",
            ));
        }
    };
    let any_run = syntax
        .any_run
        .first()
        .copied()
        .ok_or_else(|| QueryError::unsupported("wildcard syntax has no any-run character"))?;

    let mut matches = pattern.matches.as_slice();
    let mut anchored_start = false;
    let mut anchored_end = false;
    if let Some((first, rest)) = matches.split_first() {
        if first.is_anchor(Anchor::Start) {
            matches = rest;
            anchored_start = true;
        }
    }
    if let Some((last, rest)) = matches.split_last() {
        if last.is_anchor(Anchor::End) {
            matches = rest;
            anchored_end = true;
        }
    }
    let lead = !anchored_start && !matches.first().is_some_and(|m| m.is_any_run());
    let trail = !anchored_end
        && !matches.last().is_some_and(|m| m.is_any_run())
        && !(lead && matches.is_empty());

    let mut out = String::new();
    if lead {
        out.push(any_run);
    }
    render_matches(matches, syntax, any_run, &mut out)?;
    if trail {
        out.push(any_run);
    }
    Ok(out)
}

fn render_matches(
    matches: &[PatternMatch],
    syntax: &WildcardSyntax,
    any_run: char,
    out: &mut String,
) -> QueryResult<()> {
    for m in matches {
        match &m.kind {
            MatchKind::Anchor(anchor) => {
                return Err(QueryError::unsupported(format!(
                    "anchor {:?} inside a wildcard pattern",
                    anchor
                )));
            }
            MatchKind::Capture(inner) => {
                if !m.repeat.is_once() {
                    return Err(QueryError::unsupported("repeated group in a wildcard pattern"));
                }
                let [alt] = inner.alternatives.as_slice() else {
                    return Err(QueryError::unsupported(
                        "alternatives cannot be expressed as a wildcard pattern",
                    ));
                };
                render_matches(&alt.matches, syntax, any_run, out)?;
            }
            MatchKind::StringMatch(text) => {
                let unit = render_literal(text, syntax)?;
                repeat_unit(&unit, m.repeat, None, out)?;
            }
            MatchKind::CharSet(set) => {
                if set.is_class(ClassKind::Any) {
                    let single = syntax.single_char.map(|c| c.to_string());
                    if m.repeat.max.is_none() && m.repeat.min == 0 {
                        out.push(any_run);
                        continue;
                    }
                    let unit = single.ok_or_else(|| {
                        QueryError::unsupported("single-character wildcard not available")
                    })?;
                    repeat_unit(&unit, m.repeat, Some(any_run), out)?;
                } else {
                    let unit = render_char_set(set, syntax)?;
                    repeat_unit(&unit, m.repeat, None, out)?;
                }
            }
        }
    }
    Ok(())
}

/// Write `unit` `repeat.min` times, then an any-run when unbounded.
fn repeat_unit(
    unit: &str,
    repeat: Repetition,
    any_run: Option<char>,
    out: &mut String,
) -> QueryResult<()> {
    match (repeat.max, any_run) {
        (Some(max), _) if max == repeat.min => {
            for _ in 0..repeat.min {
                out.push_str(unit);
            }
            Ok(())
        }
        (None, Some(run)) => {
            for _ in 0..repeat.min {
                out.push_str(unit);
            }
            out.push(run);
            Ok(())
        }
        _ => Err(QueryError::unsupported(format!(
            "repetition {{{},{}}} in a wildcard pattern",
            repeat.min,
            repeat.max.map(|m| m.to_string()).unwrap_or_default()
        ))),
    }
}

fn render_literal(text: &str, syntax: &WildcardSyntax) -> QueryResult<String> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if !syntax.is_special(c) {
            out.push(c);
        } else if let Some(escape) = syntax.escape {
            out.push(escape);
            out.push(c);
        } else if syntax.brackets {
            out.push('[');
            out.push(c);
            out.push(']');
        } else if let Some(single) = syntax.single_char {
            tracing::warn!("Literal '{}' rendered as single-character wildcard", c);
            out.push(single);
        } else {
            return Err(QueryError::unsupported(format!(
                "literal '{}' cannot be escaped in this wildcard syntax",
                c
            )));
        }
    }
    Ok(out)
}

fn render_char_set(set: &CharSet, syntax: &WildcardSyntax) -> QueryResult<String> {
    if set.is_class(ClassKind::Digit) {
        if let Some(digit) = syntax.single_digit {
            return Ok(digit.to_string());
        }
    }
    if syntax.brackets {
        let mut out = String::from("[");
        if set.inverted {
            out.push(syntax.bracket_negation);
        }
        for item in &set.items {
            match item {
                CharSetItem::Char(c) => out.push(*c),
                CharSetItem::Range(a, b) => {
                    out.push(*a);
                    out.push('-');
                    out.push(*b);
                }
                CharSetItem::Class(ClassKind::Digit) => out.push_str("0-9"),
                CharSetItem::Class(ClassKind::Word) => out.push_str("a-zA-Z0-9_"),
                CharSetItem::Class(ClassKind::Whitespace) => out.push_str(" \t\r\n"),
                CharSetItem::Class(ClassKind::Any) => {
                    return Err(QueryError::unsupported("any-character class inside brackets"));
                }
            }
        }
        out.push(']');
        return Ok(out);
    }
    match syntax.single_char {
        Some(single) => {
            tracing::warn!("Character class degraded to single-character wildcard");
            Ok(single.to_string())
        }
        None => Err(QueryError::unsupported(
            "character classes cannot be expressed in this wildcard syntax",
        )),
    }
}
