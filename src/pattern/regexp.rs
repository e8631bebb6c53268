//! Regular expression text to and from the pattern model.

use super::{
    Anchor, CharSet, CharSetItem, ClassKind, MatchKind, Pattern, PatternList, PatternMatch,
    Repetition,
};
use crate::error::{QueryError, QueryResult};

const META: &[char] = &[
    '\\', '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$',
];

pub(super) fn parse(text: &str) -> QueryResult<PatternList> {
    let mut parser = RegexParser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let list = parser.alternation()?;
    if parser.pos < parser.chars.len() {
        return Err(QueryError::parse(parser.pos, "unbalanced ')'"));
    }
    Ok(list)
}

struct RegexParser {
    chars: Vec<char>,
    pos: usize,
}

impl RegexParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn alternation(&mut self) -> QueryResult<PatternList> {
        let mut alternatives = vec![self.sequence()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            alternatives.push(self.sequence()?);
        }
        Ok(PatternList { alternatives })
    }

    fn sequence(&mut self) -> QueryResult<Pattern> {
        let mut matches = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let kind = self.atom()?;
            let repeat = self.quantifier()?;
            if repeat != Repetition::ONCE && matches!(kind, MatchKind::Anchor(_)) {
                return Err(QueryError::parse(self.pos, "quantifier on an anchor"));
            }
            matches.push(PatternMatch::new(kind, repeat));
        }
        Ok(Pattern { matches })
    }

    fn atom(&mut self) -> QueryResult<MatchKind> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Err(QueryError::parse(start, "unexpected end of pattern"));
        };
        let kind = match c {
            '(' => {
                if self.peek() == Some('?') && self.chars.get(self.pos + 1) == Some(&':') {
                    self.pos += 2;
                }
                let inner = self.alternation()?;
                if self.bump() != Some(')') {
                    return Err(QueryError::parse(start, "unterminated group"));
                }
                MatchKind::Capture(inner)
            }
            '[' => MatchKind::CharSet(self.char_class(start)?),
            '.' => MatchKind::CharSet(CharSet::class(ClassKind::Any)),
            '^' => MatchKind::Anchor(Anchor::Start),
            '$' => MatchKind::Anchor(Anchor::End),
            '\\' => self.escape(start)?,
            '*' | '+' | '?' => {
                return Err(QueryError::parse(start, format!("nothing to repeat before '{}'", c)));
            }
            other => MatchKind::StringMatch(other.to_string()),
        };
        Ok(kind)
    }

    fn escape(&mut self, start: usize) -> QueryResult<MatchKind> {
        let Some(c) = self.bump() else {
            return Err(QueryError::parse(start, "trailing backslash"));
        };
        let class = |kind, inverted| {
            MatchKind::CharSet(CharSet {
                items: vec![CharSetItem::Class(kind)],
                inverted,
            })
        };
        Ok(match c {
            'd' => class(ClassKind::Digit, false),
            'D' => class(ClassKind::Digit, true),
            'w' => class(ClassKind::Word, false),
            'W' => class(ClassKind::Word, true),
            's' => class(ClassKind::Whitespace, false),
            'S' => class(ClassKind::Whitespace, true),
            'b' => MatchKind::Anchor(Anchor::WordBoundary),
            'n' => MatchKind::StringMatch("\n".to_string()),
            't' => MatchKind::StringMatch("\t".to_string()),
            'r' => MatchKind::StringMatch("\r".to_string()),
            other => MatchKind::StringMatch(other.to_string()),
        })
    }

    fn char_class(&mut self, start: usize) -> QueryResult<CharSet> {
        let mut set = CharSet::default();
        if self.peek() == Some('^') {
            set.inverted = true;
            self.pos += 1;
        }
        let mut first = true;
        loop {
            let Some(c) = self.bump() else {
                return Err(QueryError::parse(start, "unterminated character class"));
            };
            if c == ']' && !first {
                return Ok(set);
            }
            first = false;
            let item = if c == '\\' {
                match self.bump() {
                    Some('d') => CharSetItem::Class(ClassKind::Digit),
                    Some('w') => CharSetItem::Class(ClassKind::Word),
                    Some('s') => CharSetItem::Class(ClassKind::Whitespace),
                    Some(other) => CharSetItem::Char(other),
                    None => return Err(QueryError::parse(start, "unterminated character class")),
                }
            } else {
                CharSetItem::Char(c)
            };
            if let CharSetItem::Char(lo) = item {
                let is_range = self.peek() == Some('-')
                    && self.chars.get(self.pos + 1).is_some_and(|e| *e != ']');
                if is_range {
                    self.pos += 1;
                    let hi = self.bump().unwrap_or(lo);
                    set.items.push(CharSetItem::Range(lo, hi));
                    continue;
                }
            }
            set.items.push(item);
        }
    }

    fn quantifier(&mut self) -> QueryResult<Repetition> {
        let repeat = match self.peek() {
            Some('*') => Repetition::ANY,
            Some('+') => Repetition {
                min: 1,
                max: None,
                greedy: true,
            },
            Some('?') => Repetition {
                min: 0,
                max: Some(1),
                greedy: true,
            },
            Some('{') => {
                return match self.braces() {
                    Some(r) => Ok(self.lazy_suffix(r)),
                    None => Ok(Repetition::ONCE),
                };
            }
            _ => return Ok(Repetition::ONCE),
        };
        self.pos += 1;
        Ok(self.lazy_suffix(repeat))
    }

    fn lazy_suffix(&mut self, mut repeat: Repetition) -> Repetition {
        if self.peek() == Some('?') {
            self.pos += 1;
            repeat.greedy = false;
        }
        repeat
    }

    /// `{n}`, `{n,}` or `{n,m}`. Leaves the position after `}` on success.
    fn braces(&mut self) -> Option<Repetition> {
        let rest: String = self.chars[self.pos..].iter().collect();
        let end = rest.find('}')?;
        let body = &rest[1..end];
        let (min, max) = match body.split_once(',') {
            Some((lo, "")) => (lo.trim().parse().ok()?, None),
            Some((lo, hi)) => (lo.trim().parse().ok()?, Some(hi.trim().parse().ok()?)),
            None => {
                let n = body.trim().parse().ok()?;
                (n, Some(n))
            }
        };
        self.pos += rest[..=end].chars().count();
        Some(Repetition {
            min,
            max,
            greedy: true,
        })
    }
}

pub(super) fn render(list: &PatternList) -> String {
    list.alternatives
        .iter()
        .map(render_top)
        .collect::<Vec<_>>()
        .join("|")
}

fn render_top(pattern: &Pattern) -> String {
    let mut matches = pattern.matches.as_slice();
    if matches.len() >= 2 && matches[0].is_anchor(Anchor::Start) && matches[1].is_any_run() {
        matches = &matches[2..];
    }
    let n = matches.len();
    if n >= 2 && matches[n - 1].is_anchor(Anchor::End) && matches[n - 2].is_any_run() {
        matches = &matches[..n - 2];
    }
    render_matches(matches)
}

fn render_matches(matches: &[PatternMatch]) -> String {
    let mut out = String::new();
    for m in matches {
        match &m.kind {
            MatchKind::Anchor(Anchor::Start) => out.push('^'),
            MatchKind::Anchor(Anchor::End) => out.push('$'),
            MatchKind::Anchor(Anchor::WordBoundary) => out.push_str("\\b"),
            MatchKind::StringMatch(text) => {
                let escaped = escape_literal(text);
                if !m.repeat.is_once() && text.chars().count() > 1 {
                    out.push_str(&format!("(?:{})", escaped));
                } else {
                    out.push_str(&escaped);
                }
            }
            MatchKind::CharSet(set) => out.push_str(&render_char_set(set)),
            MatchKind::Capture(inner) => {
                let body = inner
                    .alternatives
                    .iter()
                    .map(|p| render_matches(&p.matches))
                    .collect::<Vec<_>>()
                    .join("|");
                out.push_str(&format!("({})", body));
            }
        }
        out.push_str(&render_repeat(m.repeat));
    }
    out
}

fn render_repeat(repeat: Repetition) -> String {
    let base = match (repeat.min, repeat.max) {
        (1, Some(1)) => return String::new(),
        (0, None) => "*".to_string(),
        (1, None) => "+".to_string(),
        (0, Some(1)) => "?".to_string(),
        (n, Some(m)) if n == m => format!("{{{}}}", n),
        (n, None) => format!("{{{},}}", n),
        (n, Some(m)) => format!("{{{},{}}}", n, m),
    };
    if repeat.greedy { base } else { format!("{}?", base) }
}

fn render_char_set(set: &CharSet) -> String {
    if !set.inverted {
        if let [CharSetItem::Class(kind)] = set.items.as_slice() {
            return match kind {
                ClassKind::Any => ".".to_string(),
                ClassKind::Digit => "\\d".to_string(),
                ClassKind::Word => "\\w".to_string(),
                ClassKind::Whitespace => "\\s".to_string(),
            };
        }
    }
    let mut out = String::from("[");
    if set.inverted {
        out.push('^');
    }
    for item in &set.items {
        match item {
            CharSetItem::Char(c) => push_class_char(&mut out, *c),
            CharSetItem::Range(a, b) => {
                push_class_char(&mut out, *a);
                out.push('-');
                push_class_char(&mut out, *b);
            }
            CharSetItem::Class(ClassKind::Any) => out.push_str("\\s\\S"),
            CharSetItem::Class(ClassKind::Digit) => out.push_str("\\d"),
            CharSetItem::Class(ClassKind::Word) => out.push_str("\\w"),
            CharSetItem::Class(ClassKind::Whitespace) => out.push_str("\\s"),
        }
    }
    out.push(']');
    out
}

fn push_class_char(out: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '^' | '-') {
        out.push('\\');
    }
    out.push(c);
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
