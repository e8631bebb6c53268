//! SQL fragment tokenizer.
//!
//! Token text keeps its source form (quotes, brackets) and offsets are byte
//! offsets into the input, so callers can split the token stream without
//! lexing again. Compound operators (`not like`, `not in`, `not between`,
//! `is not`) and the `and` closing a `between` are single tokens.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit0, digit1, not_line_ending, one_of},
    combinator::{cut, map, opt, recognize},
    multi::many0,
    sequence::{pair, tuple},
};

use crate::error::{QueryError, QueryResult};

/// Words that are never property names.
pub const KEYWORDS: &[&str] = &["and", "or", "not", "in", "like", "between", "is", "null"];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    NotBetween,
    /// The `and` separating the bounds of a `between`.
    BetweenAnd,
    Is,
    IsNot,
    Null,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "and" => Some(Keyword::And),
            "or" => Some(Keyword::Or),
            "not" => Some(Keyword::Not),
            "in" => Some(Keyword::In),
            "like" => Some(Keyword::Like),
            "between" => Some(Keyword::Between),
            "is" => Some(Keyword::Is),
            "null" => Some(Keyword::Null),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    Number,
    String,
    Operator,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Unquoted value of a string token.
    pub fn string_value(&self) -> String {
        let text = self.text.strip_prefix(['N', 'n']).unwrap_or(&self.text);
        let inner = text
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(text);
        inner.replace("''", "'")
    }

    /// Segments of a dotted identifier with brackets and quotes removed.
    pub fn segments(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut rest = self.text.as_str();
        while !rest.is_empty() {
            let (segment, next) = match identifier_segment(rest) {
                Ok((next, segment)) => (segment, next),
                Err(_) => (rest, ""),
            };
            out.push(unquote_identifier(segment));
            rest = next.strip_prefix('.').unwrap_or(next);
        }
        out
    }
}

fn unquote_identifier(segment: &str) -> String {
    if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner.replace("]]", "]")
    } else if let Some(inner) = segment.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        inner.replace("\"\"", "\"")
    } else {
        segment.to_string()
    }
}

// ============================================================================
// Recognizers
// ============================================================================

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("--"), not_line_ending))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("/*"), cut(pair(take_until("*/"), tag("*/")))))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("Nn")),
        char('\''),
        cut(pair(many0(alt((tag("''"), is_not("'")))), char('\''))),
    )))(input)
}

fn bracket_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        char('['),
        cut(pair(many0(alt((tag("]]"), is_not("]")))), char(']'))),
    ))(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        char('"'),
        cut(pair(many0(alt((tag("\"\""), is_not("\"")))), char('"'))),
    ))(input)
}

fn plain_word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '@' || c == ':'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn identifier_segment(input: &str) -> IResult<&str, &str> {
    alt((bracket_identifier, quoted_identifier, plain_word))(input)
}

/// `a`, `[a b].c`, `"x".y`
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        identifier_segment,
        many0(pair(char('.'), identifier_segment)),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    ))(input)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<>"),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("||"),
        recognize(anychar),
    ))(input)
}

fn classify(word: &str) -> TokenKind {
    match Keyword::from_word(word) {
        Some(k) => TokenKind::Keyword(k),
        None => TokenKind::Identifier,
    }
}

fn token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((
        map(alt((line_comment, block_comment)), |t| (TokenKind::Comment, t)),
        map(string_literal, |t| (TokenKind::String, t)),
        map(number, |t| (TokenKind::Number, t)),
        map(identifier, |t| (classify(t), t)),
        map(operator, |t| (TokenKind::Operator, t)),
    ))(input)
}

/// Error for input where no token could be read.
fn lex_error(rest: &str, offset: usize) -> QueryError {
    let message = if rest.starts_with("/*") {
        "unterminated comment"
    } else if rest.starts_with('\'') || rest.starts_with("N'") || rest.starts_with("n'") {
        "unterminated string"
    } else if rest.starts_with('[') || rest.contains(".[") {
        "unterminated bracketed identifier"
    } else if rest.starts_with('"') || rest.contains(".\"") {
        "unterminated quoted identifier"
    } else {
        "unexpected character"
    };
    QueryError::lex(offset, message)
}

/// Split a SQL fragment into tokens.
pub fn tokenize(text: &str) -> QueryResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let offset = text.len() - rest.len();
        let (next, (kind, lexeme)) = token(rest).map_err(|_| lex_error(rest, offset))?;
        tokens.push(Token {
            kind,
            text: lexeme.to_string(),
            offset,
        });
        rest = next;
    }
    Ok(combine_compounds(tokens, text))
}

/// Merge two-word operators and mark the `and` of each `between`.
fn combine_compounds(tokens: Vec<Token>, source: &str) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut between_depths: Vec<i32> = Vec::new();
    let mut depth = 0i32;

    for mut tok in tokens {
        match tok.kind {
            TokenKind::Operator if tok.text == "(" => depth += 1,
            TokenKind::Operator if tok.text == ")" => {
                between_depths.retain(|d| *d < depth);
                depth -= 1;
            }
            TokenKind::Keyword(keyword) => {
                let prev = out
                    .iter()
                    .rposition(|t| t.kind != TokenKind::Comment)
                    .filter(|&i| matches!(out[i].kind, TokenKind::Keyword(_)));
                let merged = prev.and_then(|i| match (out[i].kind, keyword) {
                    (TokenKind::Keyword(Keyword::Not), Keyword::Like) => Some((i, Keyword::NotLike)),
                    (TokenKind::Keyword(Keyword::Not), Keyword::In) => Some((i, Keyword::NotIn)),
                    (TokenKind::Keyword(Keyword::Not), Keyword::Between) => {
                        Some((i, Keyword::NotBetween))
                    }
                    (TokenKind::Keyword(Keyword::Is), Keyword::Not) => Some((i, Keyword::IsNot)),
                    _ => None,
                });
                if matches!(keyword, Keyword::Between) {
                    between_depths.push(depth);
                }
                if let Some((i, compound)) = merged {
                    let start = out[i].offset;
                    let end = tok.offset + tok.text.len();
                    out[i].kind = TokenKind::Keyword(compound);
                    out[i].text = source[start..end].to_string();
                    continue;
                }
                if keyword == Keyword::And && between_depths.last() == Some(&depth) {
                    between_depths.pop();
                    tok.kind = TokenKind::Keyword(Keyword::BetweenAnd);
                }
            }
            _ => {}
        }
        out.push(tok);
    }
    out
}
