use pretty_assertions::assert_eq;

use crate::error::QueryError;
use crate::parser::lexer::*;

fn kinds(sql: &str) -> Vec<(TokenKind, String)> {
    tokenize(sql)
        .unwrap()
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect()
}

#[test]
fn test_token_kinds_and_offsets() {
    let tokens = tokenize("[Part].name = N'it''s' -- done").unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].segments(), vec!["Part", "name"]);
    assert_eq!(tokens[1].kind, TokenKind::Operator);
    assert_eq!(tokens[2].kind, TokenKind::String);
    assert_eq!(tokens[2].offset, 14);
    assert_eq!(tokens[2].string_value(), "it's");
    assert_eq!(tokens[3].kind, TokenKind::Comment);
}

#[test]
fn test_numbers_and_operators() {
    assert_eq!(
        kinds("a>=1.5e3<>x||'y'"),
        vec![
            (TokenKind::Identifier, "a".to_string()),
            (TokenKind::Operator, ">=".to_string()),
            (TokenKind::Number, "1.5e3".to_string()),
            (TokenKind::Operator, "<>".to_string()),
            (TokenKind::Identifier, "x".to_string()),
            (TokenKind::Operator, "||".to_string()),
            (TokenKind::String, "'y'".to_string()),
        ]
    );
}

#[test]
fn test_compound_keywords() {
    let tokens = tokenize("a NOT  LIKE 'x' and b is not null and c not in (1)").unwrap();
    let keywords: Vec<Keyword> = tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        })
        .collect();
    assert_eq!(
        keywords,
        vec![
            Keyword::NotLike,
            Keyword::And,
            Keyword::IsNot,
            Keyword::Null,
            Keyword::And,
            Keyword::NotIn,
        ]
    );
    assert_eq!(tokens[1].text, "NOT  LIKE");
}

#[test]
fn test_between_and_is_marked() {
    let tokens = tokenize("a between (1 and 2) and 3 and b = 1").unwrap();
    let keywords: Vec<Keyword> = tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        })
        .collect();
    assert_eq!(
        keywords,
        vec![
            Keyword::Between,
            Keyword::And,
            Keyword::BetweenAnd,
            Keyword::And,
        ]
    );
}

#[test]
fn test_block_comment_and_quoted_identifier() {
    assert_eq!(
        kinds("/* x */ \"my col\""),
        vec![
            (TokenKind::Comment, "/* x */".to_string()),
            (TokenKind::Identifier, "\"my col\"".to_string()),
        ]
    );
}

#[test]
fn test_lex_errors() {
    for (sql, message) in [
        ("a = 'open", "unterminated string"),
        ("[open", "unterminated bracketed identifier"),
        ("/* open", "unterminated comment"),
    ] {
        match tokenize(sql) {
            Err(QueryError::Lex { message: m, .. }) => assert_eq!(m, message),
            other => panic!("expected a lex error for {sql}, got {other:?}"),
        }
    }
}

#[test]
fn test_keyword_set() {
    assert!(is_keyword("AND"));
    assert!(is_keyword("null"));
    assert!(!is_keyword("name"));
}
