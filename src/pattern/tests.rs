use pretty_assertions::assert_eq;

use super::*;

fn sql(text: &str) -> PatternList {
    PatternList::parse_wildcard(text, &WildcardSyntax::SQL_SERVER).unwrap()
}

// ============================================================================
// Wildcard parsing and rendering
// ============================================================================

#[test]
fn test_sql_like_round_trip() {
    for text in ["%ab_c%", "abc", "ab%", "%ab", "a__b", "_%", "%"] {
        let pattern = sql(text);
        assert_eq!(
            pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
            text
        );
    }
}

#[test]
fn test_parse_adds_anchors_and_merges_literals() {
    let pattern = sql("ab%");
    assert_eq!(
        pattern.alternatives[0].matches,
        vec![
            PatternMatch::anchor(Anchor::Start),
            PatternMatch::literal("ab"),
            PatternMatch::any_run(),
            PatternMatch::anchor(Anchor::End),
        ]
    );
}

#[test]
fn test_single_char_bracket_folds_into_literal() {
    let pattern = sql("50[%]");
    assert_eq!(pattern.literal(), Some("50%".to_string()));
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "50[%]"
    );
}

#[test]
fn test_bracket_class_to_visual_basic() {
    let pattern = sql("[^a-c]x");
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::VISUAL_BASIC).unwrap(),
        "[!a-c]x"
    );
}

#[test]
fn test_aml_star_is_any_run() {
    let pattern = PatternList::parse_wildcard("Part*", &WildcardSyntax::AML).unwrap();
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "Part%"
    );
}

#[test]
fn test_simple_search_escape() {
    let pattern =
        PatternList::parse_wildcard("10\\*2*", &WildcardSyntax::SIMPLE_SEARCH).unwrap();
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SIMPLE_SEARCH).unwrap(),
        "10\\*2*"
    );
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "10*2%"
    );
}

#[test]
fn test_single_char_unsupported_in_simple_search() {
    let err = sql("a_b")
        .render_wildcard(&WildcardSyntax::SIMPLE_SEARCH)
        .unwrap_err();
    assert!(matches!(err, crate::QueryError::Unsupported(_)));
}

#[test]
fn test_digit_wildcard() {
    let pattern = PatternList::parse_wildcard("A##", &WildcardSyntax::VISUAL_BASIC).unwrap();
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "A[0-9][0-9]"
    );
    assert_eq!(pattern.render_regex(), "^A\\d{2}$");
}

#[test]
fn test_unterminated_bracket() {
    let err = PatternList::parse_wildcard("ab[c", &WildcardSyntax::SQL_SERVER).unwrap_err();
    assert!(matches!(err, crate::QueryError::Parse { position: 2, .. }));
}

// ============================================================================
// Regex
// ============================================================================

#[test]
fn test_render_regex_strips_open_ends() {
    assert_eq!(sql("%ab_c%").render_regex(), "ab.c");
    assert_eq!(sql("ab%").render_regex(), "^ab");
    assert_eq!(sql("%ab").render_regex(), "ab$");
    assert_eq!(sql("a.b").render_regex(), "^a\\.b$");
}

#[test]
fn test_regex_to_wildcard() {
    let pattern = PatternList::parse_regex("^ab.*c$").unwrap();
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "ab%c"
    );
    let unanchored = PatternList::parse_regex("ab").unwrap();
    assert_eq!(
        unanchored.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "%ab%"
    );
}

#[test]
fn test_regex_quantifiers() {
    let pattern = PatternList::parse_regex("a{2,3}b+?c?\\d*").unwrap();
    assert_eq!(pattern.render_regex(), "a{2,3}b+?c?\\d*");
}

#[test]
fn test_regex_alternation_not_wildcard() {
    let pattern = PatternList::parse_regex("a|b").unwrap();
    assert_eq!(pattern.alternatives.len(), 2);
    assert!(pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).is_err());
    assert_eq!(pattern.render_regex(), "a|b");
}

#[test]
fn test_regex_group_with_repeat() {
    let pattern = PatternList::parse_regex("(ab)+x").unwrap();
    assert_eq!(pattern.render_regex(), "(ab)+x");
}

#[test]
fn test_regex_errors() {
    assert!(PatternList::parse_regex("(ab").is_err());
    assert!(PatternList::parse_regex("ab)").is_err());
    assert!(PatternList::parse_regex("*a").is_err());
    assert!(PatternList::parse_regex("[ab").is_err());
}

// ============================================================================
// Simplification and shape
// ============================================================================

#[test]
fn test_simplify_merges_identical_matches() {
    let pattern = PatternList::single(Pattern {
        matches: vec![
            PatternMatch::any_char(),
            PatternMatch::any_char(),
            PatternMatch::any_char(),
        ],
    })
    .simplify();
    assert_eq!(
        pattern.alternatives[0].matches,
        vec![PatternMatch::new(
            MatchKind::CharSet(CharSet::class(ClassKind::Any)),
            Repetition::exactly(3)
        )]
    );
}

#[test]
fn test_simplify_keeps_counts_that_would_overflow() {
    let pattern = PatternList::parse_regex("a{4294967295}a{4294967295}").unwrap();
    assert_eq!(pattern.render_regex(), "a{4294967295}a{4294967295}");

    let merged = PatternList::parse_regex("a{2}a{3}").unwrap();
    assert_eq!(merged.render_regex(), "a{5}");
}

#[test]
fn test_simplify_is_idempotent() {
    let pattern = PatternList::parse_regex("^(?:a)(b)[c]d*d*$").unwrap();
    assert_eq!(pattern.clone().simplify(), pattern);
    assert_eq!(pattern.render_regex(), "^abcd*$");
}

#[test]
fn test_decompose() {
    assert_eq!(sql("abc").decompose(), Some((LikeShape::Equals, "abc".to_string())));
    assert_eq!(sql("abc%").decompose(), Some((LikeShape::StartsWith, "abc".to_string())));
    assert_eq!(sql("%abc").decompose(), Some((LikeShape::EndsWith, "abc".to_string())));
    assert_eq!(sql("%abc%").decompose(), Some((LikeShape::Contains, "abc".to_string())));
    assert_eq!(sql("a_c").decompose(), None);
}

#[test]
fn test_from_shape_matches_decompose() {
    let pattern = PatternList::from_shape(LikeShape::Contains, "x");
    assert_eq!(
        pattern.render_wildcard(&WildcardSyntax::SQL_SERVER).unwrap(),
        "%x%"
    );
    assert_eq!(pattern.decompose(), Some((LikeShape::Contains, "x".to_string())));
}

#[test]
fn test_literal_only_without_wildcards() {
    assert!(!sql("abc").has_wildcards());
    assert!(sql("a%").has_wildcards());
    assert_eq!(PatternList::from_literal("").literal(), Some(String::new()));
}
