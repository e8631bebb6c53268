use pretty_assertions::assert_eq;

use super::*;
use crate::ast::builders::*;
use crate::ast::{Expr, PropertyRef, Query};
use crate::config::{QueryContext, SearchSettings};
use crate::error::QueryError;
use crate::metadata::{DataType, PropertyDescriptor, Schema};
use crate::pattern::{LikeShape, PatternList};

fn parse(data_type: DataType, text: &str) -> Option<Expr> {
    let settings = SearchSettings::default();
    let property = PropertyRef::new(Query::new("Part").root(), "field");
    SimpleSearchParser::new(&settings, data_type)
        .parse(&property, text)
        .unwrap()
}

fn parse_str(data_type: DataType, text: &str) -> String {
    parse(data_type, text).unwrap().to_string()
}

fn render(expr: &Expr) -> String {
    to_simple_search(expr, &SearchSettings::default()).unwrap()
}

#[test]
fn test_integer_range_and_operators() {
    let range = parse(DataType::Integer, "5...10").unwrap();
    assert_eq!(range.to_string(), "t0.field between 5 and 10");
    assert_eq!(render(&range), "5...10");

    let greater = parse(DataType::Integer, ">5").unwrap();
    assert_eq!(greater.to_string(), "t0.field > 5");
    assert_eq!(render(&greater), ">5");

    assert_eq!(parse_str(DataType::Integer, "<= 7"), "t0.field <= 7");
    assert_eq!(parse_str(DataType::Integer, "!=3"), "t0.field <> 3");
    assert_eq!(parse_str(DataType::Integer, "-2"), "t0.field = -2");
}

#[test]
fn test_alternatives_collapse_to_in() {
    let expr = parse(DataType::String, "New | Released").unwrap();
    assert_eq!(expr.to_string(), "t0.field in ('New', 'Released')");
    assert_eq!(render(&expr), "New|Released");

    assert_eq!(
        parse_str(DataType::Integer, "1|>5"),
        "t0.field = 1 or t0.field > 5"
    );
    assert!(parse(DataType::String, " | ").is_none());
    assert!(parse(DataType::String, "").is_none());
}

#[test]
fn test_wildcards_and_escapes() {
    let expr = parse(DataType::String, "A*").unwrap();
    let Expr::Like {
        pattern,
        negated: false,
        ..
    } = &expr
    else {
        panic!("expected like, got {}", expr);
    };
    let Expr::Pattern(pattern) = pattern.as_ref() else {
        panic!("expected pattern");
    };
    assert_eq!(
        pattern.decompose(),
        Some((LikeShape::StartsWith, "A".to_string()))
    );
    assert_eq!(render(&expr), "A*");

    let escaped = parse(DataType::String, r"50\*").unwrap();
    assert_eq!(escaped.to_string(), "t0.field = '50*'");
    assert_eq!(render(&escaped), r"50\*");

    let delimiter = parse(DataType::String, r"a\|b").unwrap();
    assert_eq!(delimiter.to_string(), "t0.field = 'a|b'");
    assert_eq!(render(&delimiter), r"a\|b");
}

#[test]
fn test_dates_cover_whole_days() {
    let day = parse(DataType::Date, "2024-01-05").unwrap();
    assert_eq!(
        day.to_string(),
        "t0.field between '2024-01-05T00:00:00' and '2024-01-05T23:59:59'"
    );
    assert_eq!(render(&day), "2024-01-05");

    let after = parse(DataType::Date, ">2024-01-05").unwrap();
    assert_eq!(after.to_string(), "t0.field > '2024-01-05T23:59:59'");
    assert_eq!(render(&after), ">2024-01-05");

    let before = parse(DataType::Date, "<2024-01-05").unwrap();
    assert_eq!(before.to_string(), "t0.field < '2024-01-05T00:00:00'");
    assert_eq!(render(&before), "<2024-01-05");

    assert_eq!(
        parse_str(DataType::Date, "2024-01-01...2024-01-31"),
        "t0.field between '2024-01-01T00:00:00' and '2024-01-31T23:59:59'"
    );
    assert_eq!(
        parse_str(DataType::Date, "2024-01-05T10:30:00"),
        "t0.field = '2024-01-05T10:30:00'"
    );
}

#[test]
fn test_booleans_and_numbers() {
    assert_eq!(parse_str(DataType::Boolean, "yes"), "t0.field = true");
    assert_eq!(parse_str(DataType::Boolean, "0"), "t0.field = false");
    assert_eq!(parse_str(DataType::Decimal, "12"), "t0.field = 12");

    let settings = SearchSettings::default();
    let property = PropertyRef::new(Query::new("Part").root(), "field");
    let err = SimpleSearchParser::new(&settings, DataType::Integer)
        .parse(&property, "abc")
        .unwrap_err();
    assert!(matches!(err, QueryError::Parse { .. }));
    let err = SimpleSearchParser::new(&settings, DataType::Boolean)
        .parse(&property, "maybe")
        .unwrap_err();
    assert!(matches!(err, QueryError::Parse { .. }));
}

#[test]
fn test_explicit_conditions() {
    let settings = SearchSettings::default();
    let property = PropertyRef::new(Query::new("Part").root(), "state");
    let parser = |condition| {
        SimpleSearchParser::new(&settings, DataType::String).with_condition(condition)
    };

    let expr = parser(SearchCondition::NotLike)
        .parse(&property, "A*")
        .unwrap()
        .unwrap();
    assert!(matches!(expr, Expr::Like { negated: true, .. }));

    let expr = parser(SearchCondition::NotEqual)
        .parse(&property, "A|B")
        .unwrap()
        .unwrap();
    assert_eq!(expr.to_string(), "t0.state not in ('A', 'B')");

    let expr = parser(SearchCondition::IsNull).parse(&property, "").unwrap().unwrap();
    assert_eq!(expr.to_string(), "t0.state is null");

    let expr = parser(SearchCondition::In).parse(&property, "X").unwrap().unwrap();
    assert_eq!(expr.to_string(), "t0.state in ('X')");

    let err = SimpleSearchParser::new(&settings, DataType::Integer)
        .with_condition(SearchCondition::Between)
        .parse(&property, "5")
        .unwrap_err();
    assert!(matches!(err, QueryError::Parse { .. }));
}

#[test]
fn test_operators_can_be_disabled() {
    let settings = SearchSettings {
        allow_operators: false,
        ..SearchSettings::default()
    };
    let property = PropertyRef::new(Query::new("Part").root(), "cost");
    let err = SimpleSearchParser::new(&settings, DataType::Integer)
        .parse(&property, ">5")
        .unwrap_err();
    assert!(matches!(err, QueryError::Parse { .. }));

    let expr = gt(Expr::Property(property), int(5));
    let err = to_simple_search(&expr, &settings).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_condition_names() {
    assert_eq!(
        "not like".parse::<SearchCondition>().unwrap(),
        SearchCondition::NotLike
    );
    assert_eq!(
        "ge".parse::<SearchCondition>().unwrap(),
        SearchCondition::GreaterThanOrEqual
    );
    assert_eq!(SearchCondition::IsNotNull.to_string(), "is_not_null");
    assert!("sounds_like".parse::<SearchCondition>().is_err());
}

#[test]
fn test_unrenderable_criteria() {
    let p = Query::new("Part").root();
    for expr in [
        is_null(prop(p, "name")),
        eq(prop(p, "cost"), prop(p, "price")),
        and(eq(prop(p, "a"), int(1)), eq(prop(p, "b"), int(2))),
    ] {
        let err = to_simple_search(&expr, &SearchSettings::default()).unwrap_err();
        assert!(matches!(err, QueryError::Unsupported(_)), "{}", expr);
    }
}

#[test]
fn test_criteria_from_where() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Expr::and_all([
        eq(prop(p, "state"), text("Released")),
        between(prop(p, "cost"), int(1), int(5)),
        Expr::Like {
            left: Box::new(prop(p, "name")),
            pattern: Box::new(Expr::Pattern(PatternList::from_shape(
                LikeShape::StartsWith,
                "A",
            ))),
            negated: true,
        },
        is_null(prop(p, "owned_by_id")),
        eq(prop(p, "cost"), prop(p, "price")),
    ]);

    let criteria = SimpleSearchCriteria::from_query(&QueryContext::default(), &query);
    assert_eq!(criteria.get("state"), Some("Released"));
    assert_eq!(criteria.get("cost"), Some("1...5"));
    assert_eq!(criteria.get("name"), Some("A*"));
    assert_eq!(criteria.get("owned_by_id"), Some(""));
    assert_eq!(criteria.get("price"), None);
    assert_eq!(
        criteria.conditions.get("name"),
        Some(&SearchCondition::NotLike)
    );
    assert_eq!(
        criteria.conditions.get("owned_by_id"),
        Some(&SearchCondition::IsNull)
    );
}

#[test]
fn test_criteria_apply_replaces_terms() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(and(
        eq(prop(p, "state"), text("New")),
        gt(prop(p, "cost"), int(3)),
    ));
    let mut criteria = SimpleSearchCriteria::new();
    criteria.set("state", "Released|Obsolete");
    criteria
        .apply(&QueryContext::default(), &mut query, p)
        .unwrap();
    assert_eq!(
        query[p].filter.as_ref().unwrap().to_string(),
        "t0.cost > 3 and t0.state in ('Released', 'Obsolete')"
    );

    let mut clear = SimpleSearchCriteria::new();
    clear.set("cost", "");
    clear.apply(&QueryContext::default(), &mut query, p).unwrap();
    assert_eq!(
        query[p].filter.as_ref().unwrap().to_string(),
        "t0.state in ('Released', 'Obsolete')"
    );
}

#[test]
fn test_data_type_from_metadata() {
    let schema = Schema::new().with_item_type(
        "Part",
        vec![PropertyDescriptor::new("cost", DataType::Integer)],
    );
    let ctx = QueryContext::new(&schema);
    let query = Query::new("Part");
    let cost = PropertyRef::new(query.root(), "cost");
    let expr = parse_simple_search(&ctx, &query, &cost, None, ">=5")
        .unwrap()
        .unwrap();
    assert_eq!(expr.to_string(), "t0.cost >= 5");

    let name = PropertyRef::new(query.root(), "name");
    let expr = parse_simple_search(&ctx, &query, &name, None, ">=5")
        .unwrap()
        .unwrap();
    assert_eq!(expr.to_string(), "t0.name = '>=5'");
}
