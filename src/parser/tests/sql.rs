use pretty_assertions::assert_eq;

use crate::ast::{Expr, Function, Query, QueryItem};
use crate::error::QueryError;
use crate::parser::sql::*;

fn parse(sql: &str) -> String {
    let query = Query::new("Part");
    parse_where(&query, query.root(), sql).unwrap().to_string()
}

fn parse_err(sql: &str) -> QueryError {
    let query = Query::new("Part");
    parse_where(&query, query.root(), sql).unwrap_err()
}

#[test]
fn test_precedence() {
    assert_eq!(parse("a = 1 or b = 2 and c = 3"), "t0.a = 1 or t0.b = 2 and t0.c = 3");
    assert_eq!(parse("(a = 1 or b = 2) and c = 3"), "(t0.a = 1 or t0.b = 2) and t0.c = 3");
    assert_eq!(parse("a + b * 2 > -c"), "t0.a + t0.b * 2 > -t0.c");
    assert_eq!(parse("not a = 1 and b = 2"), "not t0.a = 1 and t0.b = 2");
}

#[test]
fn test_non_associative_grouping_is_kept() {
    assert_eq!(parse("10 - (4 - 3) = a"), "10 - (4 - 3) = t0.a");
    assert_eq!(parse("10 - 4 - 3 = a"), "10 - 4 - 3 = t0.a");
}

#[test]
fn test_like_in_between_is() {
    assert_eq!(parse("name like 'AB%'"), "t0.name like /^AB/");
    assert_eq!(parse("name not like '%x'"), "t0.name not like /x$/");
    assert_eq!(parse("id in ('a', 'b')"), "t0.id in ('a', 'b')");
    assert_eq!(parse("id not in (1,2,3)"), "t0.id not in (1, 2, 3)");
    assert_eq!(
        parse("cost between 1 and 5 and x = 1"),
        "t0.cost between 1 and 5 and t0.x = 1"
    );
    assert_eq!(parse("cost not between 1 + 1 and 5"), "t0.cost not between 1 + 1 and 5");
    assert_eq!(parse("a is null or b IS NOT NULL"), "t0.a is null or t0.b is not null");
}

#[test]
fn test_literals_and_parameters() {
    assert_eq!(parse("a = true and b = @p and c = :q"), "t0.a = true and t0.b = @p and t0.c = @q");
    assert_eq!(parse("a = 1.25"), "t0.a = 1.25");
    assert_eq!(parse("a = N'x''y'"), "t0.a = 'x''y'");
}

#[test]
fn test_qualified_names() {
    let mut item = QueryItem::new("Part Document");
    item.alias = Some("pd".to_string());
    let query = Query::with_root(item);
    let root = query.root();
    for sql in [
        "[Part_Document].state = 'x'",
        "pd.state = 'x'",
        "innovator.state = 'x'",
        "[part document].[state] = 'x'",
    ] {
        assert_eq!(
            parse_where(&query, root, sql).unwrap().to_string(),
            "t0.state = 'x'",
            "{sql}"
        );
    }
    let err = parse_where(&query, root, "other.state = 'x'").unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
    let err = parse_where(&query, root, "a.b.c = 'x'").unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_functions() {
    assert_eq!(parse("lower(name) = 'x'"), "toLower(t0.name) = 'x'");
    assert_eq!(parse("created_on < getdate()"), "t0.created_on < currentDateTime()");
    assert_eq!(
        parse("substring(name, 2, 3) = 'x'"),
        "substring(t0.name, 2 - 1, 3) = 'x'"
    );
    assert_eq!(
        parse("charindex('x', name) > 0"),
        "indexOf(t0.name, 'x') + 1 > 0"
    );
    assert_eq!(
        parse("dateadd(day, 3, created_on) > getutcdate()"),
        "addDays(t0.created_on, 3) > currentUtcDateTime()"
    );
    assert_eq!(parse("datepart(month, d) = 2"), "month(t0.d) = 2");
    assert_eq!(parse("datediff(day, a, b) > 1"), "diffDays(t0.a, t0.b) > 1");
}

#[test]
fn test_function_without_arguments() {
    let query = Query::new("Part");
    let expr = parse_where(&query, query.root(), "getdate()").unwrap();
    assert_eq!(
        expr,
        Expr::Function {
            func: Function::CurrentDateTime,
            args: Vec::new(),
        }
    );
}

#[test]
fn test_errors() {
    assert!(matches!(parse_err("a = null"), QueryError::Unsupported(_)));
    assert!(matches!(parse_err("a = 1; drop table x"), QueryError::Unsupported(_)));
    assert!(matches!(parse_err("a = (1"), QueryError::Parse { .. }));
    assert!(matches!(parse_err("a = 1)"), QueryError::Parse { .. }));
    assert!(matches!(parse_err("a = "), QueryError::Parse { .. }));
    assert!(matches!(parse_err("a b"), QueryError::Parse { .. }));
    assert!(matches!(parse_err("a between 1"), QueryError::Parse { .. }));
    assert!(matches!(parse_err("a = 'x"), QueryError::Lex { .. }));
}

#[test]
fn test_in_list_and_range_entry_points() {
    let query = Query::new("Part");
    let root = query.root();
    let items = parse_in_list(&query, root, "'a', 'b', 3").unwrap();
    assert_eq!(
        items,
        vec![
            Expr::String("a".to_string()),
            Expr::String("b".to_string()),
            Expr::Integer(3),
        ]
    );
    let (min, max) = parse_between_range(&query, root, "(1 + 1) and 10").unwrap();
    assert_eq!(min.to_string(), "1 + 1");
    assert_eq!(max, Expr::Integer(10));
    assert!(parse_between_range(&query, root, "1 or 2").is_err());
}
