use pretty_assertions::assert_eq;

use crate::ast::builders::*;
use crate::ast::{ArithmeticOp, Expr, Function, JoinType, Query};
use crate::error::QueryError;
use crate::pattern::{PatternList, WildcardSyntax};

fn normalized(expr: Expr) -> String {
    let once = expr.normalize().unwrap();
    let twice = once.clone().normalize().unwrap();
    assert_eq!(once, twice, "normalization is not idempotent");
    once.to_string()
}

#[test]
fn test_folds_integer_arithmetic() {
    let t = Query::new("Part").root();
    assert_eq!(normalized(arith(ArithmeticOp::Add, int(2), int(3))), "5");
    assert_eq!(
        normalized(gt(prop(t, "cost"), arith(ArithmeticOp::Mul, int(4), int(5)))),
        "t0.cost > 20"
    );
}

#[test]
fn test_overflow_stays_unfolded() {
    assert_eq!(
        normalized(arith(ArithmeticOp::Add, int(i64::MAX), int(1))),
        "9223372036854775807 + 1"
    );
}

#[test]
fn test_mixed_numeric_folds_to_float() {
    assert_eq!(normalized(arith(ArithmeticOp::Mul, int(2), float(1.5))), "3.0");
    assert_eq!(normalized(arith(ArithmeticOp::Div, float(1.0), int(0))), "1.0 / 0");
}

#[test]
fn test_string_concat_and_negation() {
    assert_eq!(
        normalized(arith(ArithmeticOp::Concat, text("ab"), text("cd"))),
        "'abcd'"
    );
    assert_eq!(normalized(Expr::Negate(Box::new(int(7)))), "-7");
}

#[test]
fn test_literal_comparison_folds() {
    assert_eq!(normalized(lt(int(1), int(2))), "true");
    assert_eq!(normalized(eq(text("a"), text("b"))), "false");
}

#[test]
fn test_property_moves_left() {
    let t = Query::new("Part").root();
    assert_eq!(normalized(lt(int(5), prop(t, "cost"))), "t0.cost > 5");
    assert_eq!(
        normalized(ge(text("x"), call(Function::ToLower, vec![prop(t, "name")]))),
        "toLower(t0.name) <= 'x'"
    );
}

#[test]
fn test_boolean_identities() {
    let t = Query::new("Part").root();
    let x = || eq(prop(t, "state"), text("New"));
    assert_eq!(normalized(and(boolean(true), x())), "t0.state = 'New'");
    assert_eq!(normalized(and(x(), boolean(false))), "false");
    assert_eq!(normalized(or(x(), boolean(true))), "true");
    assert_eq!(normalized(or(boolean(false), x())), "t0.state = 'New'");
    assert_eq!(normalized(eq(x(), boolean(true))), "t0.state = 'New'");
    assert_eq!(normalized(eq(x(), boolean(false))), "t0.state <> 'New'");
}

#[test]
fn test_not_inversion() {
    let t = Query::new("Part").root();
    assert_eq!(normalized(not(not(gt(prop(t, "a"), int(1))))), "t0.a > 1");
    assert_eq!(normalized(not(le(prop(t, "a"), int(1)))), "t0.a > 1");
    assert_eq!(normalized(not(is_null(prop(t, "a")))), "t0.a is not null");
    assert_eq!(
        normalized(not(between(prop(t, "a"), int(1), int(2)))),
        "t0.a not between 1 and 2"
    );
    assert_eq!(
        normalized(not(in_list(prop(t, "a"), [int(1), int(2)]))),
        "t0.a not in (1, 2)"
    );
    let pattern = PatternList::parse_wildcard("A%", &WildcardSyntax::SQL_SERVER).unwrap();
    assert_eq!(normalized(not(like(prop(t, "a"), pattern))), "t0.a not like /^A/");
}

#[test]
fn test_de_morgan() {
    let t = Query::new("Part").root();
    let expr = not(and(eq(prop(t, "a"), int(1)), or(eq(prop(t, "b"), int(2)), gt(prop(t, "c"), int(3)))));
    assert_eq!(normalized(expr), "t0.a <> 1 or t0.b <> 2 and t0.c <= 3");
}

#[test]
fn test_bare_property_is_flag() {
    let t = Query::new("Part").root();
    assert_eq!(normalized(prop(t, "is_current")), "t0.is_current = true");
    assert_eq!(
        normalized(and(prop(t, "is_current"), eq(prop(t, "a"), int(1)))),
        "t0.is_current = true and t0.a = 1"
    );
    assert_eq!(normalized(not(prop(t, "is_current"))), "t0.is_current <> true");
}

#[test]
fn test_like_without_wildcards_is_equality() {
    let t = Query::new("Part").root();
    let pattern = PatternList::parse_wildcard("ABC", &WildcardSyntax::SQL_SERVER).unwrap();
    assert_eq!(normalized(like(prop(t, "a"), pattern)), "t0.a = 'ABC'");
}

#[test]
fn test_between_and_in_record_table() {
    let mut query = Query::new("Part");
    let t = query.root();
    let user = query.join_property(t, "owned_by_id", JoinType::Inner);

    let expr = between(prop(t, "a"), int(1), int(2)).normalize().unwrap();
    assert!(matches!(expr, Expr::Between { table: Some(found), .. } if found == t));

    let expr = in_list(prop(user, "name"), [text("x")]).normalize().unwrap();
    assert!(matches!(expr, Expr::In { table: Some(found), .. } if found == user));

    let err = between(prop(t, "a"), prop(user, "lo"), int(2)).normalize().unwrap_err();
    assert!(matches!(err, QueryError::AmbiguousReference(_)));
}

#[test]
fn test_index_of_rewrites() {
    let t = Query::new("Part").root();
    let index = || call(Function::IndexOf, vec![prop(t, "name"), text("x")]);
    assert_eq!(normalized(eq(index(), int(0))), "startsWith(t0.name, 'x')");
    assert_eq!(normalized(eq(index(), int(-1))), "not contains(t0.name, 'x')");
    assert_eq!(normalized(ne(index(), int(-1))), "contains(t0.name, 'x')");
    assert_eq!(normalized(gt(index(), int(-1))), "contains(t0.name, 'x')");
    assert_eq!(normalized(ge(index(), int(0))), "contains(t0.name, 'x')");
    // charindex(...) > 0 arrives as indexOf(...) + 1 > 0
    assert_eq!(
        normalized(gt(arith(ArithmeticOp::Add, index(), int(1)), int(0))),
        "contains(t0.name, 'x')"
    );
}

#[test]
fn test_query_normalize_visits_every_table() {
    let mut query = Query::new("Part");
    let t = query.root();
    let user = query.join_property(t, "owned_by_id", JoinType::Inner);
    query[t].add_filter(not(not(prop(t, "is_current"))));
    query[user].add_filter(eq(int(1), prop(user, "rank")));
    query.normalize().unwrap();
    assert_eq!(
        query[t].filter.as_ref().map(|f| f.to_string()),
        Some("t0.is_current = true".to_string())
    );
    assert_eq!(
        query[user].filter.as_ref().map(|f| f.to_string()),
        Some("t1.rank = 1".to_string())
    );
}
