use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use crate::ast::{Expr, ObjectLiteral, PropertyRef, Query};
use crate::config::QueryContext;
use crate::metadata::{DataType, PropertyDescriptor, Schema};
use crate::transpiler::coerce::{coerce_object, coerce_value, infer_value, is_date_only, parse_datetime};

#[test]
fn test_date_formats() {
    let midnight = NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(parse_datetime("2024-02-29"), Some(midnight));
    assert_eq!(parse_datetime("02/29/2024"), Some(midnight));
    assert_eq!(
        parse_datetime("2024-02-29T13:45"),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(13, 45, 0)
    );
    assert_eq!(parse_datetime("yesterday"), None);
    assert!(is_date_only("2024-02-29"));
    assert!(!is_date_only("2024-02-29 10:00"));
}

#[test]
fn test_values_by_data_type() {
    assert_eq!(coerce_value("true", &DataType::Boolean), Expr::Bool(true));
    assert_eq!(coerce_value("0", &DataType::Boolean), Expr::Bool(false));
    assert_eq!(coerce_value(" 42 ", &DataType::Integer), Expr::Integer(42));
    assert_eq!(coerce_value("2.5", &DataType::Decimal), Expr::Float(2.5));
    assert_eq!(coerce_value("007", &DataType::String), Expr::String("007".to_string()));
    assert_eq!(coerce_value("many", &DataType::Integer), Expr::String("many".to_string()));
}

#[test]
fn test_inferred_values() {
    assert_eq!(infer_value("-12"), Expr::Integer(-12));
    assert_eq!(infer_value("1.50"), Expr::Float(1.5));
    assert_eq!(infer_value("007"), Expr::String("007".to_string()));
    assert!(matches!(infer_value("2024-01-01"), Expr::DateTime(_)));
    assert_eq!(infer_value("ABC"), Expr::String("ABC".to_string()));
}

#[test]
fn test_object_coercion() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let key = ObjectLiteral::for_property("1234", PropertyRef::new(p, "owned_by_id"));
    assert_eq!(coerce_object(&ctx, &query, &key), Expr::String("1234".to_string()));
    let count = ObjectLiteral::for_property("1234", PropertyRef::new(p, "quantity"));
    assert_eq!(coerce_object(&ctx, &query, &count), Expr::Integer(1234));

    let schema = Schema::new().with_item_type(
        "Part",
        vec![PropertyDescriptor::new("quantity", DataType::String)],
    );
    let ctx = QueryContext::new(&schema);
    assert_eq!(
        coerce_object(&ctx, &query, &count),
        Expr::String("1234".to_string())
    );
}
