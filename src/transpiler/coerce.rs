//! Conversion of untyped object literals once the target data type is known.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::ast::{Expr, ObjectLiteral, Query};
use crate::config::QueryContext;
use crate::metadata::DataType;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(0|[1-9]\d*)$").expect("valid regex"));
static FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+\.\d+$").expect("valid regex"));
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?$").expect("valid regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse the date and date-time forms accepted in criteria values.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Whether the text is a date without a time part.
pub fn is_date_only(text: &str) -> bool {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(text, f).is_ok())
}

/// Typed literal for `value` given the data type of its property.
pub fn coerce_value(value: &str, data_type: &DataType) -> Expr {
    let converted = match data_type {
        DataType::Boolean => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(Expr::Bool(true)),
            "0" | "false" => Some(Expr::Bool(false)),
            _ => None,
        },
        DataType::Integer => value.trim().parse().ok().map(Expr::Integer),
        DataType::Decimal | DataType::Float => {
            let trimmed = value.trim();
            trimmed
                .parse()
                .map(Expr::Integer)
                .ok()
                .or_else(|| trimmed.parse().ok().map(Expr::Float))
        }
        DataType::Date => parse_datetime(value).map(Expr::DateTime),
        _ => Some(Expr::String(value.to_string())),
    };
    converted.unwrap_or_else(|| {
        tracing::warn!("Value '{}' does not match data type {}, kept as text", value, data_type);
        Expr::String(value.to_string())
    })
}

/// Typed literal for `value` inferred from its shape alone.
pub fn infer_value(value: &str) -> Expr {
    if INTEGER.is_match(value) {
        if let Ok(n) = value.parse() {
            return Expr::Integer(n);
        }
    }
    if FLOAT.is_match(value) {
        if let Ok(n) = value.parse() {
            return Expr::Float(n);
        }
    }
    if ISO_DATE.is_match(value) {
        if let Some(dt) = parse_datetime(value) {
            return Expr::DateTime(dt);
        }
    }
    Expr::String(value.to_string())
}

/// Coerce an object literal with metadata, falling back to shape
/// inference when the property has no known data type.
pub fn coerce_object(ctx: &QueryContext<'_>, query: &Query, object: &ObjectLiteral) -> Expr {
    let data_type = object
        .property
        .as_ref()
        .and_then(|p| ctx.data_type(query, p));
    let is_key = object
        .property
        .as_ref()
        .is_some_and(|p| p.name == "id" || p.name.ends_with("_id"));
    match data_type {
        Some(data_type) => coerce_value(&object.value, &data_type),
        None if is_key => Expr::String(object.value.clone()),
        None => {
            let inferred = infer_value(&object.value);
            tracing::debug!("No data type for '{}', inferred {:?}", object.value, inferred);
            inferred
        }
    }
}
