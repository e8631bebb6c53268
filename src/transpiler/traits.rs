//! Transpiler traits and utilities.

use chrono::NaiveDateTime;

use crate::ast::Function;
use crate::error::{QueryError, QueryResult};
use crate::pattern::WildcardSyntax;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "all",
    "and",
    "as",
    "asc",
    "between",
    "by",
    "case",
    "check",
    "column",
    "constraint",
    "create",
    "current",
    "default",
    "delete",
    "desc",
    "distinct",
    "drop",
    "else",
    "end",
    "escape",
    "exists",
    "fetch",
    "file",
    "for",
    "foreign",
    "from",
    "group",
    "having",
    "in",
    "index",
    "inner",
    "insert",
    "is",
    "join",
    "key",
    "left",
    "like",
    "not",
    "null",
    "of",
    "offset",
    "on",
    "or",
    "order",
    "outer",
    "primary",
    "references",
    "right",
    "rows",
    "select",
    "table",
    "then",
    "to",
    "union",
    "update",
    "user",
    "value",
    "values",
    "when",
    "where",
];

/// Whether an identifier part must be quoted: a reserved word, a leading
/// digit, or any character other than letters, digits and `_`.
pub fn needs_quoting(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || name.is_empty()
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().is_some_and(|c| c.is_numeric())
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator {
    /// Quote an identifier (table or column name) unconditionally.
    fn quote_identifier(&self, name: &str) -> String;

    /// Placeholder for an unbound named parameter (`@p`, `:p`).
    fn placeholder(&self, name: &str) -> String;

    /// Get the boolean literal (true/false vs 1/0).
    fn bool_literal(&self, val: bool) -> String;

    /// Binary string concatenation operator.
    fn concat_operator(&self) -> &str;

    fn datetime_literal(&self, value: &NaiveDateTime) -> String;

    /// Paging clause, with a leading space; empty when neither is set.
    fn offset_fetch(&self, offset: Option<u64>, fetch: Option<u64>) -> String;

    /// Render a function call from already rendered arguments.
    fn function(&self, func: &Function, args: &[String]) -> QueryResult<String>;

    /// Wildcard syntax of LIKE patterns.
    fn like_syntax(&self) -> WildcardSyntax {
        WildcardSyntax::SQL_SERVER
    }

    /// Quote an identifier only when it needs quoting.
    fn identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            self.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Quoted string literal with doubled single quotes.
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Exact argument count for a function, or an unsupported-construct error.
pub(crate) fn arity<'a>(func: &Function, args: &'a [String], n: usize) -> QueryResult<&'a [String]> {
    if args.len() == n {
        Ok(args)
    } else {
        Err(QueryError::unsupported(format!(
            "{} expects {} argument(s), got {}",
            func,
            n,
            args.len()
        )))
    }
}
