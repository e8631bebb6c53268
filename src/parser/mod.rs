//! Parsers from each query dialect to the query model.
//!
//! - [`aml`]: AML `<Item action="get">` documents
//! - [`query_definition`]: stored `qry_QueryDefinition` documents
//! - [`sql`]: SQL WHERE fragments, IN-list bodies, and BETWEEN ranges
//!
//! Simple-search strings are handled by [`crate::search`].

pub mod aml;
pub mod lexer;
pub mod query_definition;
pub mod sql;

#[cfg(test)]
mod tests;

pub use aml::{AmlParser, parse_aml};
pub use lexer::{Keyword, Token, TokenKind, tokenize};
pub use query_definition::{ConditionParser, parse_query_definition};
pub use sql::{parse_between_range, parse_in_list, parse_value, parse_where};
