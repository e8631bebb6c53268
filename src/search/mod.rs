//! Simple search: the text typed into a search grid cell.
//!
//! ```
//! use aml_query::ast::PropertyRef;
//! use aml_query::config::SearchSettings;
//! use aml_query::metadata::DataType;
//! use aml_query::search::{SimpleSearchParser, to_simple_search};
//!
//! let settings = SearchSettings::default();
//! let cost = PropertyRef::new(aml_query::ast::Query::new("Part").root(), "cost");
//! let expr = SimpleSearchParser::new(&settings, DataType::Integer)
//!     .parse(&cost, "5...10")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(expr.to_string(), "t0.cost between 5 and 10");
//! assert_eq!(to_simple_search(&expr, &settings).unwrap(), "5...10");
//! ```

pub mod criteria;
pub mod parser;
pub mod render;

#[cfg(test)]
mod tests;

pub use criteria::SimpleSearchCriteria;
pub use parser::{SearchCondition, SimpleSearchParser, parse_simple_search};
pub use render::to_simple_search;
