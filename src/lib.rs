//! # aml-query
//!
//! > **One query model, four dialects.**
//!
//! Translates item queries between AML XML, SQL WHERE fragments, OData and
//! stored `qry_QueryDefinition` documents. Every input is parsed into a
//! [`ast::Query`]: a graph of tables joined to a root, each with criteria
//! held as [`ast::Expr`] trees. Every output is rendered from it.
//!
//! ## Quick Example
//!
//! ```rust
//! use aml_query::prelude::*;
//!
//! let query = parse_aml(
//!     "<Item type='Part' action='get'><state>Released</state><cost condition='gt'>10</cost></Item>",
//! )?;
//! let ctx = QueryContext::default();
//! assert_eq!(
//!     query.to_sql(&ctx)?,
//!     "select p.* from Part p where p.state = 'Released' and p.cost > 10"
//! );
//! assert_eq!(
//!     to_odata_filter(&ctx, &query)?.as_deref(),
//!     Some("state eq 'Released' and cost gt 10")
//! );
//! # Ok::<(), aml_query::QueryError>(())
//! ```
//!
//! ## Dialects
//!
//! | Dialect        | Parse                          | Render                       |
//! |----------------|--------------------------------|------------------------------|
//! | AML            | [`parser::parse_aml`]          | [`transpiler::ToAml`]        |
//! | SQL            | [`parser::parse_where`]        | [`transpiler::ToSql`]        |
//! | OData          |                                | [`transpiler::to_odata_query`] |
//! | Stored query   | [`parser::parse_query_definition`] | [`transpiler::to_query_definition`] |
//! | Simple search  | [`search::parse_simple_search`] | [`search::to_simple_search`] |

pub mod ast;
pub mod config;
pub mod error;
pub mod metadata;
pub mod normalize;
pub mod parser;
pub mod pattern;
pub mod search;
pub mod transpiler;
pub mod xml;

pub use error::{QueryError, QueryResult};

pub mod prelude {
    pub use crate::ast::builders::*;
    pub use crate::ast::{Expr, PropertyRef, Query, QueryItem, TableId};
    pub use crate::config::{QueryContext, SearchSettings, Settings};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::metadata::{DataType, PropertyDescriptor, PropertyMetadataProvider, Schema};
    pub use crate::parser::{parse_aml, parse_query_definition, parse_where};
    pub use crate::pattern::{PatternList, WildcardSyntax};
    pub use crate::search::{SimpleSearchCriteria, parse_simple_search, to_simple_search};
    pub use crate::transpiler::{
        Dialect, QueryCloner, ToAml, ToSql, to_odata_filter, to_odata_query, to_query_definition,
    };
}

/// Parse an AML query and render it as SQL with default settings.
///
/// ```
/// let sql = aml_query::aml_to_sql("<Item type='Part' action='get' id='ABC'/>").unwrap();
/// assert_eq!(sql, "select p.* from Part p where p.id = 'ABC'");
/// ```
pub fn aml_to_sql(aml: &str) -> QueryResult<String> {
    use transpiler::ToSql;

    parser::parse_aml(aml)?.to_sql(&config::QueryContext::default())
}

/// Parse a SQL WHERE fragment over `type_name` and render it as AML.
///
/// ```
/// let aml = aml_query::where_to_aml("Part", "state = 'Released'").unwrap();
/// assert_eq!(aml, r#"<Item type="Part" action="get"><state>Released</state></Item>"#);
/// ```
pub fn where_to_aml(type_name: &str, sql: &str) -> QueryResult<String> {
    use transpiler::ToAml;

    let mut query = ast::Query::new(type_name);
    let root = query.root();
    let filter = parser::parse_where(&query, root, sql)?;
    query[root].filter = Some(filter);
    query.to_aml(&config::QueryContext::default())
}
