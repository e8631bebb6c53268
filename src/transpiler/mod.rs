//! Renderers from the query model to each dialect.
//!
//! SQL output goes through a [`traits::SqlGenerator`] per [`Dialect`];
//! AML and stored query output go through an [`crate::xml::XmlSink`].

pub mod aml;
pub mod clone;
pub mod coerce;
pub mod dialect;
pub mod odata;
pub mod query_definition;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::ast::Query;
use crate::config::QueryContext;
use crate::error::QueryResult;

pub use aml::AmlRenderer;
pub use clone::QueryCloner;
pub use dialect::Dialect;
pub use odata::{to_odata_filter, to_odata_query};
pub use query_definition::{QueryDefinitionRenderer, to_query_definition};
pub use sql::SqlRenderer;
pub use traits::{RESERVED_WORDS, SqlGenerator, needs_quoting};

/// Trait for rendering a query as SQL.
pub trait ToSql {
    fn to_sql(&self, ctx: &QueryContext<'_>) -> QueryResult<String>;
}

/// Trait for rendering a query as AML text.
pub trait ToAml {
    fn to_aml(&self, ctx: &QueryContext<'_>) -> QueryResult<String>;
}

impl ToSql for Query {
    fn to_sql(&self, ctx: &QueryContext<'_>) -> QueryResult<String> {
        SqlRenderer::new(ctx, self)
            .with_options(ctx.settings.render_options())
            .render()
    }
}

impl ToAml for Query {
    fn to_aml(&self, ctx: &QueryContext<'_>) -> QueryResult<String> {
        aml::to_aml(ctx, self)
    }
}

/// A SQL clause, as named in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlClause {
    Select,
    From,
    Where,
    OrderBy,
    Offset,
}

/// Set of SQL clauses to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlRenderOptions(u8);

impl SqlRenderOptions {
    pub const SELECT: Self = Self(1);
    pub const FROM: Self = Self(1 << 1);
    pub const WHERE: Self = Self(1 << 2);
    pub const ORDER_BY: Self = Self(1 << 3);
    pub const OFFSET: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn from_clauses(clauses: &[SqlClause]) -> Self {
        clauses.iter().fold(Self(0), |acc, clause| {
            acc | match clause {
                SqlClause::Select => Self::SELECT,
                SqlClause::From => Self::FROM,
                SqlClause::Where => Self::WHERE,
                SqlClause::OrderBy => Self::ORDER_BY,
                SqlClause::Offset => Self::OFFSET,
            }
        })
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SqlRenderOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for SqlRenderOptions {
    fn default() -> Self {
        Self::ALL
    }
}
