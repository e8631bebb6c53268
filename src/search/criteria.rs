use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parser::{SearchCondition, parse_simple_search};
use super::render::to_simple_search;
use crate::ast::{Expr, IsOperand, LogicalOp, PropertyRef, Query, TableId};
use crate::config::{QueryContext, SearchSettings};
use crate::error::{QueryError, QueryResult};

/// Search-grid state: the text typed for each property and the condition
/// chosen next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleSearchCriteria {
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: BTreeMap<String, SearchCondition>,
}

impl SimpleSearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, property: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.values.insert(property.into(), text.into());
        self
    }

    pub fn with_condition(
        mut self,
        property: impl Into<String>,
        condition: SearchCondition,
        text: impl Into<String>,
    ) -> Self {
        let property = property.into();
        self.conditions.insert(property.clone(), condition);
        self.values.insert(property, text.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Criteria of the root table.
    pub fn from_query(ctx: &QueryContext<'_>, query: &Query) -> Self {
        Self::from_where(ctx, query, query.root())
    }

    /// Map the top-level AND terms of `table`'s filter that test a single
    /// property. Other terms are left out.
    pub fn from_where(ctx: &QueryContext<'_>, query: &Query, table: TableId) -> Self {
        let mut criteria = Self::new();
        let Some(filter) = query.get(table).and_then(|item| item.filter.as_ref()) else {
            return criteria;
        };
        let settings = &ctx.settings.search;
        for term in filter.flatten(LogicalOp::And) {
            let Some(name) = single_property(term, table) else {
                tracing::debug!("Criterion '{}' spans several properties", term);
                continue;
            };
            if criteria.values.contains_key(name) {
                tracing::debug!("Second criterion on '{}' left out: {}", name, term);
                continue;
            }
            match describe(term, settings) {
                Ok((condition, text)) => {
                    if let Some(condition) = condition {
                        criteria.conditions.insert(name.to_string(), condition);
                    }
                    criteria.values.insert(name.to_string(), text);
                }
                Err(err) => tracing::debug!("Criterion '{}' not mapped: {}", term, err),
            }
        }
        criteria
    }

    /// Replace the criteria of `table` on every property present here with
    /// the parsed search text. Blank text only clears.
    pub fn apply(&self, ctx: &QueryContext<'_>, query: &mut Query, table: TableId) -> QueryResult<()> {
        let mut parsed = Vec::new();
        for (name, text) in &self.values {
            let property = PropertyRef::new(table, name.clone());
            let condition = self.conditions.get(name).copied();
            if let Some(expr) = parse_simple_search(ctx, query, &property, condition, text)? {
                parsed.push(expr);
            }
        }

        let Some(item) = query.get_mut(table) else {
            return Err(QueryError::ambiguous(format!(
                "table {} is not part of the query",
                table
            )));
        };
        let kept = item
            .filter
            .take()
            .map(|f| f.into_flattened(LogicalOp::And))
            .unwrap_or_default()
            .into_iter()
            .filter(|term| {
                single_property(term, table).is_none_or(|name| !self.values.contains_key(name))
            });
        item.filter = Expr::and_all(kept.chain(parsed));
        Ok(())
    }
}

/// Name of the only property a term tests, when it belongs to `table`.
fn single_property(term: &Expr, table: TableId) -> Option<&str> {
    let mut names = Vec::new();
    term.visit_properties(&mut |p| names.push(p));
    let (first, rest) = names.split_first()?;
    (first.table == table && rest.iter().all(|p| *p == *first)).then_some(first.name.as_str())
}

fn describe(
    term: &Expr,
    settings: &SearchSettings,
) -> QueryResult<(Option<SearchCondition>, String)> {
    match term {
        Expr::Is { operand, .. } => {
            let condition = match operand {
                IsOperand::Null | IsOperand::NotDefined => SearchCondition::IsNull,
                IsOperand::NotNull | IsOperand::Defined => SearchCondition::IsNotNull,
            };
            Ok((Some(condition), String::new()))
        }
        Expr::In {
            left,
            list,
            negated: true,
            table,
        } => {
            let positive = Expr::In {
                left: left.clone(),
                list: list.clone(),
                negated: false,
                table: *table,
            };
            Ok((Some(SearchCondition::NotIn), to_simple_search(&positive, settings)?))
        }
        Expr::Like {
            left,
            pattern,
            negated: true,
        } => {
            let positive = Expr::Like {
                left: left.clone(),
                pattern: pattern.clone(),
                negated: false,
            };
            Ok((Some(SearchCondition::NotLike), to_simple_search(&positive, settings)?))
        }
        _ => Ok((None, to_simple_search(term, settings)?)),
    }
}
