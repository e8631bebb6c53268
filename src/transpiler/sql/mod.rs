//! SQL rendering.
//!
//! Foreign-key joins become `inner join` / `left join`; relationship joins
//! become correlated `exists (...)` criteria ANDed into the WHERE clause.
//!
//! # Example
//! ```
//! use aml_query::config::QueryContext;
//! use aml_query::parser::parse_aml;
//! use aml_query::transpiler::ToSql;
//!
//! let query = parse_aml("<Item type='Part' action='get'><id>ABC</id></Item>").unwrap();
//! let sql = query.to_sql(&QueryContext::default()).unwrap();
//! assert_eq!(sql, "select p.* from Part p where p.id = 'ABC'");
//! ```

pub mod ansi;
pub mod sqlserver;

use std::collections::HashMap;
use std::convert::Infallible;

pub use ansi::AnsiGenerator;
pub use sqlserver::SqlServerGenerator;

use super::coerce::{coerce_object, infer_value};
use super::traits::{RESERVED_WORDS, SqlGenerator};
use super::{Dialect, SqlRenderOptions};
use crate::ast::{
    ArithmeticOp, ComparisonOp, Expr, Function, IsOperand, JoinType, LogicalOp, ParamName,
    Parameter, Precedence, PropertyRef, Query, SortDirection, TableId, needs_parens,
};
use crate::config::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::pattern::{LikeShape, PatternList};

/// Renders a [`Query`] as a SQL statement in one dialect.
pub struct SqlRenderer<'a> {
    ctx: &'a QueryContext<'a>,
    query: &'a Query,
    generator: Box<dyn SqlGenerator>,
    options: SqlRenderOptions,
    aliases: HashMap<TableId, String>,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(ctx: &'a QueryContext<'a>, query: &'a Query) -> Self {
        let aliases = assign_aliases(ctx, query);
        Self {
            ctx,
            query,
            generator: ctx.settings.dialect.generator(),
            options: SqlRenderOptions::ALL,
            aliases,
        }
    }

    pub fn with_options(mut self, options: SqlRenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.generator = dialect.generator();
        self
    }

    /// Alias of a table in the rendered statement.
    pub fn alias(&self, table: TableId) -> &str {
        self.aliases.get(&table).map(String::as_str).unwrap_or("t")
    }

    /// Render the selected clauses of the statement.
    pub fn render(&self) -> QueryResult<String> {
        let root = self.query.root();
        let tree = self.foreign_key_tree(root);
        tracing::debug!("Rendering SQL for {} joined table(s)", tree.len());
        let mut parts = Vec::new();

        if self.options.contains(SqlRenderOptions::SELECT) {
            parts.push(format!("select {}", self.select_list(&tree)?));
        }
        if self.options.contains(SqlRenderOptions::FROM) {
            parts.push(format!("from {}", self.from_clause(root)?));
        }
        if self.options.contains(SqlRenderOptions::WHERE) {
            if let Some(conditions) = self.render_where()? {
                parts.push(format!("where {}", conditions));
            }
        }

        let item = &self.query[root];
        let paging = self.options.contains(SqlRenderOptions::OFFSET)
            && (item.offset.is_some() || item.fetch.is_some());
        if self.options.contains(SqlRenderOptions::ORDER_BY) || paging {
            let mut order = self.order_list(&tree)?;
            if order.is_empty() && paging {
                order.push(format!("{}.id", self.alias(root)));
            }
            if !order.is_empty() {
                parts.push(format!("order by {}", order.join(", ")));
            }
        }
        if paging {
            let clause = self.generator.offset_fetch(item.offset, item.fetch);
            parts.push(clause.trim_start().to_string());
        }
        Ok(parts.join(" "))
    }

    /// Condition of the WHERE clause alone, `None` when unfiltered.
    pub fn render_where(&self) -> QueryResult<Option<String>> {
        let conditions = self.conditions(self.query.root())?;
        Ok((!conditions.is_empty()).then(|| join_and(conditions)))
    }

    /// Render a standalone condition.
    pub fn render_expr(&self, expr: &Expr) -> QueryResult<String> {
        self.condition(&collapse_in(expr.clone()))
    }

    /// `table` and the tables reached from it through foreign keys.
    fn foreign_key_tree(&self, table: TableId) -> Vec<TableId> {
        let mut out = vec![table];
        let mut i = 0;
        while i < out.len() {
            if let Some(item) = self.query.get(out[i]) {
                out.extend(
                    item.joins
                        .iter()
                        .filter(|j| j.is_foreign_key())
                        .map(|j| j.right),
                );
            }
            i += 1;
        }
        out
    }

    /// Table of the item type, or of the providing property when metadata
    /// does not know the type.
    fn table_name(&self, table: TableId) -> QueryResult<String> {
        let name = match self.ctx.table_type_name(self.query, table) {
            Some(name) => name,
            None => {
                let provider = self.query[table].type_provider.as_ref().ok_or_else(|| {
                    QueryError::unsupported(format!("item type of table {} is unknown", table))
                })?;
                tracing::debug!(
                    "Item type of table {} unknown, naming it after property '{}'",
                    table,
                    provider.name
                );
                provider.name.clone()
            }
        };
        Ok(self.generator.identifier(&name.replace(' ', "_")))
    }

    fn select_list(&self, tree: &[TableId]) -> QueryResult<String> {
        let mut columns = Vec::new();
        for &table in tree {
            for select in &self.query[table].select {
                let mut column = self.value(&select.expr)?;
                if let Some(alias) = &select.alias {
                    column = format!("{} as {}", column, self.generator.identifier(alias));
                }
                columns.push(column);
            }
        }
        if columns.is_empty() {
            columns.push(format!("{}.*", self.alias(self.query.root())));
        }
        Ok(columns.join(", "))
    }

    fn from_clause(&self, table: TableId) -> QueryResult<String> {
        let mut sql = format!("{} {}", self.table_name(table)?, self.alias(table));
        for t in self.foreign_key_tree(table) {
            for join in self.query[t].joins.iter().filter(|j| j.is_foreign_key()) {
                let keyword = match join.kind {
                    JoinType::Inner => "inner join",
                    JoinType::LeftOuter => "left join",
                };
                sql.push_str(&format!(
                    " {} {} {} on {}.{} = {}.{}",
                    keyword,
                    self.table_name(join.right)?,
                    self.alias(join.right),
                    self.alias(join.left),
                    self.generator.identifier(&join.left_property),
                    self.alias(join.right),
                    self.generator.identifier(&join.right_property),
                ));
            }
        }
        Ok(sql)
    }

    /// WHERE terms of `table` and its foreign-key tree, with the precedence
    /// of each.
    fn conditions(&self, table: TableId) -> QueryResult<Vec<(String, Precedence)>> {
        let mut out = Vec::new();
        for t in self.foreign_key_tree(table) {
            let item = &self.query[t];
            let alias = self.alias(t);
            if let Some(id) = &item.id {
                out.push((
                    format!("{}.id = {}", alias, self.generator.string_literal(id)),
                    Precedence::Comparison,
                ));
            }
            if !item.id_list.is_empty() {
                let ids: Vec<String> = item
                    .id_list
                    .iter()
                    .map(|id| self.generator.string_literal(id))
                    .collect();
                out.push((
                    format!("{}.id in ({})", alias, ids.join(", ")),
                    Precedence::Comparison,
                ));
            }
            if let Some(type_id) = &item.type_id {
                out.push((
                    format!("{}.itemtype = {}", alias, self.generator.string_literal(type_id)),
                    Precedence::Comparison,
                ));
            }
            if let Some(filter) = &item.filter {
                let filter = collapse_in(filter.clone());
                out.push((self.condition(&filter)?, filter.precedence()));
            }
            for join in item.joins.iter().filter(|j| !j.is_foreign_key()) {
                out.push((
                    self.exists(join.left, join.right, &join.left_property, &join.right_property)?,
                    Precedence::Comparison,
                ));
            }
        }
        Ok(out)
    }

    fn exists(
        &self,
        parent: TableId,
        child: TableId,
        parent_property: &str,
        child_property: &str,
    ) -> QueryResult<String> {
        let mut terms = vec![(
            format!(
                "{}.{} = {}.{}",
                self.alias(child),
                self.generator.identifier(child_property),
                self.alias(parent),
                self.generator.identifier(parent_property)
            ),
            Precedence::Comparison,
        )];
        terms.extend(self.conditions(child)?);
        Ok(format!(
            "exists (select null from {} where {})",
            self.from_clause(child)?,
            join_and(terms)
        ))
    }

    fn order_list(&self, tree: &[TableId]) -> QueryResult<Vec<String>> {
        let mut out = Vec::new();
        for &table in tree {
            for order in &self.query[table].order_by {
                let mut text = self.value(&order.expr)?;
                if order.direction == SortDirection::Descending {
                    text.push_str(" desc");
                }
                out.push(text);
            }
        }
        Ok(out)
    }

    fn condition_operand(&self, parent: Precedence, child: &Expr, right_side: bool) -> QueryResult<String> {
        let text = self.condition(child)?;
        Ok(if needs_parens(parent, child, right_side, true) {
            format!("({})", text)
        } else {
            text
        })
    }

    /// Render in a position where a boolean is expected.
    fn condition(&self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Bool(true) => Ok("1 = 1".to_string()),
            Expr::Bool(false) => Ok("1 = 0".to_string()),
            Expr::Property(_) => Ok(format!(
                "{} = {}",
                self.value(expr)?,
                self.generator.bool_literal(true)
            )),
            Expr::Not(inner) => Ok(format!(
                "not {}",
                self.condition_operand(Precedence::Not, inner, true)?
            )),
            Expr::Logical { op, left, right } => Ok(format!(
                "{} {} {}",
                self.condition_operand(op.precedence(), left, false)?,
                op.keyword(),
                self.condition_operand(op.precedence(), right, true)?
            )),
            other => self.value(other),
        }
    }

    fn operand(
        &self,
        parent: Precedence,
        child: &Expr,
        right_side: bool,
        associative: bool,
    ) -> QueryResult<String> {
        let text = self.value(child)?;
        Ok(if needs_parens(parent, child, right_side, associative) {
            format!("({})", text)
        } else {
            text
        })
    }

    fn value(&self, expr: &Expr) -> QueryResult<String> {
        let prec = expr.precedence();
        match expr {
            Expr::Bool(b) => Ok(self.generator.bool_literal(*b)),
            Expr::Integer(n) => Ok(n.to_string()),
            Expr::Float(n) => Ok(format!("{:?}", n)),
            Expr::String(s) => Ok(self.generator.string_literal(s)),
            Expr::DateTime(dt) => Ok(self.generator.datetime_literal(dt)),
            Expr::Object(object) => self.value(&coerce_object(self.ctx, self.query, object)),
            Expr::Parameter(p) => self.parameter(p),
            Expr::Property(p) => Ok(format!(
                "{}.{}",
                self.alias(p.table),
                self.generator.identifier(&p.name)
            )),
            Expr::AllProperties { table, .. } => Ok(format!("{}.*", self.alias(*table))),
            Expr::List(items) => Ok(format!("({})", self.list(items)?)),
            Expr::Pattern(pattern) => self.pattern(pattern),
            Expr::Comparison { op, left, right } => Ok(format!(
                "{} {} {}",
                self.operand(prec, left, false, false)?,
                op.sql_symbol(),
                self.operand(prec, right, true, false)?
            )),
            Expr::Like {
                left,
                pattern,
                negated,
            } => Ok(format!(
                "{} {} {}",
                self.operand(prec, left, false, false)?,
                if *negated { "not like" } else { "like" },
                self.operand(prec, pattern, true, false)?
            )),
            Expr::Between {
                left,
                min,
                max,
                negated,
                ..
            } => Ok(format!(
                "{} {} {} and {}",
                self.operand(prec, left, false, false)?,
                if *negated { "not between" } else { "between" },
                self.operand(Precedence::SubComparison, min, false, false)?,
                self.operand(Precedence::SubComparison, max, true, false)?
            )),
            Expr::In {
                left,
                list,
                negated,
                ..
            } => {
                if list.is_empty() {
                    return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                Ok(format!(
                    "{} {} ({})",
                    self.operand(prec, left, false, false)?,
                    if *negated { "not in" } else { "in" },
                    self.list(list)?
                ))
            }
            Expr::Is { left, operand } => {
                let test = match operand {
                    IsOperand::Null | IsOperand::NotDefined => "is null",
                    IsOperand::NotNull | IsOperand::Defined => "is not null",
                };
                Ok(format!("{} {}", self.operand(prec, left, false, false)?, test))
            }
            Expr::Arithmetic { op, left, right } => {
                let symbol = match op {
                    ArithmeticOp::Concat => self.generator.concat_operator(),
                    other => other.symbol(),
                };
                Ok(format!(
                    "{} {} {}",
                    self.operand(prec, left, false, op.is_associative())?,
                    symbol,
                    self.operand(prec, right, true, op.is_associative())?
                ))
            }
            Expr::Negate(inner) => Ok(format!("-{}", self.operand(prec, inner, true, false)?)),
            Expr::Not(_) | Expr::Logical { .. } => self.condition(expr),
            Expr::Function { func, args } => self.function(func, args),
        }
    }

    fn list(&self, items: &[Expr]) -> QueryResult<String> {
        let items = items
            .iter()
            .map(|item| self.value(item))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(items.join(", "))
    }

    fn pattern(&self, pattern: &PatternList) -> QueryResult<String> {
        let syntax = self.generator.like_syntax();
        let text = pattern.render_wildcard(&syntax)?;
        let literal = self.generator.string_literal(&text);
        match syntax.escape {
            Some(escape) if text.contains(escape) => Ok(format!("{} escape '{}'", literal, escape)),
            _ => Ok(literal),
        }
    }

    fn parameter(&self, p: &Parameter) -> QueryResult<String> {
        let name = match &p.name {
            ParamName::Named(name) => name.clone(),
            ParamName::Positional(index) => format!("p{}", index),
        };
        if let Some(bound) = self.ctx.settings.parameters.get(&name) {
            if p.raw {
                return Ok(bound.clone());
            }
            return self.value(&infer_value(bound));
        }
        if let Some(default) = &p.default {
            return self.value(default);
        }
        if let Some(def) = self.query.parameters.iter().find(|d| d.name == name) {
            if let Some(default) = &def.default {
                return self.value(&infer_value(default));
            }
        }
        tracing::trace!("Parameter '{}' left unbound", name);
        Ok(self.generator.placeholder(&name))
    }

    fn function(&self, func: &Function, args: &[Expr]) -> QueryResult<String> {
        match func {
            Function::StartsWith | Function::EndsWith | Function::Contains => {
                return self.like_function(func, args);
            }
            Function::Substring if args.len() == 3 => {
                let shifted = [args[0].clone(), shift_start(&args[1]), args[2].clone()];
                let rendered = shifted
                    .iter()
                    .map(|a| self.value(a))
                    .collect::<QueryResult<Vec<_>>>()?;
                return self.generator.function(func, &rendered);
            }
            _ => {}
        }
        let rendered = args
            .iter()
            .map(|a| self.value(a))
            .collect::<QueryResult<Vec<_>>>()?;
        self.generator.function(func, &rendered)
    }

    /// `startsWith`/`endsWith`/`contains` as LIKE.
    fn like_function(&self, func: &Function, args: &[Expr]) -> QueryResult<String> {
        let [subject, find] = args else {
            return Err(QueryError::unsupported(format!(
                "{} expects 2 arguments, got {}",
                func,
                args.len()
            )));
        };
        let shape = match func {
            Function::StartsWith => LikeShape::StartsWith,
            Function::EndsWith => LikeShape::EndsWith,
            _ => LikeShape::Contains,
        };
        let subject = self.operand(Precedence::Comparison, subject, false, false)?;
        let literal = match find {
            Expr::String(s) => Some(s.as_str()),
            Expr::Object(o) => Some(o.value.as_str()),
            _ => None,
        };
        let pattern = match literal {
            Some(text) => self.pattern(&PatternList::from_shape(shape, text))?,
            None => {
                let find = self.operand(Precedence::Additive, find, true, true)?;
                let concat = self.generator.concat_operator();
                match shape {
                    LikeShape::StartsWith => format!("{} {} '%'", find, concat),
                    LikeShape::EndsWith => format!("'%' {} {}", concat, find),
                    _ => format!("'%' {} {} {} '%'", concat, find, concat),
                }
            }
        };
        Ok(format!("{} like {}", subject, pattern))
    }
}

/// Zero-based start turned one-based.
fn shift_start(start: &Expr) -> Expr {
    match start {
        Expr::Integer(n) => Expr::Integer(n.saturating_add(1)),
        Expr::Arithmetic {
            op: ArithmeticOp::Sub,
            left,
            right,
        } if **right == Expr::Integer(1) => (**left).clone(),
        other => Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(other.clone()),
            right: Box::new(Expr::Integer(1)),
        },
    }
}

/// Join WHERE terms with `and`, parenthesizing a looser term only when it
/// has company.
fn join_and(terms: Vec<(String, Precedence)>) -> String {
    if terms.len() == 1 {
        return terms.into_iter().map(|(text, _)| text).collect();
    }
    terms
        .into_iter()
        .map(|(text, precedence)| {
            if precedence < Precedence::And {
                format!("({})", text)
            } else {
                text
            }
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Replace two or more OR-ed equalities of one property with a literal by
/// a single IN, at the position of the first of them. The whole OR chain is
/// grouped at once, whatever its nesting.
pub(crate) fn collapse_in(expr: Expr) -> Expr {
    if !matches!(expr, Expr::Logical { op: LogicalOp::Or, .. }) {
        let Ok(expr) = expr.try_map_children(&mut |e| Ok::<_, Infallible>(collapse_in(e)));
        return expr;
    }
    let terms: Vec<Expr> = expr
        .into_flattened(LogicalOp::Or)
        .into_iter()
        .map(collapse_in)
        .collect();
    let key = |term: &Expr| match term {
        Expr::Comparison {
            op: ComparisonOp::Eq,
            left,
            right,
        } if right.is_literal() => left.as_property().cloned(),
        _ => None,
    };
    let mut counts: HashMap<PropertyRef, usize> = HashMap::new();
    for term in &terms {
        if let Some(p) = key(term) {
            *counts.entry(p).or_default() += 1;
        }
    }
    let mut out: Vec<Expr> = Vec::new();
    let mut slots: HashMap<PropertyRef, usize> = HashMap::new();
    for term in terms {
        let Some(p) = key(&term).filter(|p| counts[p] > 1) else {
            out.push(term);
            continue;
        };
        let Expr::Comparison { left, right, .. } = term else {
            continue;
        };
        match slots.get(&p) {
            Some(&i) => {
                if let Expr::In { list, .. } = &mut out[i] {
                    list.push(*right);
                }
            }
            None => {
                slots.insert(p, out.len());
                out.push(Expr::In {
                    left,
                    list: vec![*right],
                    negated: false,
                    table: None,
                });
            }
        }
    }
    Expr::or_all(out).unwrap_or(Expr::Bool(false))
}

/// Lowercase initials of the words of a type name.
fn initials(name: &str) -> String {
    name.split([' ', '_'])
        .filter_map(|w| w.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

fn assign_aliases(ctx: &QueryContext<'_>, query: &Query) -> HashMap<TableId, String> {
    let mut aliases: HashMap<TableId, String> = HashMap::new();
    for table in query.walk() {
        let item = &query[table];
        let base = match &item.alias {
            Some(alias) => alias.clone(),
            None => {
                let from_type = ctx
                    .table_type_name(query, table)
                    .map(|t| initials(&t))
                    .unwrap_or_default();
                let from_provider = item
                    .type_provider
                    .as_ref()
                    .map(|p| initials(&p.name))
                    .unwrap_or_default();
                [from_type, from_provider]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .unwrap_or_else(|| "t".to_string())
            }
        };
        let taken = |candidate: &str, aliases: &HashMap<TableId, String>| {
            aliases.values().any(|a| a.eq_ignore_ascii_case(candidate))
                || (item.alias.is_none() && RESERVED_WORDS.contains(&candidate))
        };
        let mut alias = base.clone();
        let mut suffix = 2;
        while taken(&alias, &aliases) {
            alias = format!("{}{}", base, suffix);
            suffix += 1;
        }
        aliases.insert(table, alias);
    }
    aliases
}
