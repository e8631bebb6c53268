//! AML rendering, the inverse of [`crate::parser::parse_aml`].
//!
//! Criteria on tables joined through a foreign key are written inside the
//! property element as a nested `<Item>`; relationship tables are written
//! inside `<Relationships>`.

use std::collections::HashSet;

use super::coerce::infer_value;
use crate::ast::{Expr, Function, Join, LogicalOp, ParamName, Query, SortDirection, TableId};
use crate::config::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::pattern::{LikeShape, PatternList, WildcardSyntax};
use crate::xml::{XmlSink, XmlTextWriter};

/// Render a query as AML text.
pub fn to_aml(ctx: &QueryContext<'_>, query: &Query) -> QueryResult<String> {
    let mut writer = XmlTextWriter::new();
    AmlRenderer::new(ctx, query).render(&mut writer)?;
    writer.into_string()
}

/// Writes a [`Query`] as AML events into an [`XmlSink`].
pub struct AmlRenderer<'a> {
    ctx: &'a QueryContext<'a>,
    query: &'a Query,
    emitted: HashSet<TableId>,
}

enum Entry {
    Term(Expr),
    Nested(usize),
}

impl<'a> AmlRenderer<'a> {
    pub fn new(ctx: &'a QueryContext<'a>, query: &'a Query) -> Self {
        Self {
            ctx,
            query,
            emitted: HashSet::new(),
        }
    }

    pub fn render(mut self, sink: &mut dyn XmlSink) -> QueryResult<()> {
        tracing::debug!("Rendering AML for {} table(s)", self.query.table_count());
        self.item(sink, self.query.root(), Vec::new(), true)
    }

    fn item(
        &mut self,
        sink: &mut dyn XmlSink,
        table: TableId,
        mut terms: Vec<Expr>,
        full: bool,
    ) -> QueryResult<()> {
        let query = self.query;
        let item = &query[table];
        sink.start("Item")?;
        if let Some(type_name) = self.ctx.table_type_name(self.query, table) {
            sink.attribute("type", &type_name)?;
        }
        sink.attribute("action", "get")?;
        if let Some(id) = &item.id {
            sink.attribute("id", id)?;
        }
        if !item.id_list.is_empty() {
            sink.attribute("idlist", &item.id_list.join(","))?;
        }
        if let Some(type_id) = &item.type_id {
            sink.attribute("typeId", type_id)?;
        }
        if full {
            self.item_attributes(sink, table)?;
        }

        if self.emitted.insert(table) {
            if let Some(filter) = &item.filter {
                terms.push(filter.clone());
            }
        }
        self.criteria(sink, table, terms)?;

        for join in item.joins.iter().filter(|j| j.is_foreign_key()) {
            if !self.emitted.contains(&join.right) && self.has_criteria(join.right) {
                sink.start(&join.left_property)?;
                self.item(sink, join.right, Vec::new(), false)?;
                sink.end_element()?;
            }
        }

        let relationships: Vec<&Join> = item.joins.iter().filter(|j| !j.is_foreign_key()).collect();
        if !relationships.is_empty() {
            sink.start("Relationships")?;
            for join in relationships {
                self.item(sink, join.right, Vec::new(), true)?;
            }
            sink.end_element()?;
        }
        sink.end_element()
    }

    fn item_attributes(&self, sink: &mut dyn XmlSink, table: TableId) -> QueryResult<()> {
        let item = &self.query[table];
        if let Some(alias) = &item.alias {
            sink.attribute("alias", alias)?;
        }
        if let Some(select) = self.select(table) {
            sink.attribute("select", &select)?;
        }
        if !item.order_by.is_empty() {
            let order = item
                .order_by
                .iter()
                .map(|o| {
                    let name = self.own_property(table, &o.expr)?;
                    Ok(match o.direction {
                        SortDirection::Ascending => name.to_string(),
                        SortDirection::Descending => format!("{} DESC", name),
                    })
                })
                .collect::<QueryResult<Vec<_>>>()?;
            sink.attribute("orderBy", &order.join(","))?;
        }
        match (item.offset.filter(|&o| o > 0), item.fetch) {
            (None, Some(fetch)) => sink.attribute("maxRecords", &fetch.to_string())?,
            (Some(offset), Some(fetch)) if fetch > 0 && offset % fetch == 0 => {
                sink.attribute("page", &(offset / fetch + 1).to_string())?;
                sink.attribute("pagesize", &fetch.to_string())?;
            }
            (Some(offset), fetch) => {
                return Err(QueryError::unsupported(format!(
                    "offset {} is not a whole page of {}",
                    offset,
                    fetch.map(|f| f.to_string()).unwrap_or_else(|| "unlimited".to_string())
                )));
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Minimal `select` attribute; `None` when everything is selected.
    fn select(&self, table: TableId) -> Option<String> {
        let item = &self.query[table];
        if item
            .select
            .iter()
            .any(|s| matches!(s.expr, Expr::AllProperties { .. }))
        {
            return None;
        }
        let foreign_keys: Vec<&Join> = item.joins.iter().filter(|j| j.is_foreign_key()).collect();
        let mut parts = Vec::new();
        let mut nested = HashSet::new();
        for select in &item.select {
            let Some(p) = select.expr.as_property().filter(|p| p.table == table) else {
                tracing::trace!("Select '{}' has no AML form, skipped", select.expr);
                continue;
            };
            let sub = foreign_keys
                .iter()
                .find(|j| j.left_property == p.name)
                .and_then(|j| self.select(j.right));
            match sub {
                Some(sub) => {
                    nested.insert(p.name.as_str());
                    parts.push(format!("{}({})", p.name, sub));
                }
                None => parts.push(p.name.clone()),
            }
        }
        for join in foreign_keys {
            if nested.contains(join.left_property.as_str()) {
                continue;
            }
            if let Some(sub) = self.select(join.right) {
                parts.push(format!("{}({})", join.left_property, sub));
            }
        }
        (!parts.is_empty()).then(|| parts.join(","))
    }

    fn has_criteria(&self, table: TableId) -> bool {
        let item = &self.query[table];
        item.filter.is_some()
            || item.id.is_some()
            || !item.id_list.is_empty()
            || item
                .joins
                .iter()
                .any(|j| !j.is_foreign_key() || self.has_criteria(j.right))
    }

    /// Foreign-key child of `table` through which every property of `term`
    /// is reached, when there is exactly one.
    fn hop(&self, table: TableId, term: &Expr) -> Option<TableId> {
        let tables = term.tables();
        if tables.is_empty() || tables.contains(&table) {
            return None;
        }
        let mut hop = None;
        for t in tables {
            let join = self.query.child_towards(table, t)?;
            if !join.is_foreign_key() || hop.is_some_and(|h| h != join.right) {
                return None;
            }
            hop = Some(join.right);
        }
        hop
    }

    /// Write AND-ed criteria of `table`, grouping terms on joined tables
    /// into one nested item per foreign key.
    fn criteria(&mut self, sink: &mut dyn XmlSink, table: TableId, terms: Vec<Expr>) -> QueryResult<()> {
        let mut entries = Vec::new();
        let mut nested: Vec<(TableId, Vec<Expr>)> = Vec::new();
        for term in terms.into_iter().flat_map(|t| t.into_flattened(LogicalOp::And)) {
            match self.hop(table, &term) {
                Some(child) => match nested.iter_mut().position(|(t, _)| *t == child) {
                    Some(i) => nested[i].1.push(term),
                    None => {
                        entries.push(Entry::Nested(nested.len()));
                        nested.push((child, vec![term]));
                    }
                },
                None => entries.push(Entry::Term(term)),
            }
        }
        let mut nested: Vec<Option<(TableId, Vec<Expr>)>> = nested.into_iter().map(Some).collect();
        for entry in entries {
            match entry {
                Entry::Term(term) => self.term(sink, table, &term)?,
                Entry::Nested(i) => {
                    if let Some((child, terms)) = nested[i].take() {
                        self.nested_item(sink, child, terms)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn nested_item(&mut self, sink: &mut dyn XmlSink, child: TableId, terms: Vec<Expr>) -> QueryResult<()> {
        let join = self
            .query
            .parent_join(child)
            .ok_or_else(|| QueryError::ambiguous(format!("table {} is not joined", child)))?;
        sink.start(&join.left_property)?;
        self.item(sink, child, terms, false)?;
        sink.end_element()
    }

    fn term(&mut self, sink: &mut dyn XmlSink, table: TableId, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Logical {
                op: LogicalOp::And, ..
            } => {
                sink.start("and")?;
                self.criteria(sink, table, vec![expr.clone()])?;
                sink.end_element()
            }
            Expr::Logical {
                op: LogicalOp::Or, ..
            } => {
                sink.start("or")?;
                for operand in expr.flatten(LogicalOp::Or) {
                    match self.hop(table, operand) {
                        Some(child) => self.nested_item(sink, child, vec![operand.clone()])?,
                        None => self.term(sink, table, operand)?,
                    }
                }
                sink.end_element()
            }
            Expr::Not(inner) => {
                sink.start("not")?;
                self.criteria(sink, table, vec![(**inner).clone()])?;
                sink.end_element()
            }
            Expr::Bool(true) => Ok(()),
            Expr::Bool(false) => {
                sink.start("id")?;
                sink.attribute("condition", "is null")?;
                sink.end_element()
            }
            other => self.leaf(sink, table, other),
        }
    }

    fn leaf(&self, sink: &mut dyn XmlSink, table: TableId, expr: &Expr) -> QueryResult<()> {
        let (name, condition, text) = match expr {
            Expr::Comparison { op, left, right } => {
                let condition = (op.name() != "eq").then(|| op.name().to_string());
                (self.own_property(table, left)?, condition, self.value_text(right)?)
            }
            Expr::Like {
                left,
                pattern,
                negated,
            } => {
                let Expr::Pattern(pattern) = pattern.as_ref() else {
                    return Err(QueryError::unsupported("like with a computed pattern"));
                };
                (
                    self.own_property(table, left)?,
                    Some(if *negated { "not like" } else { "like" }.to_string()),
                    pattern.render_wildcard(&WildcardSyntax::AML)?,
                )
            }
            Expr::Between {
                left,
                min,
                max,
                negated,
                ..
            } => (
                self.own_property(table, left)?,
                Some(if *negated { "not between" } else { "between" }.to_string()),
                format!("{} and {}", self.sql_text(min)?, self.sql_text(max)?),
            ),
            Expr::In {
                left,
                list,
                negated,
                ..
            } => {
                let values = list
                    .iter()
                    .map(|v| self.sql_text(v))
                    .collect::<QueryResult<Vec<_>>>()?;
                (
                    self.own_property(table, left)?,
                    Some(if *negated { "not in" } else { "in" }.to_string()),
                    values.join(", "),
                )
            }
            Expr::Is { left, operand } => (
                self.own_property(table, left)?,
                Some(operand.condition().to_string()),
                String::new(),
            ),
            Expr::Function { func, args }
                if matches!(
                    func,
                    Function::StartsWith | Function::EndsWith | Function::Contains
                ) =>
            {
                let [subject, find] = args.as_slice() else {
                    return Err(QueryError::unsupported(format!("{} arguments", func)));
                };
                let text = match find {
                    Expr::String(s) => s.clone(),
                    Expr::Object(o) => o.value.clone(),
                    _ => return Err(QueryError::unsupported(format!("{} of a computed value", func))),
                };
                let shape = match func {
                    Function::StartsWith => LikeShape::StartsWith,
                    Function::EndsWith => LikeShape::EndsWith,
                    _ => LikeShape::Contains,
                };
                let pattern = PatternList::from_shape(shape, &text);
                (
                    self.own_property(table, subject)?,
                    Some("like".to_string()),
                    pattern.render_wildcard(&WildcardSyntax::AML)?,
                )
            }
            Expr::Property(p) if p.table == table => (p.name.as_str(), None, "1".to_string()),
            other => {
                tracing::debug!("No AML form for criterion '{}'", other);
                return Err(QueryError::unsupported(format!(
                    "criterion '{}' cannot be expressed in AML",
                    other
                )));
            }
        };
        sink.start(name)?;
        if let Some(condition) = condition {
            sink.attribute("condition", &condition)?;
        }
        if !text.is_empty() {
            sink.text(&text)?;
        }
        sink.end_element()
    }

    fn own_property<'e>(&self, table: TableId, expr: &'e Expr) -> QueryResult<&'e str> {
        match expr {
            Expr::Property(p) if p.table == table => Ok(p.name.as_str()),
            other => Err(QueryError::unsupported(format!(
                "'{}' is not a property of table {}",
                other, table
            ))),
        }
    }

    fn bound(&self, name: &ParamName) -> Option<&str> {
        match name {
            ParamName::Named(n) => self.ctx.settings.parameters.get(n).map(String::as_str),
            ParamName::Positional(_) => None,
        }
    }

    /// Element text of a comparison value.
    fn value_text(&self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Object(o) => Ok(o.value.clone()),
            Expr::String(s) => Ok(s.clone()),
            Expr::Integer(n) => Ok(n.to_string()),
            Expr::Float(n) => Ok(format!("{:?}", n)),
            Expr::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Expr::DateTime(dt) => Ok(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Expr::Function {
                func: Function::CurrentDateTime,
                args,
            } if args.is_empty() => Ok("__now()".to_string()),
            Expr::Parameter(p) => match (self.bound(&p.name), &p.default) {
                (Some(value), _) => Ok(value.to_string()),
                (None, Some(default)) => self.value_text(default),
                (None, None) => Ok(format!("@{}", p.name)),
            },
            other => Err(QueryError::unsupported(format!(
                "value '{}' cannot be expressed in AML",
                other
            ))),
        }
    }

    /// SQL literal text, as read back by the IN-list and BETWEEN parsers.
    fn sql_text(&self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Object(o) => Ok(quote(&o.value)),
            Expr::String(s) => Ok(quote(s)),
            Expr::Integer(_) | Expr::Float(_) | Expr::Negate(_) => Ok(expr.to_string()),
            Expr::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Expr::DateTime(dt) => Ok(quote(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
            Expr::Parameter(p) => match (self.bound(&p.name), &p.default) {
                (Some(value), _) => self.sql_text(&infer_value(value)),
                (None, Some(default)) => self.sql_text(default),
                (None, None) => Ok(format!("@{}", p.name)),
            },
            other => Err(QueryError::unsupported(format!(
                "value '{}' cannot be expressed in AML",
                other
            ))),
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
