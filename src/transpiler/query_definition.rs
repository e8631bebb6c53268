//! Stored query definition (`qry_QueryDefinition`) rendering.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ast::{
    ComparisonOp, Expr, IsOperand, LogicalOp, PropertyRef, Query, SortDirection, TableId,
};
use crate::config::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::parser::query_definition::{
    QUERY_ITEM, QUERY_PARAMETER, QUERY_REFERENCE, SELECT_PROPERTY, SORT_PROPERTY,
};
use crate::pattern::WildcardSyntax;
use crate::xml::{XmlSink, XmlTextWriter};

const QUERY_DEFINITION: &str = "qry_QueryDefinition";
const SORT_ORDER_STEP: usize = 128;

/// Render a query as a stored query definition document.
pub fn to_query_definition(ctx: &QueryContext<'_>, query: &Query) -> QueryResult<String> {
    let mut writer = XmlTextWriter::new();
    QueryDefinitionRenderer::new(ctx, query).render(&mut writer)?;
    writer.into_string()
}

/// Writes a [`Query`] as a `qry_QueryDefinition` item.
///
/// Every table becomes a `qry_QueryItem` with a fresh `ref_id`; every join
/// becomes a `qry_QueryReference` whose condition holds the join key.
pub struct QueryDefinitionRenderer<'a> {
    ctx: &'a QueryContext<'a>,
    query: &'a Query,
    ref_ids: HashMap<TableId, String>,
}

impl<'a> QueryDefinitionRenderer<'a> {
    pub fn new(ctx: &'a QueryContext<'a>, query: &'a Query) -> Self {
        let ref_ids = query
            .walk()
            .into_iter()
            .map(|t| (t, new_ref_id()))
            .collect();
        Self {
            ctx,
            query,
            ref_ids,
        }
    }

    pub fn render(&self, sink: &mut dyn XmlSink) -> QueryResult<()> {
        let tables = self.query.walk();
        let filters = self.distribute_filters(&tables)?;
        tracing::debug!("Rendering query definition with {} item(s)", tables.len());

        sink.start("Item")?;
        sink.attribute("type", QUERY_DEFINITION)?;
        sink.attribute("action", "add")?;
        sink.start("Relationships")?;
        for &table in &tables {
            self.query_item(sink, table, filters.get(&table).map(Vec::as_slice).unwrap_or_default())?;
        }
        for &table in &tables {
            for join in &self.query[table].joins {
                self.reference(sink, join.left, join.right, &join.left_property, &join.right_property)?;
            }
        }
        for parameter in &self.query.parameters {
            sink.start("Item")?;
            sink.attribute("type", QUERY_PARAMETER)?;
            sink.attribute("action", "add")?;
            sink.leaf("name", &parameter.name)?;
            if let Some(value) = &parameter.default {
                sink.leaf("value", value)?;
            }
            sink.end_element()?;
        }
        sink.end_element()?;
        sink.end_element()
    }

    fn ref_id(&self, table: TableId) -> &str {
        self.ref_ids.get(&table).map(String::as_str).unwrap_or_default()
    }

    /// Split every filter into AND terms and file each under the one table
    /// it references.
    fn distribute_filters(&self, tables: &[TableId]) -> QueryResult<HashMap<TableId, Vec<Expr>>> {
        let mut out: HashMap<TableId, Vec<Expr>> = HashMap::new();
        for &table in tables {
            let Some(filter) = &self.query[table].filter else {
                continue;
            };
            for term in filter.clone().into_flattened(LogicalOp::And) {
                let referenced = term.tables();
                let target = match referenced.len() {
                    0 => table,
                    1 => referenced.into_iter().next().unwrap_or(table),
                    _ => {
                        return Err(QueryError::unsupported(format!(
                            "criterion '{}' spans more than one query item",
                            term
                        )));
                    }
                };
                out.entry(target).or_default().push(term);
            }
        }
        Ok(out)
    }

    fn query_item(&self, sink: &mut dyn XmlSink, table: TableId, filter: &[Expr]) -> QueryResult<()> {
        let item = &self.query[table];
        let type_name = self
            .ctx
            .table_type_name(self.query, table)
            .ok_or_else(|| QueryError::unsupported(format!("item type of table {} is unknown", table)))?;
        sink.start("Item")?;
        sink.attribute("type", QUERY_ITEM)?;
        sink.attribute("action", "add")?;
        sink.leaf("ref_id", self.ref_id(table))?;
        if let Some(alias) = &item.alias {
            sink.leaf("alias", alias)?;
        }
        sink.start("item_type")?;
        sink.attribute("keyed_name", &type_name)?;
        sink.text(&type_name)?;
        sink.end_element()?;

        let mut terms = Vec::new();
        if let Some(id) = &item.id {
            terms.push(Expr::Comparison {
                op: ComparisonOp::Eq,
                left: Box::new(Expr::Property(PropertyRef::new(table, "id"))),
                right: Box::new(Expr::String(id.clone())),
            });
        }
        if !item.id_list.is_empty() {
            terms.push(Expr::In {
                left: Box::new(Expr::Property(PropertyRef::new(table, "id"))),
                list: item.id_list.iter().cloned().map(Expr::String).collect(),
                negated: false,
                table: None,
            });
        }
        terms.extend(
            filter
                .iter()
                .filter(|t| !matches!(t, Expr::Bool(true)))
                .cloned(),
        );
        if !terms.is_empty() {
            let xml = ConditionWriter { table, parent: None }.to_text(&terms)?;
            sink.leaf("filter_xml", &xml)?;
        }

        if item.offset.is_some() || item.fetch.is_some() {
            let mut paging = XmlTextWriter::new();
            paging.start("configuration")?;
            paging.start("option")?;
            if let Some(offset) = item.offset {
                paging.leaf("offset", &offset.to_string())?;
            }
            if let Some(fetch) = item.fetch {
                paging.leaf("fetch", &fetch.to_string())?;
            }
            paging.end_element()?;
            paging.end_element()?;
            sink.leaf("offset_fetch_xml", &paging.into_string()?)?;
        }

        if !item.select.is_empty() || !item.order_by.is_empty() {
            sink.start("Relationships")?;
            for select in &item.select {
                let name = match &select.expr {
                    Expr::AllProperties { .. } => "*",
                    Expr::Property(p) if p.table == table => p.name.as_str(),
                    other => {
                        return Err(QueryError::unsupported(format!(
                            "select '{}' in a query definition",
                            other
                        )));
                    }
                };
                sink.start("Item")?;
                sink.attribute("type", SELECT_PROPERTY)?;
                sink.attribute("action", "add")?;
                sink.leaf("property_name", name)?;
                sink.end_element()?;
            }
            for (i, order) in item.order_by.iter().enumerate() {
                let Expr::Property(p) = &order.expr else {
                    return Err(QueryError::unsupported(format!(
                        "sort by '{}' in a query definition",
                        order.expr
                    )));
                };
                sink.start("Item")?;
                sink.attribute("type", SORT_PROPERTY)?;
                sink.attribute("action", "add")?;
                sink.leaf("property_name", &p.name)?;
                sink.leaf("sort_order", &((i + 1) * SORT_ORDER_STEP).to_string())?;
                let direction = match order.direction {
                    SortDirection::Ascending => "asc",
                    SortDirection::Descending => "desc",
                };
                sink.leaf("sort_order_direction", direction)?;
                sink.end_element()?;
            }
            sink.end_element()?;
        }
        sink.end_element()
    }

    fn reference(
        &self,
        sink: &mut dyn XmlSink,
        parent: TableId,
        child: TableId,
        parent_property: &str,
        child_property: &str,
    ) -> QueryResult<()> {
        let key = Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(Expr::Property(PropertyRef::new(parent, parent_property))),
            right: Box::new(Expr::Property(PropertyRef::new(child, child_property))),
        };
        let xml = ConditionWriter {
            table: child,
            parent: Some(parent),
        }
        .to_text(&[key])?;
        sink.start("Item")?;
        sink.attribute("type", QUERY_REFERENCE)?;
        sink.attribute("action", "add")?;
        sink.leaf("parent_ref_id", self.ref_id(parent))?;
        sink.leaf("child_ref_id", self.ref_id(child))?;
        sink.leaf("filter_xml", &xml)?;
        sink.end_element()
    }
}

fn new_ref_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

/// Writes condition XML, the inverse of
/// [`crate::parser::query_definition::ConditionParser`].
struct ConditionWriter {
    table: TableId,
    parent: Option<TableId>,
}

impl ConditionWriter {
    fn to_text(&self, terms: &[Expr]) -> QueryResult<String> {
        let mut writer = XmlTextWriter::new();
        writer.start("condition")?;
        match terms {
            [single] => self.expr(&mut writer, single)?,
            _ => {
                writer.start("and")?;
                for term in terms {
                    self.expr(&mut writer, term)?;
                }
                writer.end_element()?;
            }
        }
        writer.end_element()?;
        writer.into_string()
    }

    fn element(&self, sink: &mut dyn XmlSink, name: &str, operands: &[&Expr]) -> QueryResult<()> {
        sink.start(name)?;
        for operand in operands {
            self.operand(sink, operand)?;
        }
        sink.end_element()
    }

    fn negated(
        &self,
        sink: &mut dyn XmlSink,
        negated: bool,
        write: impl FnOnce(&mut dyn XmlSink) -> QueryResult<()>,
    ) -> QueryResult<()> {
        if negated {
            sink.start("not")?;
            write(sink)?;
            sink.end_element()
        } else {
            write(sink)
        }
    }

    fn expr(&self, sink: &mut dyn XmlSink, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Logical { op, .. } => {
                sink.start(op.keyword())?;
                for term in expr.flatten(*op) {
                    self.expr(sink, term)?;
                }
                sink.end_element()
            }
            Expr::Not(inner) => {
                sink.start("not")?;
                self.expr(sink, inner)?;
                sink.end_element()
            }
            Expr::Comparison { op, left, right } => self.element(sink, op.name(), &[left.as_ref(), right.as_ref()]),
            Expr::Like {
                left,
                pattern,
                negated,
            } => self.negated(sink, *negated, |sink| self.element(sink, "like", &[left.as_ref(), pattern.as_ref()])),
            Expr::Between {
                left,
                min,
                max,
                negated,
                ..
            } => self.negated(sink, *negated, |sink| {
                self.element(sink, "between", &[left.as_ref(), min.as_ref(), max.as_ref()])
            }),
            Expr::In {
                left,
                list,
                negated,
                ..
            } => self.negated(sink, *negated, |sink| {
                let mut operands: Vec<&Expr> = vec![left.as_ref()];
                operands.extend(list.iter());
                self.element(sink, "in", &operands)
            }),
            Expr::Is { left, operand } => {
                let op = match operand {
                    IsOperand::Null | IsOperand::NotDefined => "eq",
                    IsOperand::NotNull | IsOperand::Defined => "ne",
                };
                sink.start(op)?;
                self.operand(sink, left)?;
                sink.start("null")?;
                sink.end_element()?;
                sink.end_element()
            }
            Expr::Bool(true) => Ok(()),
            Expr::Bool(false) => {
                sink.start("eq")?;
                self.operand(sink, &Expr::Property(PropertyRef::new(self.table, "id")))?;
                sink.start("null")?;
                sink.end_element()?;
                sink.end_element()
            }
            Expr::Property(p) => self.element(
                sink,
                "eq",
                &[&Expr::Property(p.clone()), &Expr::Bool(true)],
            ),
            other => Err(QueryError::unsupported(format!(
                "condition '{}' in a query definition",
                other
            ))),
        }
    }

    fn operand(&self, sink: &mut dyn XmlSink, expr: &Expr) -> QueryResult<()> {
        let constant = match expr {
            Expr::Property(p) => {
                sink.start("property")?;
                sink.attribute("name", &p.name)?;
                if Some(p.table) == self.parent && p.table != self.table {
                    sink.attribute("query_items_xpath", "parent::Item")?;
                } else if p.table != self.table {
                    return Err(QueryError::unsupported(format!(
                        "property '{}' of another query item",
                        p.name
                    )));
                }
                return sink.end_element();
            }
            Expr::Parameter(p) => {
                sink.start("parameter")?;
                sink.attribute("name", &p.name.to_string())?;
                return sink.end_element();
            }
            Expr::Object(o) => o.value.clone(),
            Expr::String(s) => s.clone(),
            Expr::Integer(n) => n.to_string(),
            Expr::Float(n) => format!("{:?}", n),
            Expr::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Expr::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Expr::Pattern(p) => p.render_wildcard(&WildcardSyntax::SQL_SERVER)?,
            other => {
                return Err(QueryError::unsupported(format!(
                    "operand '{}' in a query definition",
                    other
                )));
            }
        };
        sink.leaf("constant", &constant)
    }
}
