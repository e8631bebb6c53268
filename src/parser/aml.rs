//! AML `<Item action="get">` queries to the query model.
//!
//! [`AmlParser`] is an [`XmlSink`]; it keeps an explicit stack of the
//! constructs being built. Attributes of an element are collected until the
//! first child, text, or end of that element arrives, then applied at once.

use nom::{
    IResult,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::opt,
    multi::separated_list1,
    sequence::{delimited, pair, terminated},
};

use super::sql::{parse_between_range, parse_in_list, parse_where};
use crate::ast::{
    ComparisonOp, Expr, Function, IsOperand, JoinType, ObjectLiteral, OrderByExpression,
    PropertyRef, Query, QueryItem, SelectExpression, SortDirection, TableId,
};
use crate::error::{QueryError, QueryResult};
use crate::pattern::{PatternList, WildcardSyntax};
use crate::xml::{XmlSink, read_xml};

/// Item attributes that do not change the result.
const IGNORED_ATTRIBUTES: &[&str] = &[
    "language",
    "isCriteria",
    "serverEvents",
    "related_expand",
    "doGetItem",
    "initial_action",
];

/// Parse AML text into a [`Query`].
///
/// # Example
/// ```
/// use aml_query::parser::aml::parse_aml;
///
/// let query = parse_aml("<Item type='Part' action='get'><state>Released</state></Item>").unwrap();
/// let root = query.root();
/// assert_eq!(query[root].type_name.as_deref(), Some("Part"));
/// assert_eq!(query[root].filter.as_ref().unwrap().to_string(), "t0.state = 'Released'");
/// ```
pub fn parse_aml(xml: &str) -> QueryResult<Query> {
    tracing::debug!("Parsing AML query");
    let mut parser = AmlParser::new();
    read_xml(xml, &mut parser)?;
    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemRole {
    Root,
    ForeignKey,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalKind {
    And,
    Or,
    Not,
}

#[derive(Debug)]
enum Frame {
    /// The `<AML>` envelope.
    Envelope,
    Item {
        table: TableId,
        role: ItemRole,
        criteria: Vec<Expr>,
    },
    Logical {
        kind: LogicalKind,
        criteria: Vec<Expr>,
    },
    Property {
        property: PropertyRef,
        condition: Option<String>,
        text: String,
        /// Set once a nested `<Item>` has closed.
        nested: Option<Option<Expr>>,
    },
    Relationships {
        table: TableId,
    },
}

/// Event-driven AML parser.
#[derive(Debug, Default)]
pub struct AmlParser {
    query: Option<Query>,
    stack: Vec<Frame>,
    /// Attributes of the innermost element not yet applied.
    attributes: Vec<(String, String)>,
    attribute: Option<(String, String)>,
    done: bool,
}

impl AmlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed query.
    pub fn finish(mut self) -> QueryResult<Query> {
        if !self.stack.is_empty() {
            return Err(QueryError::xml("unclosed element"));
        }
        self.query
            .take()
            .ok_or_else(|| QueryError::unsupported("AML without an Item"))
    }

    fn query_mut(&mut self) -> QueryResult<&mut Query> {
        self.query
            .as_mut()
            .ok_or_else(|| QueryError::unsupported("criteria outside of an Item"))
    }

    /// Owning table of the innermost frame, and whether a logical operator
    /// lies between the two.
    fn owner(&self) -> Option<(TableId, bool)> {
        let mut in_logical = false;
        for frame in self.stack.iter().rev() {
            match frame {
                Frame::Item { table, .. } => return Some((*table, in_logical)),
                Frame::Logical { .. } => in_logical = true,
                _ => {}
            }
        }
        None
    }

    fn apply_attributes(&mut self) -> QueryResult<()> {
        if self.attributes.is_empty() {
            return Ok(());
        }
        let attributes = std::mem::take(&mut self.attributes);
        match self.stack.last_mut() {
            Some(Frame::Item { table, .. }) => {
                let table = *table;
                let mut extra = Vec::new();
                self.apply_item_attributes(table, attributes, &mut extra)?;
                if let Some(Frame::Item { criteria, .. }) = self.stack.last_mut() {
                    criteria.extend(extra);
                }
            }
            Some(Frame::Property { condition, .. }) => {
                for (name, value) in attributes {
                    if name == "condition" {
                        *condition = Some(value);
                    } else {
                        tracing::debug!("Ignoring property attribute '{}'", name);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_item_attributes(
        &mut self,
        table: TableId,
        attributes: Vec<(String, String)>,
        criteria: &mut Vec<Expr>,
    ) -> QueryResult<()> {
        let query = self.query_mut()?;
        let mut page = None;
        let mut page_size = None;
        let mut max_records = None;
        let mut select = None;
        let mut order_by = None;
        let mut where_clause = None;

        for (name, value) in attributes {
            let item = &mut query[table];
            match name.as_str() {
                "type" => item.type_name = Some(value),
                "typeId" => item.type_id = Some(value),
                "alias" => item.alias = Some(value),
                "id" => item.id = Some(value),
                "idlist" => {
                    item.id_list = value
                        .split(',')
                        .map(|s| s.trim().trim_matches('\'').to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }
                "action" => {
                    if !value.eq_ignore_ascii_case("get") {
                        tracing::debug!("Rejected AML action '{}'", value);
                        return Err(QueryError::unsupported(format!("action '{}'", value)));
                    }
                }
                "select" => select = Some(value),
                "orderBy" => order_by = Some(value),
                "page" => page = Some(parse_count(&name, &value)?),
                "pagesize" => page_size = Some(parse_count(&name, &value)?),
                "maxRecords" => max_records = Some(parse_count(&name, &value)?),
                "where" => where_clause = Some(value),
                other if IGNORED_ATTRIBUTES.contains(&other) => {}
                other => {
                    return Err(QueryError::unsupported(format!(
                        "Item attribute '{}'",
                        other
                    )));
                }
            }
        }

        match page_size {
            Some(size) => {
                let offset = page.unwrap_or(1).saturating_sub(1) * size;
                query[table].fetch = Some(size);
                query[table].offset = (offset > 0).then_some(offset);
            }
            None => query[table].fetch = max_records,
        }
        if let Some(select) = select {
            apply_select(query, table, &select)?;
        }
        if let Some(order_by) = order_by {
            query[table].order_by = parse_order_by(table, &order_by);
        }
        if let Some(sql) = where_clause {
            criteria.push(parse_where(query, table, &sql)?);
        }
        Ok(())
    }

    fn push_criterion(&mut self, criterion: Expr) -> QueryResult<()> {
        match self.stack.last_mut() {
            Some(Frame::Item { criteria, .. }) | Some(Frame::Logical { criteria, .. }) => {
                criteria.push(criterion);
                Ok(())
            }
            _ => Err(QueryError::unsupported("criterion outside of an Item")),
        }
    }

    fn start_item(&mut self) -> QueryResult<()> {
        let frame = match self.stack.last() {
            None | Some(Frame::Envelope) => {
                if self.query.is_some() || self.done {
                    return Err(QueryError::unsupported("more than one Item in a query"));
                }
                let query = Query::with_root(QueryItem::default());
                let table = query.root();
                self.query = Some(query);
                Frame::Item {
                    table,
                    role: ItemRole::Root,
                    criteria: Vec::new(),
                }
            }
            Some(Frame::Property {
                property, nested, ..
            }) => {
                if nested.is_some() {
                    return Err(QueryError::unsupported("more than one Item in a property"));
                }
                let property = property.clone();
                let (_, in_logical) = self.owner().unwrap_or((property.table, false));
                let kind = if in_logical {
                    JoinType::LeftOuter
                } else {
                    JoinType::Inner
                };
                let table = self
                    .query_mut()?
                    .join_property(property.table, &property.name, kind);
                Frame::Item {
                    table,
                    role: ItemRole::ForeignKey,
                    criteria: Vec::new(),
                }
            }
            Some(Frame::Relationships { table }) => {
                let source = *table;
                let table = self.query_mut()?.add_relationship(source, "");
                Frame::Item {
                    table,
                    role: ItemRole::Relationship,
                    criteria: Vec::new(),
                }
            }
            Some(Frame::Item { .. }) | Some(Frame::Logical { .. }) => {
                return Err(QueryError::unsupported("Item directly inside an Item"));
            }
        };
        self.stack.push(frame);
        Ok(())
    }

    fn end_item(&mut self, table: TableId, role: ItemRole, criteria: Vec<Expr>) -> QueryResult<()> {
        let criteria = Expr::and_all(criteria);
        let query = self.query_mut()?;
        let untyped = query[table].type_name.as_deref().is_none_or(str::is_empty);
        if untyped && role != ItemRole::ForeignKey {
            return Err(QueryError::unsupported("Item without a type"));
        }
        match role {
            ItemRole::Root => {
                if let Some(c) = criteria {
                    query[table].add_filter(c);
                }
                self.done = true;
            }
            ItemRole::Relationship => {
                if let Some(c) = criteria {
                    query[table].add_filter(c);
                }
            }
            ItemRole::ForeignKey => match self.stack.last_mut() {
                Some(Frame::Property { nested, .. }) => *nested = Some(criteria),
                _ => return Err(QueryError::unsupported("Item outside of a property")),
            },
        }
        Ok(())
    }

    fn end_property(
        &mut self,
        property: PropertyRef,
        condition: Option<String>,
        text: String,
        nested: Option<Option<Expr>>,
    ) -> QueryResult<()> {
        let criterion = match nested {
            Some(criteria) => criteria,
            None => {
                let query = self.query_mut()?;
                Some(condition_criterion(
                    query,
                    property,
                    condition.as_deref().unwrap_or("eq"),
                    &text,
                )?)
            }
        };
        match criterion {
            Some(c) => self.push_criterion(c),
            None => Ok(()),
        }
    }
}

impl XmlSink for AmlParser {
    fn start_element(&mut self, _prefix: &str, local_name: &str, _namespace: &str) -> QueryResult<()> {
        self.apply_attributes()?;
        match (local_name, self.stack.last()) {
            ("AML", None) => self.stack.push(Frame::Envelope),
            ("Item", _) => self.start_item()?,
            ("and" | "or" | "not", Some(Frame::Item { .. } | Frame::Logical { .. })) => {
                let kind = match local_name {
                    "and" => LogicalKind::And,
                    "or" => LogicalKind::Or,
                    _ => LogicalKind::Not,
                };
                self.stack.push(Frame::Logical {
                    kind,
                    criteria: Vec::new(),
                });
            }
            ("Relationships", Some(Frame::Item { table, .. })) => {
                let table = *table;
                self.stack.push(Frame::Relationships { table });
            }
            ("Relationships", _) => {
                return Err(QueryError::unsupported(
                    "Relationships outside of an Item",
                ));
            }
            (name, Some(Frame::Item { .. } | Frame::Logical { .. })) => {
                let (table, _) = self
                    .owner()
                    .ok_or_else(|| QueryError::unsupported("property outside of an Item"))?;
                self.stack.push(Frame::Property {
                    property: PropertyRef::new(table, name),
                    condition: None,
                    text: String::new(),
                    nested: None,
                });
            }
            (name, _) => {
                return Err(QueryError::unsupported(format!(
                    "element '{}' in this position",
                    name
                )));
            }
        }
        Ok(())
    }

    fn end_element(&mut self) -> QueryResult<()> {
        self.apply_attributes()?;
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| QueryError::xml("end of element without a start"))?;
        match frame {
            Frame::Envelope | Frame::Relationships { .. } => Ok(()),
            Frame::Item {
                table,
                role,
                criteria,
            } => self.end_item(table, role, criteria),
            Frame::Logical { kind, criteria } => {
                let combined = match kind {
                    LogicalKind::And => Expr::and_all(criteria),
                    LogicalKind::Or => Expr::or_all(criteria),
                    LogicalKind::Not => Expr::and_all(criteria).map(|c| Expr::Not(Box::new(c))),
                };
                match combined {
                    Some(c) => self.push_criterion(c),
                    None => Ok(()),
                }
            }
            Frame::Property {
                property,
                condition,
                text,
                nested,
            } => self.end_property(property, condition, text, nested),
        }
    }

    fn start_attribute(&mut self, _prefix: &str, local_name: &str, _namespace: &str) -> QueryResult<()> {
        self.attribute = Some((local_name.to_string(), String::new()));
        Ok(())
    }

    fn end_attribute(&mut self) -> QueryResult<()> {
        let attr = self
            .attribute
            .take()
            .ok_or_else(|| QueryError::xml("end of attribute without a start"))?;
        self.attributes.push(attr);
        Ok(())
    }

    fn text(&mut self, text: &str) -> QueryResult<()> {
        if let Some((_, value)) = self.attribute.as_mut() {
            value.push_str(text);
            return Ok(());
        }
        self.apply_attributes()?;
        match self.stack.last_mut() {
            Some(Frame::Property { text: buffer, .. }) => {
                buffer.push_str(text);
                Ok(())
            }
            _ if text.trim().is_empty() => Ok(()),
            _ => Err(QueryError::unsupported("text outside of a property")),
        }
    }
}

fn parse_count(name: &str, value: &str) -> QueryResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::unsupported(format!("{} '{}' is not a number", name, value)))
}

fn value_literal(property: &PropertyRef, text: &str) -> Expr {
    if text.trim().eq_ignore_ascii_case("__now()") {
        return Expr::Function {
            func: Function::CurrentDateTime,
            args: Vec::new(),
        };
    }
    Expr::Object(ObjectLiteral::for_property(text, property.clone()))
}

/// Bind string literals from a SQL value list to the property.
fn bind_value(property: &PropertyRef, value: Expr) -> Expr {
    match value {
        Expr::String(s) => value_literal(property, &s),
        other => other,
    }
}

/// Criterion for a property element with the given `condition`.
fn condition_criterion(
    query: &Query,
    property: PropertyRef,
    condition: &str,
    text: &str,
) -> QueryResult<Expr> {
    let normalized = condition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    let negated = normalized.starts_with("not ");
    let left = Box::new(Expr::Property(property.clone()));
    let table = property.table;
    let expr = match normalized.as_str() {
        "like" | "not like" => Expr::Like {
            left,
            pattern: Box::new(Expr::Pattern(PatternList::parse_wildcard(
                text,
                &WildcardSyntax::AML,
            )?)),
            negated,
        },
        "in" | "not in" => Expr::In {
            left,
            list: parse_in_list(query, table, text)?
                .into_iter()
                .map(|v| bind_value(&property, v))
                .collect(),
            negated,
            table: None,
        },
        "between" | "not between" => {
            let (min, max) = parse_between_range(query, table, text)?;
            Expr::Between {
                left,
                min: Box::new(bind_value(&property, min)),
                max: Box::new(bind_value(&property, max)),
                negated,
                table: None,
            }
        }
        "is null" | "is" => Expr::Is {
            left,
            operand: IsOperand::Null,
        },
        "is not null" => Expr::Is {
            left,
            operand: IsOperand::NotNull,
        },
        "is defined" => Expr::Is {
            left,
            operand: IsOperand::Defined,
        },
        "is not defined" => Expr::Is {
            left,
            operand: IsOperand::NotDefined,
        },
        other => match ComparisonOp::from_name(other) {
            Some(op) => Expr::Comparison {
                op,
                left,
                right: Box::new(value_literal(&property, text)),
            },
            None => {
                tracing::debug!("Rejected AML condition '{}'", condition);
                return Err(QueryError::unsupported(format!("condition '{}'", condition)));
            }
        },
    };
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectNode<'a> {
    name: &'a str,
    children: Option<Vec<SelectNode<'a>>>,
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn select_field(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '*' || c == '$')(input)
}

fn select_node(input: &str) -> IResult<&str, SelectNode<'_>> {
    let (rest, (name, children)) = pair(
        ws(select_field),
        opt(delimited(char('('), select_list, ws(char(')')))),
    )(input)?;
    Ok((rest, SelectNode { name, children }))
}

fn select_list(input: &str) -> IResult<&str, Vec<SelectNode<'_>>> {
    separated_list1(char(','), select_node)(input)
}

/// Apply a `select` attribute such as `id,created_by_id(keyed_name)`.
fn apply_select(query: &mut Query, table: TableId, text: &str) -> QueryResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let nodes = match terminated(select_list, multispace0)(text) {
        Ok(("", nodes)) => nodes,
        Ok((rest, _)) => {
            let position = text.len() - rest.len();
            return Err(QueryError::parse(position, "unexpected text in select"));
        }
        Err(_) => return Err(QueryError::parse(0, "invalid select list")),
    };
    add_select_nodes(query, table, &nodes);
    Ok(())
}

fn add_select_nodes(query: &mut Query, table: TableId, nodes: &[SelectNode<'_>]) {
    for node in nodes {
        let expr = if node.name == "*" {
            Expr::AllProperties {
                table,
                extended: false,
            }
        } else {
            Expr::Property(PropertyRef::new(table, node.name))
        };
        query[table].select.push(SelectExpression::new(expr));
        if let Some(children) = &node.children {
            let joined = query.join_property(table, node.name, JoinType::LeftOuter);
            add_select_nodes(query, joined, children);
        }
    }
}

fn parse_order_by(table: TableId, text: &str) -> Vec<OrderByExpression> {
    text.split(',')
        .filter_map(|part| {
            let mut words = part.split_whitespace();
            let name = words.next()?;
            let direction = match words.next() {
                Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Descending,
                _ => SortDirection::Ascending,
            };
            Some(OrderByExpression {
                expr: Expr::Property(PropertyRef::new(table, name)),
                direction,
            })
        })
        .collect()
}

/// Flattened `a/b` names of a select list.
#[cfg(test)]
pub(crate) fn select_names(text: &str) -> Vec<String> {
    fn flatten(nodes: &[SelectNode<'_>], prefix: &str, out: &mut Vec<String>) {
        for node in nodes {
            let name = format!("{}{}", prefix, node.name);
            out.push(name.clone());
            if let Some(children) = &node.children {
                flatten(children, &format!("{}/", name), out);
            }
        }
    }
    let mut out = Vec::new();
    if let Ok((_, nodes)) = select_list(text) {
        flatten(&nodes, "", &mut out);
    }
    out
}
