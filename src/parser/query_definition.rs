//! Stored query definitions (`qry_QueryDefinition`) to the query model.
//!
//! Query items, select and sort properties, parameters, and references are
//! read from the definition's relationship items. `filter_xml` and
//! `offset_fetch_xml` carry escaped XML fragments that are parsed again
//! with [`ConditionParser`].

use std::collections::{BTreeMap, VecDeque};

use crate::ast::{
    Cardinality, ComparisonOp, Expr, IsOperand, Join, JoinType, LogicalOp, ObjectLiteral,
    OrderByExpression, Parameter, ParameterDef, PropertyRef, Query, QueryItem, SelectExpression,
    SortDirection, TableId,
};
use crate::error::{QueryError, QueryResult};
use crate::pattern::{PatternList, WildcardSyntax};
use crate::xml::Element;

pub const QUERY_ITEM: &str = "qry_QueryItem";
pub const QUERY_REFERENCE: &str = "qry_QueryReference";
pub const QUERY_PARAMETER: &str = "qry_QueryParameter";
pub const SELECT_PROPERTY: &str = "qry_QueryItemSelectProperty";
pub const SORT_PROPERTY: &str = "qry_QueryItemSortProperty";

/// `query_items_xpath` value pointing at the referencing item.
const PARENT_XPATH: &str = "parent::Item";

/// Parse a `qry_QueryDefinition` document.
pub fn parse_query_definition(xml: &str) -> QueryResult<Query> {
    tracing::debug!("Parsing stored query definition");
    let document = Element::parse(xml)?;
    QueryDefinitionReader::new(&document).read()
}

/// `Item` elements of the given type anywhere below `root`.
fn items_of_type<'a>(root: &'a Element, item_type: &str) -> Vec<&'a Element> {
    let mut out = Vec::new();
    collect_items(root, item_type, &mut out);
    out
}

fn collect_items<'a>(element: &'a Element, item_type: &str, out: &mut Vec<&'a Element>) {
    if element.name == "Item" && element.attr("type") == Some(item_type) {
        out.push(element);
    }
    for child in &element.children {
        collect_items(child, item_type, out);
    }
}

struct ReferenceDef<'a> {
    parent: String,
    child: String,
    filter: Option<&'a str>,
}

struct QueryDefinitionReader<'a> {
    items: BTreeMap<String, &'a Element>,
    references: Vec<ReferenceDef<'a>>,
    parameters: Vec<ParameterDef>,
}

impl<'a> QueryDefinitionReader<'a> {
    fn new(document: &'a Element) -> Self {
        let items = items_of_type(document, QUERY_ITEM)
            .into_iter()
            .filter_map(|item| Some((item.value("ref_id")?.to_string(), item)))
            .collect();
        let references = items_of_type(document, QUERY_REFERENCE)
            .into_iter()
            .filter_map(|r| {
                Some(ReferenceDef {
                    parent: r.value("parent_ref_id")?.to_string(),
                    child: r.value("child_ref_id")?.to_string(),
                    filter: r.value("filter_xml"),
                })
            })
            .collect();
        let parameters = items_of_type(document, QUERY_PARAMETER)
            .into_iter()
            .filter_map(|p| {
                Some(ParameterDef {
                    name: p.value("name")?.to_string(),
                    default: p.value("value").map(str::to_string),
                })
            })
            .collect();
        Self {
            items,
            references,
            parameters,
        }
    }

    fn root_ref(&self) -> QueryResult<&str> {
        let mut roots = self
            .items
            .keys()
            .filter(|id| !self.references.iter().any(|r| &r.child == *id));
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(root.as_str()),
            (None, _) => Err(QueryError::ambiguous("query definition has no root item")),
            (Some(_), Some(_)) => Err(QueryError::ambiguous(
                "query definition has more than one root item",
            )),
        }
    }

    fn read(self) -> QueryResult<Query> {
        let root_ref = self.root_ref()?.to_string();
        let root_item = self.items[&root_ref];
        let mut query = Query::with_root(query_item(root_item)?);
        query.parameters = self.parameters.clone();

        let mut tables = BTreeMap::new();
        tables.insert(root_ref.clone(), query.root());
        let mut pending = VecDeque::from([root_ref]);
        while let Some(parent_ref) = pending.pop_front() {
            let parent = tables[&parent_ref];
            for reference in self.references.iter().filter(|r| r.parent == parent_ref) {
                let element = self.items.get(&reference.child).ok_or_else(|| {
                    QueryError::ambiguous(format!("unknown query item '{}'", reference.child))
                })?;
                if tables.contains_key(&reference.child) {
                    return Err(QueryError::unsupported(format!(
                        "query item '{}' is referenced twice",
                        reference.child
                    )));
                }
                let child = query.add_table(query_item(element)?);
                tables.insert(reference.child.clone(), child);
                self.add_reference(&mut query, parent, child, reference.filter)?;
                pending.push_back(reference.child.clone());
            }
        }
        if tables.len() != self.items.len() {
            return Err(QueryError::ambiguous(
                "query definition has items not connected to the root",
            ));
        }

        for (ref_id, table) in &tables {
            let element = self.items[ref_id];
            let parser = ConditionParser::new(*table, None);
            if let Some(filter) = element.value("filter_xml") {
                if let Some(condition) = parser.parse_fragment(filter)? {
                    query[*table].add_filter(condition.normalize()?);
                }
            }
            if let Some(paging) = element.value("offset_fetch_xml") {
                apply_paging(&mut query[*table], paging)?;
            }
            let (select, order_by) = properties(element, *table)?;
            query[*table].select = select;
            query[*table].order_by = order_by;
        }
        Ok(query)
    }

    /// Join `child` below `parent` from a reference condition. The first
    /// equality between a parent and a child property is the join key; any
    /// other criteria filter the child.
    fn add_reference(
        &self,
        query: &mut Query,
        parent: TableId,
        child: TableId,
        filter: Option<&str>,
    ) -> QueryResult<()> {
        let parser = ConditionParser::new(child, Some(parent));
        let condition = match filter {
            Some(text) => parser.parse_fragment(text)?,
            None => None,
        }
        .ok_or_else(|| QueryError::unsupported("query reference without a condition"))?;

        let mut key = None;
        let mut rest = Vec::new();
        for term in condition.into_flattened(LogicalOp::And) {
            if key.is_none() {
                if let Some(pair) = join_key(&term, parent, child) {
                    key = Some(pair);
                    continue;
                }
            }
            rest.push(term);
        }
        let (left_property, right_property) = key.ok_or_else(|| {
            QueryError::unsupported("query reference without an equality between its items")
        })?;
        let cardinality = if right_property == "id" {
            Cardinality::OneToOne
        } else {
            Cardinality::OneToMany
        };
        let kind = match cardinality {
            Cardinality::OneToOne => JoinType::LeftOuter,
            Cardinality::OneToMany => JoinType::Inner,
        };
        if cardinality == Cardinality::OneToOne {
            query[child].type_provider = Some(PropertyRef::new(parent, left_property.clone()));
        }
        query.add_join(Join {
            left: parent,
            right: child,
            kind,
            cardinality,
            left_property,
            right_property,
        })?;
        if let Some(extra) = Expr::and_all(rest) {
            query[child].add_filter(extra.normalize()?);
        }
        Ok(())
    }
}

fn join_key(term: &Expr, parent: TableId, child: TableId) -> Option<(String, String)> {
    let Expr::Comparison {
        op: ComparisonOp::Eq,
        left,
        right,
    } = term
    else {
        return None;
    };
    let (a, b) = (left.as_property()?, right.as_property()?);
    if a.table == parent && b.table == child {
        Some((a.name.clone(), b.name.clone()))
    } else if a.table == child && b.table == parent {
        Some((b.name.clone(), a.name.clone()))
    } else {
        None
    }
}

fn query_item(element: &Element) -> QueryResult<QueryItem> {
    let type_name = element
        .child("item_type")
        .and_then(|t| {
            t.attr("keyed_name")
                .or_else(|| t.attr("name"))
                .or(Some(t.text.as_str()))
        })
        .or_else(|| element.attr("item_type"))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| QueryError::unsupported("query item without an item type"))?;
    let mut item = QueryItem::new(type_name);
    item.alias = element.value("alias").map(str::to_string);
    Ok(item)
}

fn properties(
    element: &Element,
    table: TableId,
) -> QueryResult<(Vec<SelectExpression>, Vec<OrderByExpression>)> {
    let select = items_of_type(element, SELECT_PROPERTY)
        .into_iter()
        .filter_map(|p| p.value("property_name"))
        .map(|name| SelectExpression::new(property_expr(table, name)))
        .collect();

    let mut sorted = Vec::new();
    for p in items_of_type(element, SORT_PROPERTY) {
        let Some(name) = p.value("property_name") else {
            continue;
        };
        let order: i64 = match p.value("sort_order") {
            Some(text) => text
                .trim()
                .parse()
                .map_err(|_| QueryError::unsupported(format!("sort order '{}'", text)))?,
            None => 0,
        };
        let direction = match p.value("sort_order_direction") {
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        sorted.push((
            order,
            OrderByExpression {
                expr: property_expr(table, name),
                direction,
            },
        ));
    }
    sorted.sort_by_key(|(order, _)| *order);
    Ok((select, sorted.into_iter().map(|(_, o)| o).collect()))
}

fn property_expr(table: TableId, name: &str) -> Expr {
    if name == "*" {
        Expr::AllProperties {
            table,
            extended: false,
        }
    } else {
        Expr::Property(PropertyRef::new(table, name))
    }
}

/// `<configuration><option><offset>n</offset><fetch>m</fetch></option></configuration>`
fn apply_paging(item: &mut QueryItem, xml: &str) -> QueryResult<()> {
    let root = Element::parse(xml)?;
    item.offset = paging_value(&root, "offset")?.filter(|n| *n > 0);
    item.fetch = paging_value(&root, "fetch")?;
    Ok(())
}

fn paging_value(root: &Element, name: &str) -> QueryResult<Option<u64>> {
    match find_element(root, name).map(|e| e.text.trim()) {
        Some("") | None => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| QueryError::unsupported(format!("{} '{}' is not a number", name, text))),
    }
}

fn find_element<'e>(element: &'e Element, name: &str) -> Option<&'e Element> {
    if element.name == name {
        return Some(element);
    }
    element.children.iter().find_map(|c| find_element(c, name))
}

/// Reads condition XML (`<condition><eq><property name="x"/><constant>1</constant></eq></condition>`).
///
/// A property with `query_items_xpath="parent::Item"` refers to the parent
/// table; any other property refers to the current table.
pub struct ConditionParser {
    table: TableId,
    parent: Option<TableId>,
}

impl ConditionParser {
    pub fn new(table: TableId, parent: Option<TableId>) -> Self {
        Self { table, parent }
    }

    /// Parse a condition fragment; an empty `<condition/>` yields `None`.
    pub fn parse_fragment(&self, xml: &str) -> QueryResult<Option<Expr>> {
        if xml.trim().is_empty() {
            return Ok(None);
        }
        let root = Element::parse(xml)?;
        if root.name == "condition" {
            let terms = root
                .children
                .iter()
                .map(|c| self.expr(c))
                .collect::<QueryResult<Vec<_>>>()?;
            return Ok(Expr::and_all(terms));
        }
        self.expr(&root).map(Some)
    }

    fn operands(&self, element: &Element) -> QueryResult<Vec<Expr>> {
        element.children.iter().map(|c| self.operand(c)).collect()
    }

    fn expr(&self, element: &Element) -> QueryResult<Expr> {
        let name = element.name.as_str();
        match name {
            "and" | "or" => {
                let op = if name == "and" { LogicalOp::And } else { LogicalOp::Or };
                let terms = element
                    .children
                    .iter()
                    .map(|c| self.expr(c))
                    .collect::<QueryResult<Vec<_>>>()?;
                let combined = match op {
                    LogicalOp::And => Expr::and_all(terms),
                    LogicalOp::Or => Expr::or_all(terms),
                };
                combined.ok_or_else(|| QueryError::unsupported(format!("empty <{}>", name)))
            }
            "not" => {
                let [inner] = element.children.as_slice() else {
                    return Err(QueryError::unsupported("<not> needs exactly one operand"));
                };
                Ok(Expr::Not(Box::new(self.expr(inner)?)))
            }
            "like" => {
                let [left, right] = self.binary_operands(element)?;
                let pattern = match right {
                    Expr::Object(o) => {
                        Expr::Pattern(PatternList::parse_wildcard(&o.value, &WildcardSyntax::SQL_SERVER)?)
                    }
                    other => other,
                };
                Ok(Expr::Like {
                    left: Box::new(left),
                    pattern: Box::new(pattern),
                    negated: false,
                })
            }
            "in" => {
                let mut operands = self.operands(element)?.into_iter();
                let left = operands
                    .next()
                    .ok_or_else(|| QueryError::unsupported("<in> without operands"))?;
                let list = bind_all(&left, operands.collect());
                Ok(Expr::In {
                    left: Box::new(left),
                    list,
                    negated: false,
                    table: None,
                })
            }
            "between" => {
                let operands = self.operands(element)?;
                let [left, min, max]: [Expr; 3] = operands
                    .try_into()
                    .map_err(|_| QueryError::unsupported("<between> needs three operands"))?;
                let mut bounds = bind_all(&left, vec![min, max]).into_iter();
                let (Some(min), Some(max)) = (bounds.next(), bounds.next()) else {
                    return Err(QueryError::unsupported("<between> needs three operands"));
                };
                Ok(Expr::Between {
                    left: Box::new(left),
                    min: Box::new(min),
                    max: Box::new(max),
                    negated: false,
                    table: None,
                })
            }
            other => match ComparisonOp::from_name(other) {
                Some(op) => self.comparison(op, element),
                None => {
                    tracing::debug!("Rejected condition element <{}>", other);
                    Err(QueryError::unsupported(format!("condition element <{}>", other)))
                }
            },
        }
    }

    fn binary_operands(&self, element: &Element) -> QueryResult<[Expr; 2]> {
        let operands = self.operands(element)?;
        let [left, right]: [Expr; 2] = operands.try_into().map_err(|_| {
            QueryError::unsupported(format!("<{}> needs two operands", element.name))
        })?;
        let mut bound = bind_all(&left, vec![right]);
        let right = bound.pop().unwrap_or(Expr::List(Vec::new()));
        let left = match (left, &right) {
            (Expr::Object(o), Expr::Property(p)) => {
                Expr::Object(ObjectLiteral::for_property(o.value, p.clone()))
            }
            (left, _) => left,
        };
        Ok([left, right])
    }

    fn comparison(&self, op: ComparisonOp, element: &Element) -> QueryResult<Expr> {
        let null_side = element.children.iter().position(|c| c.name == "null");
        if let Some(index) = null_side {
            let other = element
                .children
                .iter()
                .enumerate()
                .find(|(i, _)| *i != index)
                .map(|(_, c)| c)
                .ok_or_else(|| QueryError::unsupported("comparison of null with null"))?;
            let operand = match op {
                ComparisonOp::Eq => IsOperand::Null,
                ComparisonOp::Ne => IsOperand::NotNull,
                _ => return Err(QueryError::unsupported(format!("'{}' with null", op))),
            };
            return Ok(Expr::Is {
                left: Box::new(self.operand(other)?),
                operand,
            });
        }
        let [left, right] = self.binary_operands(element)?;
        Ok(Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn operand(&self, element: &Element) -> QueryResult<Expr> {
        match element.name.as_str() {
            "property" => {
                let name = element
                    .attr("name")
                    .ok_or_else(|| QueryError::unsupported("<property> without a name"))?;
                let table = match element.attr("query_items_xpath") {
                    None | Some("") => self.table,
                    Some(PARENT_XPATH) => self.parent.ok_or_else(|| {
                        QueryError::ambiguous("parent::Item outside of a query reference")
                    })?,
                    Some(other) => {
                        return Err(QueryError::unsupported(format!(
                            "query_items_xpath '{}'",
                            other
                        )));
                    }
                };
                Ok(Expr::Property(PropertyRef::new(table, name)))
            }
            "constant" => Ok(Expr::Object(ObjectLiteral::new(element.text.clone()))),
            "parameter" => {
                let name = element
                    .attr("name")
                    .ok_or_else(|| QueryError::unsupported("<parameter> without a name"))?;
                Ok(Expr::Parameter(Parameter::named(name)))
            }
            _ => self.expr(element),
        }
    }
}

/// Bind constants to the property on the left, for later coercion.
fn bind_all(left: &Expr, values: Vec<Expr>) -> Vec<Expr> {
    let Some(property) = left.as_property() else {
        return values;
    };
    values
        .into_iter()
        .map(|v| match v {
            Expr::Object(o) if o.property.is_none() => {
                Expr::Object(ObjectLiteral::for_property(o.value, property.clone()))
            }
            other => other,
        })
        .collect()
}
