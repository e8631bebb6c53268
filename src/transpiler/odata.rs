//! OData filter and query-string generation.

use chrono::{NaiveDateTime, TimeZone};

use super::coerce::{coerce_object, infer_value};
use crate::ast::{
    ArithmeticOp, Expr, Function, IsOperand, LogicalOp, ParamName, Precedence, Query,
    SortDirection, TableId, needs_parens,
};
use crate::config::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::pattern::LikeShape;

/// `$filter` text of the root table, `None` when unfiltered.
pub fn to_odata_filter(ctx: &QueryContext<'_>, query: &Query) -> QueryResult<Option<String>> {
    let renderer = ODataRenderer {
        ctx,
        query,
        scopes: vec![(query.root(), String::new())],
    };
    renderer.table_filter(query.root())
}

/// Resource path and query options, e.g.
/// `Part?$select=id,name&$filter=state eq 'Released'&$top=10`.
pub fn to_odata_query(ctx: &QueryContext<'_>, query: &Query) -> QueryResult<String> {
    let root = query.root();
    let item = &query[root];
    let entity = ctx
        .table_type_name(query, root)
        .ok_or_else(|| QueryError::unsupported("root item type is unknown"))?;
    let renderer = ODataRenderer {
        ctx,
        query,
        scopes: vec![(root, String::new())],
    };

    let mut options = Vec::new();
    let select = renderer.select(root)?;
    if !select.is_empty() {
        options.push(format!("$select={}", select));
    }
    if let Some(filter) = renderer.table_filter(root)? {
        options.push(format!("$filter={}", filter));
    }
    let order = renderer.order_by(root)?;
    if !order.is_empty() {
        options.push(format!("$orderby={}", order.join(",")));
    }
    if let Some(top) = item.fetch {
        options.push(format!("$top={}", top));
    }
    if let Some(skip) = item.offset {
        options.push(format!("$skip={}", skip));
    }
    let expand = renderer.expand(root)?;
    if !expand.is_empty() {
        options.push(format!("$expand={}", expand));
    }

    tracing::debug!("Rendered OData query with {} option(s)", options.len());
    if options.is_empty() {
        Ok(entity)
    } else {
        Ok(format!("{}?{}", entity, options.join("&")))
    }
}

struct ODataRenderer<'a> {
    ctx: &'a QueryContext<'a>,
    query: &'a Query,
    /// Tables that start a property path, innermost last, with the lambda
    /// variable naming them (empty for the root).
    scopes: Vec<(TableId, String)>,
}

impl ODataRenderer<'_> {
    fn path(&self, table: TableId) -> QueryResult<Option<String>> {
        if let Some((_, var)) = self.scopes.iter().rev().find(|(t, _)| *t == table) {
            return Ok((!var.is_empty()).then(|| var.clone()));
        }
        let join = self
            .query
            .parent_join(table)
            .filter(|j| j.is_foreign_key())
            .ok_or_else(|| {
                QueryError::ambiguous(format!("table {} is not reachable from the filter", table))
            })?;
        Ok(Some(match self.path(join.left)? {
            Some(prefix) => format!("{}/{}", prefix, join.left_property),
            None => join.left_property.clone(),
        }))
    }

    fn property(&self, table: TableId, name: &str) -> QueryResult<String> {
        Ok(match self.path(table)? {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        })
    }

    /// Criteria of `table` and its foreign-key tree, plus `any` lambdas for
    /// its relationships.
    fn table_filter(&self, table: TableId) -> QueryResult<Option<String>> {
        let mut terms = Vec::new();
        let mut pending = vec![table];
        while let Some(t) = pending.pop() {
            let item = &self.query[t];
            if let Some(id) = &item.id {
                terms.push(format!("{} eq {}", self.property(t, "id")?, quote(id)));
            }
            if !item.id_list.is_empty() {
                let id = self.property(t, "id")?;
                let alternatives: Vec<String> = item
                    .id_list
                    .iter()
                    .map(|v| format!("{} eq {}", id, quote(v)))
                    .collect();
                terms.push(group(alternatives, " or "));
            }
            if let Some(filter) = &item.filter {
                terms.push(self.operand(Precedence::And, filter, false)?);
            }
            for join in item.joins.iter().rev() {
                if join.is_foreign_key() {
                    pending.push(join.right);
                } else {
                    terms.push(self.any(join.right)?);
                }
            }
        }
        Ok((!terms.is_empty()).then(|| terms.join(" and ")))
    }

    fn any(&self, table: TableId) -> QueryResult<String> {
        let navigation = self
            .ctx
            .table_type_name(self.query, table)
            .ok_or_else(|| QueryError::unsupported("relationship item type is unknown"))?
            .replace(' ', "_");
        let parent = self
            .query
            .parent_join(table)
            .map(|j| j.left)
            .ok_or_else(|| QueryError::ambiguous("relationship without a source"))?;
        let depth = self.scopes.len();
        let var = if depth == 1 {
            "r".to_string()
        } else {
            format!("r{}", depth)
        };
        let source = match self.path(parent)? {
            Some(prefix) => format!("{}/{}", prefix, navigation),
            None => navigation,
        };
        let mut scopes = self.scopes.clone();
        scopes.push((table, var.clone()));
        let inner = ODataRenderer {
            ctx: self.ctx,
            query: self.query,
            scopes,
        };
        Ok(match inner.table_filter(table)? {
            Some(condition) => format!("{}/any({}:{})", source, var, condition),
            None => format!("{}/any()", source),
        })
    }

    fn select(&self, table: TableId) -> QueryResult<String> {
        let mut names = Vec::new();
        for select in &self.query[table].select {
            match &select.expr {
                Expr::Property(p) if p.table == table => names.push(p.name.clone()),
                Expr::AllProperties { .. } => return Ok(String::new()),
                Expr::Property(_) => {}
                other => {
                    return Err(QueryError::unsupported(format!(
                        "OData cannot select '{}'",
                        other
                    )));
                }
            }
        }
        Ok(names.join(","))
    }

    fn expand(&self, table: TableId) -> QueryResult<String> {
        let mut out = Vec::new();
        for join in self.query[table].joins.iter().filter(|j| j.is_foreign_key()) {
            let mut options = Vec::new();
            let select = self.select(join.right)?;
            if !select.is_empty() {
                options.push(format!("$select={}", select));
            }
            let nested = self.expand(join.right)?;
            if !nested.is_empty() {
                options.push(format!("$expand={}", nested));
            }
            if options.is_empty() {
                out.push(join.left_property.clone());
            } else {
                out.push(format!("{}({})", join.left_property, options.join(";")));
            }
        }
        Ok(out.join(","))
    }

    fn order_by(&self, table: TableId) -> QueryResult<Vec<String>> {
        let mut out = Vec::new();
        for order in &self.query[table].order_by {
            let mut text = self.value(&order.expr)?;
            if order.direction == SortDirection::Descending {
                text.push_str(" desc");
            }
            out.push(text);
        }
        for join in self.query[table].joins.iter().filter(|j| j.is_foreign_key()) {
            out.extend(self.order_by(join.right)?);
        }
        Ok(out)
    }

    fn operand(&self, parent: Precedence, child: &Expr, right_side: bool) -> QueryResult<String> {
        let text = self.value(child)?;
        Ok(if needs_parens(parent, child, right_side, false) {
            format!("({})", text)
        } else {
            text
        })
    }

    fn datetime(&self, value: &NaiveDateTime) -> String {
        let utc = self
            .ctx
            .settings
            .time_zone()
            .from_local_datetime(value)
            .single()
            .map(|dt| dt.naive_utc())
            .unwrap_or(*value);
        utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    fn value(&self, expr: &Expr) -> QueryResult<String> {
        let prec = expr.precedence();
        match expr {
            Expr::Bool(b) => Ok(b.to_string()),
            Expr::Integer(n) => Ok(n.to_string()),
            Expr::Float(n) => Ok(format!("{:?}", n)),
            Expr::String(s) => Ok(quote(s)),
            Expr::DateTime(dt) => Ok(self.datetime(dt)),
            Expr::Object(object) => self.value(&coerce_object(self.ctx, self.query, object)),
            Expr::Parameter(p) => {
                let bound = match &p.name {
                    ParamName::Named(name) => self.ctx.settings.parameters.get(name),
                    ParamName::Positional(_) => None,
                };
                match (bound, &p.default) {
                    (Some(value), _) if p.raw => Ok(value.clone()),
                    (Some(value), _) => self.value(&infer_value(value)),
                    (None, Some(default)) => self.value(default),
                    (None, None) => Ok(format!("@{}", p.name)),
                }
            }
            Expr::Property(p) => self.property(p.table, &p.name),
            Expr::AllProperties { .. } => {
                Err(QueryError::unsupported("'*' inside an OData expression"))
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|i| self.value(i))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(format!("({})", items.join(",")))
            }
            Expr::Pattern(p) => Err(QueryError::unsupported(format!(
                "pattern {} outside of like",
                p
            ))),
            Expr::Comparison { op, left, right } => Ok(format!(
                "{} {} {}",
                self.operand(prec, left, false)?,
                op.name(),
                self.operand(prec, right, true)?
            )),
            Expr::Like {
                left,
                pattern,
                negated,
            } => {
                let Expr::Pattern(pattern) = pattern.as_ref() else {
                    return Err(QueryError::unsupported("OData like needs a literal pattern"));
                };
                let (shape, text) = pattern.decompose().ok_or_else(|| {
                    QueryError::unsupported(format!("pattern {} has no OData equivalent", pattern))
                })?;
                let subject = self.value(left)?;
                let test = match shape {
                    LikeShape::Equals => format!("{} eq {}", subject, quote(&text)),
                    LikeShape::StartsWith => format!("startswith({},{})", subject, quote(&text)),
                    LikeShape::EndsWith => format!("endswith({},{})", subject, quote(&text)),
                    LikeShape::Contains => format!("contains({},{})", subject, quote(&text)),
                };
                Ok(if *negated { format!("not ({})", test) } else { test })
            }
            Expr::Between {
                left,
                min,
                max,
                negated,
                ..
            } => {
                let subject = self.operand(Precedence::Comparison, left, false)?;
                let min = self.operand(Precedence::Comparison, min, true)?;
                let max = self.operand(Precedence::Comparison, max, true)?;
                Ok(if *negated {
                    format!("({} lt {} or {} gt {})", subject, min, subject, max)
                } else {
                    format!("({} ge {} and {} le {})", subject, min, subject, max)
                })
            }
            Expr::In {
                left,
                list,
                negated,
                ..
            } => {
                if list.is_empty() {
                    return Ok(negated.to_string());
                }
                let subject = self.operand(Precedence::Comparison, left, false)?;
                let (op, joiner) = if *negated { ("ne", " and ") } else { ("eq", " or ") };
                let terms = list
                    .iter()
                    .map(|item| {
                        Ok(format!(
                            "{} {} {}",
                            subject,
                            op,
                            self.operand(Precedence::Comparison, item, true)?
                        ))
                    })
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(group(terms, joiner))
            }
            Expr::Is { left, operand } => {
                let op = match operand {
                    IsOperand::Null | IsOperand::NotDefined => "eq",
                    IsOperand::NotNull | IsOperand::Defined => "ne",
                };
                Ok(format!("{} {} null", self.operand(prec, left, false)?, op))
            }
            Expr::Arithmetic { op, left, right } => {
                let keyword = match op {
                    ArithmeticOp::Add => "add",
                    ArithmeticOp::Sub => "sub",
                    ArithmeticOp::Mul => "mul",
                    ArithmeticOp::Div => "div",
                    ArithmeticOp::Mod => "mod",
                    ArithmeticOp::Concat => {
                        return Ok(format!(
                            "concat({},{})",
                            self.value(left)?,
                            self.value(right)?
                        ));
                    }
                };
                Ok(format!(
                    "{} {} {}",
                    self.operand(prec, left, false)?,
                    keyword,
                    self.operand(prec, right, true)?
                ))
            }
            Expr::Negate(inner) => Ok(format!("-{}", self.operand(prec, inner, true)?)),
            Expr::Not(inner) => {
                let text = self.value(inner)?;
                Ok(if inner.precedence() == Precedence::Parentheses {
                    format!("not {}", text)
                } else {
                    format!("not ({})", text)
                })
            }
            Expr::Logical { op, left, right } => {
                let keyword = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                Ok(format!(
                    "{} {} {}",
                    self.operand(prec, left, false)?,
                    keyword,
                    self.operand(prec, right, true)?
                ))
            }
            Expr::Function { func, args } => self.function(func, args),
        }
    }

    fn function(&self, func: &Function, args: &[Expr]) -> QueryResult<String> {
        let name = match func {
            Function::CurrentDateTime | Function::CurrentUtcDateTime => "now",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::Contains => "contains",
            Function::IndexOf => "indexof",
            Function::Length => "length",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Substring => "substring",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::AddDays
            | Function::AddHours
            | Function::AddMinutes
            | Function::DiffDays
            | Function::Other(_) => {
                return Err(QueryError::unsupported(format!(
                    "function {} has no OData equivalent",
                    func
                )));
            }
        };
        let args = args
            .iter()
            .map(|a| self.value(a))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(format!("{}({})", name, args.join(",")))
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn group(terms: Vec<String>, joiner: &str) -> String {
    if terms.len() == 1 {
        terms.join(joiner)
    } else {
        format!("({})", terms.join(joiner))
    }
}
