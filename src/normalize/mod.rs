//! Canonical form of criteria.
//!
//! Rules are applied bottom-up, one node at a time, after the node's
//! children are already normalized. The result is a fixed point:
//! normalizing twice gives the same tree.

use std::cmp::Ordering;

use crate::ast::{ArithmeticOp, ComparisonOp, Expr, Function, LogicalOp, Query, TableId};
use crate::error::{QueryError, QueryResult};

#[cfg(test)]
mod tests;

impl Expr {
    /// Normalize a criterion. A bare property at the top is read as a
    /// boolean flag.
    ///
    /// ```
    /// use aml_query::ast::{builders::*, Query};
    ///
    /// let t = Query::new("Part").root();
    /// let expr = not(eq(prop(t, "state"), text("Released"))).normalize().unwrap();
    /// assert_eq!(expr.to_string(), "t0.state <> 'Released'");
    /// ```
    pub fn normalize(self) -> QueryResult<Expr> {
        Ok(as_condition(normalize_tree(self)?))
    }
}

impl Query {
    /// Normalize the filter of every table.
    pub fn normalize(&mut self) -> QueryResult<()> {
        let ids: Vec<TableId> = self.tables().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(filter) = self[id].filter.take() {
                self[id].filter = Some(filter.normalize()?);
            }
        }
        Ok(())
    }
}

fn normalize_tree(expr: Expr) -> QueryResult<Expr> {
    let expr = expr.try_map_children(&mut normalize_tree)?;
    rewrite(expr)
}

fn rewrite(expr: Expr) -> QueryResult<Expr> {
    Ok(match expr {
        Expr::Arithmetic { op, left, right } => fold_arithmetic(op, *left, *right),
        Expr::Negate(inner) => match *inner {
            Expr::Integer(n) => match n.checked_neg() {
                Some(v) => Expr::Integer(v),
                None => Expr::Negate(Box::new(Expr::Integer(n))),
            },
            Expr::Float(f) => Expr::Float(-f),
            Expr::Negate(twice) => *twice,
            other => Expr::Negate(Box::new(other)),
        },
        Expr::Comparison { op, left, right } => comparison(op, *left, *right),
        Expr::Like {
            left,
            pattern,
            negated,
        } => match *pattern {
            Expr::Pattern(p) => {
                let p = p.simplify();
                match p.literal() {
                    Some(text) => Expr::Comparison {
                        op: if negated {
                            ComparisonOp::Ne
                        } else {
                            ComparisonOp::Eq
                        },
                        left,
                        right: Box::new(Expr::String(text)),
                    },
                    None => Expr::Like {
                        left,
                        pattern: Box::new(Expr::Pattern(p)),
                        negated,
                    },
                }
            }
            other => Expr::Like {
                left,
                pattern: Box::new(other),
                negated,
            },
        },
        Expr::Between {
            left,
            min,
            max,
            negated,
            ..
        } => {
            let table = single_table([&*left, &*min, &*max], "between")?;
            Expr::Between {
                left,
                min,
                max,
                negated,
                table,
            }
        }
        Expr::In {
            left,
            list,
            negated,
            ..
        } => {
            let table = single_table(std::iter::once(&*left).chain(list.iter()), "in")?;
            Expr::In {
                left,
                list,
                negated,
                table,
            }
        }
        Expr::Not(inner) => negate(as_condition(*inner)),
        Expr::Logical { op, left, right } => {
            logical(op, as_condition(*left), as_condition(*right))
        }
        other => other,
    })
}

/// A bare property where a boolean is expected means `property = true`.
fn as_condition(expr: Expr) -> Expr {
    match expr {
        Expr::Property(_) => Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(expr),
            right: Box::new(Expr::Bool(true)),
        },
        other => other,
    }
}

/// The single table referenced by `operands`.
fn single_table<'e>(
    operands: impl IntoIterator<Item = &'e Expr>,
    operator: &str,
) -> QueryResult<Option<TableId>> {
    let mut tables = operands.into_iter().flat_map(|e| e.tables());
    let first = tables.next();
    if let Some(other) = tables.find(|t| Some(*t) != first) {
        return Err(QueryError::ambiguous(format!(
            "'{}' refers to more than one table ({} and {})",
            operator,
            first.map(|t| t.to_string()).unwrap_or_default(),
            other
        )));
    }
    Ok(first)
}

/// Logical complement, pushed down to the leaves where an inverse exists.
pub(crate) fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Bool(b) => Expr::Bool(!b),
        Expr::Not(inner) => *inner,
        Expr::Comparison { op, left, right } => Expr::Comparison {
            op: op.negate(),
            left,
            right,
        },
        Expr::Like {
            left,
            pattern,
            negated,
        } => Expr::Like {
            left,
            pattern,
            negated: !negated,
        },
        Expr::Between {
            left,
            min,
            max,
            negated,
            table,
        } => Expr::Between {
            left,
            min,
            max,
            negated: !negated,
            table,
        },
        Expr::In {
            left,
            list,
            negated,
            table,
        } => Expr::In {
            left,
            list,
            negated: !negated,
            table,
        },
        Expr::Is { left, operand } => Expr::Is {
            left,
            operand: operand.negate(),
        },
        Expr::Logical { op, left, right } => Expr::Logical {
            op: op.other(),
            left: Box::new(negate(*left)),
            right: Box::new(negate(*right)),
        },
        other => Expr::Not(Box::new(as_condition(other))),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    match (op, left, right) {
        (LogicalOp::And, Expr::Bool(true), other) | (LogicalOp::And, other, Expr::Bool(true)) => {
            other
        }
        (LogicalOp::And, Expr::Bool(false), _) | (LogicalOp::And, _, Expr::Bool(false)) => {
            Expr::Bool(false)
        }
        (LogicalOp::Or, Expr::Bool(false), other) | (LogicalOp::Or, other, Expr::Bool(false)) => {
            other
        }
        (LogicalOp::Or, Expr::Bool(true), _) | (LogicalOp::Or, _, Expr::Bool(true)) => {
            Expr::Bool(true)
        }
        (op, left, right) => Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn fold_arithmetic(op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
    let folded = match (&left, &right) {
        (Expr::Integer(a), Expr::Integer(b)) => match op {
            ArithmeticOp::Add => a.checked_add(*b),
            ArithmeticOp::Sub => a.checked_sub(*b),
            ArithmeticOp::Mul => a.checked_mul(*b),
            ArithmeticOp::Div => a.checked_div(*b),
            ArithmeticOp::Mod => a.checked_rem(*b),
            ArithmeticOp::Concat => None,
        }
        .map(Expr::Integer),
        (Expr::String(a), Expr::String(b))
            if matches!(op, ArithmeticOp::Add | ArithmeticOp::Concat) =>
        {
            Some(Expr::String(format!("{}{}", a, b)))
        }
        _ => match (as_float(&left), as_float(&right)) {
            (Some(a), Some(b)) => match op {
                ArithmeticOp::Add => Some(a + b),
                ArithmeticOp::Sub => Some(a - b),
                ArithmeticOp::Mul => Some(a * b),
                ArithmeticOp::Div if b != 0.0 => Some(a / b),
                ArithmeticOp::Mod if b != 0.0 => Some(a % b),
                _ => None,
            }
            .map(Expr::Float),
            _ => None,
        },
    };
    folded.unwrap_or_else(|| Expr::Arithmetic {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn as_float(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Integer(n) => Some(*n as f64),
        Expr::Float(f) => Some(*f),
        _ => None,
    }
}

/// Ordering of two literals of the same kind.
fn compare_literals(left: &Expr, right: &Expr) -> Option<Ordering> {
    match (left, right) {
        (Expr::Integer(a), Expr::Integer(b)) => Some(a.cmp(b)),
        (Expr::Float(_) | Expr::Integer(_), Expr::Float(_) | Expr::Integer(_)) => {
            as_float(left)?.partial_cmp(&as_float(right)?)
        }
        (Expr::String(a), Expr::String(b)) => Some(a.cmp(b)),
        (Expr::Bool(a), Expr::Bool(b)) => Some(a.cmp(b)),
        (Expr::DateTime(a), Expr::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn holds(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
    }
}

fn comparison(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
    if let Some(ordering) = compare_literals(&left, &right) {
        return Expr::Bool(holds(op, ordering));
    }

    let swap = (matches!(right, Expr::Property(_)) && !matches!(left, Expr::Property(_)))
        || (left.is_literal() && matches!(right, Expr::Function { .. }));
    if swap {
        return comparison(op.flip(), right, left);
    }

    // x = true, x <> false
    if let Expr::Bool(flag) = &right {
        if left.is_predicate() && matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
            let keep = *flag == (op == ComparisonOp::Eq);
            return if keep { left } else { negate(left) };
        }
    }

    // indexOf(x, s) + k  op  c
    if let (
        Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: inner,
            right: offset,
        },
        Expr::Integer(c),
    ) = (&left, &right)
    {
        if let (Expr::Function { func: Function::IndexOf, .. }, Expr::Integer(k)) =
            (&**inner, &**offset)
        {
            if let Some(shifted) = c.checked_sub(*k) {
                return comparison(op, (**inner).clone(), Expr::Integer(shifted));
            }
        }
    }

    if let (
        Expr::Function {
            func: Function::IndexOf,
            args,
        },
        Expr::Integer(c),
    ) = (&left, &right)
    {
        if args.len() == 2 {
            let call = |func: Function| Expr::Function {
                func,
                args: args.clone(),
            };
            match (op, *c) {
                (ComparisonOp::Eq, 0) => return call(Function::StartsWith),
                (ComparisonOp::Eq, -1) => return Expr::Not(Box::new(call(Function::Contains))),
                (ComparisonOp::Ne, -1) | (ComparisonOp::Gt, -1) | (ComparisonOp::Ge, 0) => {
                    return call(Function::Contains);
                }
                _ => {}
            }
        }
    }

    Expr::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
