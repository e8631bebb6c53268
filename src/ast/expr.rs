//! The expression sum type.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;

use chrono::NaiveDateTime;

use super::{
    ArithmeticOp, ComparisonOp, Function, IsOperand, LogicalOp, ObjectLiteral, Parameter,
    Precedence, TableId,
};
use crate::pattern::PatternList;

/// Reference to a property of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyRef {
    pub name: String,
    pub table: TableId,
}

impl PropertyRef {
    pub fn new(table: TableId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

/// A node of the query expression tree.
///
/// Every renderer matches exhaustively over this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    Object(ObjectLiteral),
    Parameter(Parameter),

    // Operands
    Property(PropertyRef),
    /// `*`; `extended` also covers dynamic properties.
    AllProperties {
        table: TableId,
        extended: bool,
    },
    List(Vec<Expr>),
    Pattern(PatternList),

    // Operators
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Like {
        left: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Between {
        left: Box<Expr>,
        min: Box<Expr>,
        max: Box<Expr>,
        negated: bool,
        /// Table all operands reference, recorded by normalization.
        table: Option<TableId>,
    },
    In {
        left: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
        table: Option<TableId>,
    },
    Is {
        left: Box<Expr>,
        operand: IsOperand,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn precedence(&self) -> Precedence {
        match self {
            Expr::Logical { op, .. } => op.precedence(),
            Expr::Not(_) => Precedence::Not,
            Expr::Comparison { .. }
            | Expr::Like { .. }
            | Expr::Between { .. }
            | Expr::In { .. }
            | Expr::Is { .. } => Precedence::Comparison,
            Expr::Arithmetic { op, .. } => op.precedence(),
            Expr::Negate(_) => Precedence::Negation,
            _ => Precedence::Parentheses,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Bool(_)
                | Expr::Integer(_)
                | Expr::Float(_)
                | Expr::String(_)
                | Expr::DateTime(_)
                | Expr::Object(_)
        )
    }

    /// Whether the node yields a boolean.
    pub fn is_predicate(&self) -> bool {
        match self {
            Expr::Bool(_)
            | Expr::Comparison { .. }
            | Expr::Like { .. }
            | Expr::Between { .. }
            | Expr::In { .. }
            | Expr::Is { .. }
            | Expr::Not(_)
            | Expr::Logical { .. } => true,
            Expr::Function { func, .. } => func.is_predicate(),
            _ => false,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyRef> {
        match self {
            Expr::Property(p) => Some(p),
            _ => None,
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Bool(_)
            | Expr::Integer(_)
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::DateTime(_)
            | Expr::Object(_)
            | Expr::Property(_)
            | Expr::AllProperties { .. }
            | Expr::Pattern(_) => Vec::new(),
            Expr::Parameter(p) => p.default.iter().map(|d| d.as_ref()).collect(),
            Expr::List(items) => items.iter().collect(),
            Expr::Comparison { left, right, .. }
            | Expr::Arithmetic { left, right, .. }
            | Expr::Logical { left, right, .. } => vec![&**left, &**right],
            Expr::Like { left, pattern, .. } => vec![&**left, &**pattern],
            Expr::Between { left, min, max, .. } => vec![&**left, &**min, &**max],
            Expr::In { left, list, .. } => {
                let mut out = vec![left.as_ref()];
                out.extend(list.iter());
                out
            }
            Expr::Is { left, .. } => vec![&**left],
            Expr::Negate(inner) | Expr::Not(inner) => vec![&**inner],
            Expr::Function { args, .. } => args.iter().collect(),
        }
    }

    /// Rebuild the node with every direct child replaced by `f(child)`.
    pub fn try_map_children<E, F>(self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(Expr) -> Result<Expr, E>,
    {
        let map_box = |e: Box<Expr>, f: &mut F| -> Result<Box<Expr>, E> { Ok(Box::new(f(*e)?)) };
        Ok(match self {
            Expr::Parameter(mut p) => {
                if let Some(d) = p.default.take() {
                    p.default = Some(map_box(d, f)?);
                }
                Expr::Parameter(p)
            }
            Expr::List(items) => {
                Expr::List(items.into_iter().map(&mut *f).collect::<Result<_, E>>()?)
            }
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op,
                left: map_box(left, f)?,
                right: map_box(right, f)?,
            },
            Expr::Arithmetic { op, left, right } => Expr::Arithmetic {
                op,
                left: map_box(left, f)?,
                right: map_box(right, f)?,
            },
            Expr::Logical { op, left, right } => Expr::Logical {
                op,
                left: map_box(left, f)?,
                right: map_box(right, f)?,
            },
            Expr::Like {
                left,
                pattern,
                negated,
            } => Expr::Like {
                left: map_box(left, f)?,
                pattern: map_box(pattern, f)?,
                negated,
            },
            Expr::Between {
                left,
                min,
                max,
                negated,
                table,
            } => Expr::Between {
                left: map_box(left, f)?,
                min: map_box(min, f)?,
                max: map_box(max, f)?,
                negated,
                table,
            },
            Expr::In {
                left,
                list,
                negated,
                table,
            } => Expr::In {
                left: map_box(left, f)?,
                list: list.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
                negated,
                table,
            },
            Expr::Is { left, operand } => Expr::Is {
                left: map_box(left, f)?,
                operand,
            },
            Expr::Negate(inner) => Expr::Negate(map_box(inner, f)?),
            Expr::Not(inner) => Expr::Not(map_box(inner, f)?),
            Expr::Function { func, args } => Expr::Function {
                func,
                args: args.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
            },
            leaf => leaf,
        })
    }

    /// Call `f` for every property reference in the tree.
    pub fn visit_properties<'a>(&'a self, f: &mut impl FnMut(&'a PropertyRef)) {
        match self {
            Expr::Property(p) => f(p),
            Expr::Object(ObjectLiteral {
                property: Some(p), ..
            }) => f(p),
            _ => {}
        }
        for child in self.children() {
            child.visit_properties(f);
        }
    }

    /// Tables referenced by properties and `*` anywhere in the tree.
    pub fn tables(&self) -> BTreeSet<TableId> {
        let mut out = BTreeSet::new();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables(&self, out: &mut BTreeSet<TableId>) {
        match self {
            Expr::Property(p) => {
                out.insert(p.table);
            }
            Expr::AllProperties { table, .. } => {
                out.insert(*table);
            }
            _ => {}
        }
        for child in self.children() {
            child.collect_tables(out);
        }
    }

    /// Replace every table handle in the tree.
    pub fn map_tables(self, f: &impl Fn(TableId) -> TableId) -> Expr {
        let remapped = match self {
            Expr::Property(p) => {
                return Expr::Property(PropertyRef::new(f(p.table), p.name));
            }
            Expr::AllProperties { table, extended } => {
                return Expr::AllProperties {
                    table: f(table),
                    extended,
                };
            }
            Expr::Object(mut o) => {
                o.property = o.property.map(|p| PropertyRef::new(f(p.table), p.name));
                return Expr::Object(o);
            }
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
                negated,
                table: table.map(f),
            },
            Expr::In {
                left,
                list,
                negated,
                table,
            } => Expr::In {
                left,
                list,
                negated,
                table: table.map(f),
            },
            other => other,
        };
        let mut remap = |e: Expr| -> Result<Expr, Infallible> { Ok(e.map_tables(f)) };
        match remapped.try_map_children(&mut remap) {
            Ok(e) => e,
            Err(never) => match never {},
        }
    }

    /// AND of all expressions, `None` when empty.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        Self::fold_logical(LogicalOp::And, exprs)
    }

    /// OR of all expressions, `None` when empty.
    pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        Self::fold_logical(LogicalOp::Or, exprs)
    }

    fn fold_logical(op: LogicalOp, exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(|left, right| Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Operands of a chain of the same logical operator, left to right.
    pub fn flatten(&self, op: LogicalOp) -> Vec<&Expr> {
        match self {
            Expr::Logical {
                op: inner,
                left,
                right,
            } if *inner == op => {
                let mut out = left.flatten(op);
                out.extend(right.flatten(op));
                out
            }
            other => vec![other],
        }
    }

    /// Owned variant of [`Expr::flatten`].
    pub fn into_flattened(self, op: LogicalOp) -> Vec<Expr> {
        match self {
            Expr::Logical {
                op: inner,
                left,
                right,
            } if inner == op => {
                let mut out = left.into_flattened(op);
                out.extend(right.into_flattened(op));
                out
            }
            other => vec![other],
        }
    }
}

/// Whether `child` needs parentheses under an operator of precedence
/// `parent`. Equal precedence on the right of a non-associative operator
/// needs them too.
pub fn needs_parens(parent: Precedence, child: &Expr, right_side: bool, associative: bool) -> bool {
    let own = child.precedence();
    own < parent || (right_side && own == parent && !associative)
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    parent: Precedence,
    child: &Expr,
    right_side: bool,
    associative: bool,
) -> fmt::Result {
    if needs_parens(parent, child, right_side, associative) {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    write!(f, "(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.precedence();
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Float(n) => write!(f, "{:?}", n),
            Expr::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::DateTime(dt) => write!(f, "'{}'", dt.format("%Y-%m-%dT%H:%M:%S")),
            Expr::Object(o) => write!(f, "'{}'", o.value.replace('\'', "''")),
            Expr::Parameter(p) => write!(f, "@{}", p.name),
            Expr::Property(p) => write!(f, "{}.{}", p.table, p.name),
            Expr::AllProperties { table, .. } => write!(f, "{}.*", table),
            Expr::List(items) => write_list(f, items),
            Expr::Pattern(p) => write!(f, "{}", p),
            Expr::Comparison { op, left, right } => {
                write_operand(f, prec, left, false, false)?;
                write!(f, " {} ", op)?;
                write_operand(f, prec, right, true, false)
            }
            Expr::Like {
                left,
                pattern,
                negated,
            } => {
                write_operand(f, prec, left, false, false)?;
                write!(f, " {} ", if *negated { "not like" } else { "like" })?;
                write_operand(f, prec, pattern, true, false)
            }
            Expr::Between {
                left,
                min,
                max,
                negated,
                ..
            } => {
                write_operand(f, prec, left, false, false)?;
                write!(f, " {} ", if *negated { "not between" } else { "between" })?;
                write_operand(f, Precedence::SubComparison, min, false, false)?;
                write!(f, " and ")?;
                write_operand(f, Precedence::SubComparison, max, true, false)
            }
            Expr::In {
                left,
                list,
                negated,
                ..
            } => {
                write_operand(f, prec, left, false, false)?;
                write!(f, " {} ", if *negated { "not in" } else { "in" })?;
                write_list(f, list)
            }
            Expr::Is { left, operand } => {
                write_operand(f, prec, left, false, false)?;
                write!(f, " {}", operand)
            }
            Expr::Arithmetic { op, left, right } => {
                write_operand(f, prec, left, false, op.is_associative())?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, prec, right, true, op.is_associative())
            }
            Expr::Negate(inner) => {
                write!(f, "-")?;
                write_operand(f, prec, inner, true, false)
            }
            Expr::Not(inner) => {
                write!(f, "not ")?;
                write_operand(f, prec, inner, true, true)
            }
            Expr::Logical { op, left, right } => {
                write_operand(f, prec, left, false, true)?;
                write!(f, " {} ", op.keyword())?;
                write_operand(f, prec, right, true, true)
            }
            Expr::Function { func, args } => {
                write!(f, "{}", func)?;
                write_list(f, args)
            }
        }
    }
}
