//! Ergonomic constructors for expressions.
//!
//! # Example
//! ```
//! use aml_query::ast::builders::*;
//! use aml_query::ast::Query;
//!
//! let query = Query::new("Part");
//! let part = query.root();
//! let filter = eq(prop(part, "state"), text("Released")).and(gt(prop(part, "cost"), int(10)));
//! assert_eq!(filter.to_string(), "t0.state = 'Released' and t0.cost > 10");
//! ```

use chrono::NaiveDateTime;

use super::{
    ArithmeticOp, ComparisonOp, Expr, Function, IsOperand, LogicalOp, Parameter, PropertyRef,
    TableId,
};
use crate::pattern::PatternList;

/// Property reference
pub fn prop(table: TableId, name: impl Into<String>) -> Expr {
    Expr::Property(PropertyRef::new(table, name))
}

/// String literal
pub fn text(value: impl Into<String>) -> Expr {
    Expr::String(value.into())
}

/// Integer literal
pub fn int(value: i64) -> Expr {
    Expr::Integer(value)
}

/// Float literal
pub fn float(value: f64) -> Expr {
    Expr::Float(value)
}

/// Boolean literal
pub fn boolean(value: bool) -> Expr {
    Expr::Bool(value)
}

pub fn datetime(value: NaiveDateTime) -> Expr {
    Expr::DateTime(value)
}

/// Named parameter `@name`
pub fn param(name: impl Into<String>) -> Expr {
    Expr::Parameter(Parameter::named(name))
}

/// Function call
pub fn call(func: Function, args: Vec<Expr>) -> Expr {
    Expr::Function { func, args }
}

fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
    Expr::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `left = right`
pub fn eq(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Eq, left, right)
}

/// `left <> right`
pub fn ne(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Ne, left, right)
}

/// `left > right`
pub fn gt(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Gt, left, right)
}

/// `left >= right`
pub fn ge(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Ge, left, right)
}

/// `left < right`
pub fn lt(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Lt, left, right)
}

/// `left <= right`
pub fn le(left: Expr, right: Expr) -> Expr {
    compare(ComparisonOp::Le, left, right)
}

/// `left like pattern`
pub fn like(left: Expr, pattern: PatternList) -> Expr {
    Expr::Like {
        left: Box::new(left),
        pattern: Box::new(Expr::Pattern(pattern)),
        negated: false,
    }
}

/// `left between min and max`
pub fn between(left: Expr, min: Expr, max: Expr) -> Expr {
    Expr::Between {
        left: Box::new(left),
        min: Box::new(min),
        max: Box::new(max),
        negated: false,
        table: None,
    }
}

/// `left in (values)`
pub fn in_list(left: Expr, values: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::In {
        left: Box::new(left),
        list: values.into_iter().collect(),
        negated: false,
        table: None,
    }
}

/// `left is null`
pub fn is_null(left: Expr) -> Expr {
    Expr::Is {
        left: Box::new(left),
        operand: IsOperand::Null,
    }
}

/// `left is not null`
pub fn is_not_null(left: Expr) -> Expr {
    Expr::Is {
        left: Box::new(left),
        operand: IsOperand::NotNull,
    }
}

pub fn arith(op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
    Expr::Arithmetic {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `not expr`
pub fn not(expr: Expr) -> Expr {
    Expr::Not(Box::new(expr))
}

/// `left and right`
pub fn and(left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op: LogicalOp::And,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `left or right`
pub fn or(left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op: LogicalOp::Or,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Expr {
    pub fn and(self, other: Expr) -> Expr {
        and(self, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        or(self, other)
    }
}
