//! Query model: the expression tree plus the table/join graph.

pub mod arena;
pub mod builders;
pub mod expr;
pub mod functions;
pub mod operators;
pub mod query;
pub mod values;


pub use self::arena::{Arena, TableId};
pub use self::expr::{Expr, PropertyRef, needs_parens};
pub use self::functions::Function;
pub use self::operators::{
    ArithmeticOp, Cardinality, ComparisonOp, JoinType, LogicalOp, Precedence, SortDirection,
};
pub use self::query::{
    Join, OrderByExpression, ParameterDef, Query, QueryItem, SelectExpression,
};
pub use self::values::{IsOperand, ObjectLiteral, ParamName, Parameter};
