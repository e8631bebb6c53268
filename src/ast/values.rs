//! Literal payloads that carry more than a plain scalar.

use std::fmt;

use super::{Expr, PropertyRef};

/// Name of a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamName {
    Named(String),
    /// Zero-based position.
    Positional(usize),
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamName::Named(name) => write!(f, "{}", name),
            ParamName::Positional(index) => write!(f, "{}", index),
        }
    }
}

/// Parameter placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: ParamName,
    pub default: Option<Box<Expr>>,
    /// The bound value is inserted verbatim, without quoting or conversion.
    pub raw: bool,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: ParamName::Named(name.into()),
            default: None,
            raw: false,
        }
    }

    pub fn positional(index: usize) -> Self {
        Self {
            name: ParamName::Positional(index),
            default: None,
            raw: false,
        }
    }

    pub fn with_default(mut self, value: Expr) -> Self {
        self.default = Some(Box::new(value));
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

/// Untyped value whose conversion waits until the data type of the target
/// property is known.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLiteral {
    pub value: String,
    pub property: Option<PropertyRef>,
}

impl ObjectLiteral {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            property: None,
        }
    }

    pub fn for_property(value: impl Into<String>, property: PropertyRef) -> Self {
        Self {
            value: value.into(),
            property: Some(property),
        }
    }
}

/// Right-hand side of IS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsOperand {
    Null,
    NotNull,
    /// The property exists on the item type (AML only).
    Defined,
    NotDefined,
}

impl IsOperand {
    pub fn negate(self) -> Self {
        match self {
            IsOperand::Null => IsOperand::NotNull,
            IsOperand::NotNull => IsOperand::Null,
            IsOperand::Defined => IsOperand::NotDefined,
            IsOperand::NotDefined => IsOperand::Defined,
        }
    }

    /// AML `condition` attribute value.
    pub fn condition(self) -> &'static str {
        match self {
            IsOperand::Null => "is null",
            IsOperand::NotNull => "is not null",
            IsOperand::Defined => "is defined",
            IsOperand::NotDefined => "is not defined",
        }
    }
}

impl fmt::Display for IsOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition())
    }
}
