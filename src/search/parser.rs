//! Search-box text to criteria.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::multispace0,
    combinator::{opt, rest, value},
    sequence::{pair, separated_pair, terminated},
};
use serde::{Deserialize, Serialize};

use crate::ast::{ComparisonOp, Expr, IsOperand, PropertyRef, Query};
use crate::config::{QueryContext, SearchSettings};
use crate::error::{QueryError, QueryResult};
use crate::metadata::DataType;
use crate::pattern::{PatternList, WildcardSyntax};
use crate::transpiler::coerce::{is_date_only, parse_datetime};

/// Separator of the two ends of a range, as in `5...10`.
pub const RANGE_SEPARATOR: &str = "...";

/// Explicit condition chosen next to a search box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCondition {
    Equal,
    NotEqual,
    Like,
    NotLike,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl SearchCondition {
    pub fn name(self) -> &'static str {
        match self {
            SearchCondition::Equal => "equal",
            SearchCondition::NotEqual => "not_equal",
            SearchCondition::Like => "like",
            SearchCondition::NotLike => "not_like",
            SearchCondition::GreaterThan => "greater_than",
            SearchCondition::GreaterThanOrEqual => "greater_than_or_equal",
            SearchCondition::LessThan => "less_than",
            SearchCondition::LessThanOrEqual => "less_than_or_equal",
            SearchCondition::Between => "between",
            SearchCondition::In => "in",
            SearchCondition::NotIn => "not_in",
            SearchCondition::IsNull => "is_null",
            SearchCondition::IsNotNull => "is_not_null",
        }
    }

    fn comparison(self) -> Option<ComparisonOp> {
        match self {
            SearchCondition::Equal => Some(ComparisonOp::Eq),
            SearchCondition::NotEqual => Some(ComparisonOp::Ne),
            SearchCondition::GreaterThan => Some(ComparisonOp::Gt),
            SearchCondition::GreaterThanOrEqual => Some(ComparisonOp::Ge),
            SearchCondition::LessThan => Some(ComparisonOp::Lt),
            SearchCondition::LessThanOrEqual => Some(ComparisonOp::Le),
            _ => None,
        }
    }
}

impl fmt::Display for SearchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SearchCondition {
    type Err = QueryError;

    /// Accepts the snake-case names and the AML condition names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "_");
        Ok(match normalized.as_str() {
            "equal" | "eq" => SearchCondition::Equal,
            "not_equal" | "ne" => SearchCondition::NotEqual,
            "like" => SearchCondition::Like,
            "not_like" => SearchCondition::NotLike,
            "greater_than" | "gt" => SearchCondition::GreaterThan,
            "greater_than_or_equal" | "ge" => SearchCondition::GreaterThanOrEqual,
            "less_than" | "lt" => SearchCondition::LessThan,
            "less_than_or_equal" | "le" => SearchCondition::LessThanOrEqual,
            "between" => SearchCondition::Between,
            "in" => SearchCondition::In,
            "not_in" => SearchCondition::NotIn,
            "is_null" => SearchCondition::IsNull,
            "is_not_null" => SearchCondition::IsNotNull,
            _ => return Err(QueryError::unsupported(format!("search condition '{}'", s))),
        })
    }
}

/// Parse the search text of `property`, taking its data type from metadata
/// (text when unknown). Blank text yields `None`.
pub fn parse_simple_search(
    ctx: &QueryContext<'_>,
    query: &Query,
    property: &PropertyRef,
    condition: Option<SearchCondition>,
    text: &str,
) -> QueryResult<Option<Expr>> {
    let data_type = ctx.data_type(query, property).unwrap_or(DataType::String);
    let mut parser = SimpleSearchParser::new(&ctx.settings.search, data_type);
    if let Some(condition) = condition {
        parser = parser.with_condition(condition);
    }
    parser.parse(property, text)
}

/// Type-aware parser of one search-box string.
///
/// Alternatives are separated by any of the configured OR delimiters. Each
/// alternative is read by the grammar of the property's data type:
///
/// - booleans: `1 0 true false yes no on off`
/// - numbers and dates: an optional `> >= < <= = <> !=` prefix, or an
///   `a...b` range, when operators are allowed
/// - text: `*` or `%` wildcards make a LIKE, otherwise an equality
pub struct SimpleSearchParser<'a> {
    settings: &'a SearchSettings,
    data_type: DataType,
    condition: Option<SearchCondition>,
}

impl<'a> SimpleSearchParser<'a> {
    pub fn new(settings: &'a SearchSettings, data_type: DataType) -> Self {
        Self {
            settings,
            data_type,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: SearchCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn parse(&self, property: &PropertyRef, text: &str) -> QueryResult<Option<Expr>> {
        let subject = || Box::new(Expr::Property(property.clone()));
        match self.condition {
            Some(SearchCondition::IsNull) => {
                return Ok(Some(Expr::Is {
                    left: subject(),
                    operand: IsOperand::Null,
                }));
            }
            Some(SearchCondition::IsNotNull) => {
                return Ok(Some(Expr::Is {
                    left: subject(),
                    operand: IsOperand::NotNull,
                }));
            }
            _ => {}
        }

        let pieces = split_pieces(text, &self.settings.or_delimiters, self.settings.escape);
        if pieces.is_empty() {
            return Ok(None);
        }
        tracing::trace!(
            "Search text for '{}' has {} alternative(s) as {}",
            property.name,
            pieces.len(),
            self.data_type
        );

        if let Some(condition @ (SearchCondition::In | SearchCondition::NotIn)) = self.condition {
            let list = pieces
                .iter()
                .map(|p| self.literal(p))
                .collect::<QueryResult<Vec<_>>>()?;
            return Ok(Some(Expr::In {
                left: subject(),
                list,
                negated: condition == SearchCondition::NotIn,
                table: None,
            }));
        }

        let terms = pieces
            .iter()
            .map(|p| self.piece(property, p))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(combine(terms))
    }

    fn syntax(&self) -> WildcardSyntax {
        WildcardSyntax {
            escape: self.settings.escape,
            ..WildcardSyntax::SIMPLE_SEARCH
        }
    }

    fn piece(&self, property: &PropertyRef, text: &str) -> QueryResult<Expr> {
        let subject = Expr::Property(property.clone());
        match &self.data_type {
            DataType::Boolean => {
                let op = self.default_op()?;
                Ok(compare(op, subject, Expr::Bool(parse_bool(text)?)))
            }
            data_type if data_type.is_numeric() || *data_type == DataType::Date => {
                self.ordered(subject, text)
            }
            _ => self.textual(subject, text),
        }
    }

    fn default_op(&self) -> QueryResult<ComparisonOp> {
        match self.condition {
            None => Ok(ComparisonOp::Eq),
            Some(condition) => condition.comparison().ok_or_else(|| {
                QueryError::unsupported(format!(
                    "condition {} for {} values",
                    condition, self.data_type
                ))
            }),
        }
    }

    /// Numbers and dates: operator prefixes and ranges.
    fn ordered(&self, subject: Expr, text: &str) -> QueryResult<Expr> {
        let ranged = self.settings.allow_operators || self.condition == Some(SearchCondition::Between);
        if ranged {
            if let Ok(("", (min, max))) = range(text) {
                let (min, max) = (min.trim(), max.trim());
                return Ok(Expr::Between {
                    left: Box::new(subject),
                    min: Box::new(self.bound(min, false)?),
                    max: Box::new(self.bound(max, true)?),
                    negated: false,
                    table: None,
                });
            }
        }
        if self.condition == Some(SearchCondition::Between) {
            return Err(QueryError::parse(0, format!("'{}' is not a range", text)));
        }

        let (op, value_text) = match (self.settings.allow_operators, prefixed(text)) {
            (true, Ok((_, (Some(op), value_text)))) => (op, value_text.trim()),
            _ => (self.default_op()?, text),
        };

        if self.data_type == DataType::Date && is_date_only(value_text) {
            let start = self.bound(value_text, false)?;
            let end = self.bound(value_text, true)?;
            return Ok(match op {
                ComparisonOp::Eq | ComparisonOp::Ne => Expr::Between {
                    left: Box::new(subject),
                    min: Box::new(start),
                    max: Box::new(end),
                    negated: op == ComparisonOp::Ne,
                    table: None,
                },
                ComparisonOp::Gt | ComparisonOp::Le => compare(op, subject, end),
                ComparisonOp::Ge | ComparisonOp::Lt => compare(op, subject, start),
            });
        }
        Ok(compare(op, subject, self.literal(value_text)?))
    }

    fn textual(&self, subject: Expr, text: &str) -> QueryResult<Expr> {
        let pattern = PatternList::parse_wildcard(text, &self.syntax())?;
        let like = matches!(
            self.condition,
            Some(SearchCondition::Like | SearchCondition::NotLike)
        );
        match pattern.literal() {
            Some(literal) if !like => {
                let op = self.default_op()?;
                Ok(compare(op, subject, Expr::String(literal)))
            }
            _ => {
                let negated = matches!(
                    self.condition,
                    Some(SearchCondition::NotLike | SearchCondition::NotEqual)
                );
                if let Some(condition) = self.condition {
                    if !matches!(
                        condition,
                        SearchCondition::Equal
                            | SearchCondition::NotEqual
                            | SearchCondition::Like
                            | SearchCondition::NotLike
                    ) {
                        return Err(QueryError::unsupported(format!(
                            "wildcards with condition {}",
                            condition
                        )));
                    }
                }
                Ok(Expr::Like {
                    left: Box::new(subject),
                    pattern: Box::new(Expr::Pattern(pattern)),
                    negated,
                })
            }
        }
    }

    /// One end of a range; a date without time covers its whole day.
    fn bound(&self, text: &str, end: bool) -> QueryResult<Expr> {
        if self.data_type == DataType::Date {
            let value = parse_datetime(text)
                .ok_or_else(|| QueryError::parse(0, format!("'{}' is not a date", text)))?;
            if end && is_date_only(text) {
                return Ok(Expr::DateTime(end_of_day(value)));
            }
            return Ok(Expr::DateTime(value));
        }
        self.literal(text)
    }

    /// Typed literal of one value.
    fn literal(&self, text: &str) -> QueryResult<Expr> {
        let text = text.trim();
        let invalid = || {
            QueryError::parse(
                0,
                format!("'{}' is not a valid {} value", text, self.data_type),
            )
        };
        match &self.data_type {
            DataType::Boolean => parse_bool(text).map(Expr::Bool),
            DataType::Integer => text.parse().map(Expr::Integer).map_err(|_| invalid()),
            DataType::Decimal | DataType::Float => text
                .parse()
                .map(Expr::Integer)
                .or_else(|_| text.parse().map(Expr::Float))
                .map_err(|_| invalid()),
            DataType::Date => parse_datetime(text).map(Expr::DateTime).ok_or_else(invalid),
            _ => Ok(Expr::String(
                PatternList::parse_wildcard(text, &self.syntax())?
                    .literal()
                    .unwrap_or_else(|| text.to_string()),
            )),
        }
    }
}

fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
    Expr::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub(super) fn end_of_day(value: NaiveDateTime) -> NaiveDateTime {
    NaiveTime::from_hms_opt(23, 59, 59)
        .map(|t| value.date().and_time(t))
        .unwrap_or(value)
}

fn parse_bool(text: &str) -> QueryResult<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(QueryError::parse(0, format!("'{}' is not a boolean", text))),
    }
}

/// Split on OR delimiters. An escaped delimiter stays in its piece without
/// the escape; other escapes are kept for the wildcard parser.
pub(super) fn split_pieces(text: &str, delimiters: &str, escape: Option<char>) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.peek() {
                Some(&next) if delimiters.contains(next) => {
                    current.push(next);
                    chars.next();
                }
                Some(&next) => {
                    current.push(c);
                    current.push(next);
                    chars.next();
                }
                None => current.push(c),
            }
        } else if delimiters.contains(c) {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    pieces.push(current);
    pieces
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// OR of the alternatives, as a single IN or NOT IN when they are all
/// equalities or all inequalities against literals.
fn combine(terms: Vec<Expr>) -> Option<Expr> {
    if terms.len() > 1 {
        for (op, negated) in [(ComparisonOp::Eq, false), (ComparisonOp::Ne, true)] {
            let values: Option<Vec<Expr>> = terms
                .iter()
                .map(|t| match t {
                    Expr::Comparison { op: o, right, .. } if *o == op && right.is_literal() => {
                        Some((**right).clone())
                    }
                    _ => None,
                })
                .collect();
            if let (Some(list), Some(Expr::Comparison { left, .. })) = (values, terms.first()) {
                return Some(Expr::In {
                    left: left.clone(),
                    list,
                    negated,
                    table: None,
                });
            }
        }
    }
    Expr::or_all(terms)
}

fn operator(input: &str) -> IResult<&str, ComparisonOp> {
    alt((
        value(ComparisonOp::Ge, tag(">=")),
        value(ComparisonOp::Le, tag("<=")),
        value(ComparisonOp::Ne, tag("<>")),
        value(ComparisonOp::Ne, tag("!=")),
        value(ComparisonOp::Gt, tag(">")),
        value(ComparisonOp::Lt, tag("<")),
        value(ComparisonOp::Eq, tag("=")),
    ))(input)
}

fn prefixed(input: &str) -> IResult<&str, (Option<ComparisonOp>, &str)> {
    pair(opt(terminated(operator, multispace0)), rest)(input)
}

fn range(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_until(RANGE_SEPARATOR), tag(RANGE_SEPARATOR), rest)(input)
}
