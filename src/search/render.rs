//! Criteria back to search-box text.

use chrono::{NaiveDateTime, Timelike};

use super::parser::{RANGE_SEPARATOR, end_of_day};
use crate::ast::{ComparisonOp, Expr, LogicalOp};
use crate::config::SearchSettings;
use crate::error::{QueryError, QueryResult};
use crate::pattern::{PatternList, WildcardSyntax};

/// Render a criteria expression on one property as search-box text.
///
/// Equality renders as the bare value, a whole-day range as the date alone
/// and any other range as `a...b`. Alternatives are joined with the first
/// OR delimiter.
pub fn to_simple_search(expr: &Expr, settings: &SearchSettings) -> QueryResult<String> {
    SearchTextWriter { settings }.write(expr)
}

struct SearchTextWriter<'a> {
    settings: &'a SearchSettings,
}

impl SearchTextWriter<'_> {
    fn syntax(&self) -> WildcardSyntax {
        WildcardSyntax {
            escape: self.settings.escape,
            ..WildcardSyntax::SIMPLE_SEARCH
        }
    }

    fn delimiter(&self) -> QueryResult<char> {
        self.settings
            .or_delimiters
            .chars()
            .next()
            .ok_or_else(|| QueryError::unsupported("alternatives without an OR delimiter"))
    }

    fn write(&self, expr: &Expr) -> QueryResult<String> {
        match expr {
            Expr::Logical {
                op: LogicalOp::Or, ..
            } => {
                let delimiter = self.delimiter()?.to_string();
                let parts = expr
                    .flatten(LogicalOp::Or)
                    .into_iter()
                    .map(|e| self.write(e))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(parts.join(&delimiter))
            }
            Expr::Comparison { op, left, right } => {
                let (op, value) = match (left.as_property(), right.as_property()) {
                    (Some(_), None) => (*op, right.as_ref()),
                    (None, Some(_)) => (op.flip(), left.as_ref()),
                    _ => return Err(unsupported(expr)),
                };
                self.comparison(op, value)
            }
            Expr::Between {
                min,
                max,
                negated,
                ..
            } => {
                if let (Expr::DateTime(start), Expr::DateTime(end)) = (min.as_ref(), max.as_ref()) {
                    if is_whole_day(start, end) {
                        let date = start.format("%Y-%m-%d").to_string();
                        return Ok(if *negated {
                            self.prefixed("<>", date)?
                        } else {
                            date
                        });
                    }
                }
                if *negated {
                    return Err(unsupported(expr));
                }
                self.operators_allowed()?;
                Ok(format!(
                    "{}{}{}",
                    self.value(min)?,
                    RANGE_SEPARATOR,
                    self.value(max)?
                ))
            }
            Expr::In {
                list,
                negated: false,
                ..
            } => {
                let delimiter = self.delimiter()?.to_string();
                let values = list
                    .iter()
                    .map(|v| self.value(v))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(values.join(&delimiter))
            }
            Expr::Like {
                pattern,
                negated: false,
                ..
            } => match pattern.as_ref() {
                Expr::Pattern(pattern) => {
                    let text = pattern.render_wildcard(&self.syntax())?;
                    Ok(self.escape_delimiters(&text))
                }
                _ => Err(unsupported(expr)),
            },
            _ => Err(unsupported(expr)),
        }
    }

    fn comparison(&self, op: ComparisonOp, value: &Expr) -> QueryResult<String> {
        if let Expr::DateTime(at) = value {
            let whole_day = match op {
                ComparisonOp::Gt | ComparisonOp::Le => *at == end_of_day(*at),
                ComparisonOp::Ge | ComparisonOp::Lt => is_midnight(at),
                _ => false,
            };
            if whole_day {
                return self.prefixed(prefix(op), at.format("%Y-%m-%d").to_string());
            }
        }
        let text = self.value(value)?;
        match op {
            ComparisonOp::Eq => Ok(text),
            _ => self.prefixed(prefix(op), text),
        }
    }

    fn prefixed(&self, prefix: &str, text: String) -> QueryResult<String> {
        self.operators_allowed()?;
        Ok(format!("{}{}", prefix, text))
    }

    fn operators_allowed(&self) -> QueryResult<()> {
        if self.settings.allow_operators {
            Ok(())
        } else {
            Err(QueryError::unsupported(
                "search operators are disabled in settings",
            ))
        }
    }

    fn value(&self, value: &Expr) -> QueryResult<String> {
        match value {
            Expr::String(s) => self.literal(s),
            Expr::Object(object) => self.literal(&object.value),
            Expr::Integer(i) => Ok(i.to_string()),
            Expr::Float(f) => Ok(f.to_string()),
            Expr::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Expr::DateTime(at) if is_midnight(at) => Ok(at.format("%Y-%m-%d").to_string()),
            Expr::DateTime(at) => Ok(at.format("%Y-%m-%dT%H:%M:%S").to_string()),
            other => Err(unsupported(other)),
        }
    }

    /// Plain text with wildcards and delimiters escaped.
    fn literal(&self, text: &str) -> QueryResult<String> {
        let escaped = PatternList::from_literal(text).render_wildcard(&self.syntax())?;
        if self.settings.escape.is_none()
            && escaped.chars().any(|c| self.settings.or_delimiters.contains(c))
        {
            return Err(QueryError::unsupported(format!(
                "'{}' contains an OR delimiter and no escape character is set",
                text
            )));
        }
        Ok(self.escape_delimiters(&escaped))
    }

    fn escape_delimiters(&self, text: &str) -> String {
        let Some(escape) = self.settings.escape else {
            return text.to_string();
        };
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if self.settings.or_delimiters.contains(c) {
                out.push(escape);
            }
            out.push(c);
        }
        out
    }
}

fn prefix(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
    }
}

fn is_midnight(at: &NaiveDateTime) -> bool {
    at.num_seconds_from_midnight() == 0
}

fn is_whole_day(start: &NaiveDateTime, end: &NaiveDateTime) -> bool {
    is_midnight(start) && start.date() == end.date() && *end == end_of_day(*end)
}

fn unsupported(expr: &Expr) -> QueryError {
    QueryError::unsupported(format!("'{}' has no simple search form", expr))
}
