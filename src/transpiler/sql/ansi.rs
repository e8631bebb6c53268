use chrono::NaiveDateTime;

use super::super::traits::{SqlGenerator, arity};
use crate::ast::Function;
use crate::error::{QueryError, QueryResult};
use crate::pattern::WildcardSyntax;

/// Standard LIKE: no bracket classes, backslash escapes declared with
/// an `escape` clause.
pub const ANSI_LIKE: WildcardSyntax = WildcardSyntax {
    any_run: &['%'],
    single_char: Some('_'),
    single_digit: None,
    escape: Some('\\'),
    brackets: false,
    bracket_negation: '^',
};

pub struct AnsiGenerator;

impl SqlGenerator for AnsiGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }

    fn bool_literal(&self, val: bool) -> String {
        val.to_string()
    }

    fn concat_operator(&self) -> &str {
        "||"
    }

    fn datetime_literal(&self, value: &NaiveDateTime) -> String {
        format!("timestamp '{}'", value.format("%Y-%m-%d %H:%M:%S"))
    }

    fn offset_fetch(&self, offset: Option<u64>, fetch: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = offset {
            sql.push_str(&format!(" offset {} rows", n));
        }
        if let Some(n) = fetch {
            sql.push_str(&format!(" fetch first {} rows only", n));
        }
        sql
    }

    fn function(&self, func: &Function, args: &[String]) -> QueryResult<String> {
        let sql = match func {
            Function::CurrentDateTime => {
                arity(func, args, 0)?;
                "current_timestamp".to_string()
            }
            Function::CurrentUtcDateTime => {
                arity(func, args, 0)?;
                "(current_timestamp at time zone 'UTC')".to_string()
            }
            Function::IndexOf => {
                let args = arity(func, args, 2)?;
                format!("(position({} in {}) - 1)", args[1], args[0])
            }
            Function::Length => format!("char_length({})", arity(func, args, 1)?[0]),
            Function::ToLower => format!("lower({})", arity(func, args, 1)?[0]),
            Function::ToUpper => format!("upper({})", arity(func, args, 1)?[0]),
            Function::Trim => format!("trim({})", arity(func, args, 1)?[0]),
            Function::Substring => {
                let args = arity(func, args, 3)?;
                format!("substring({} from {} for {})", args[0], args[1], args[2])
            }
            Function::Year => format!("extract(year from {})", arity(func, args, 1)?[0]),
            Function::Month => format!("extract(month from {})", arity(func, args, 1)?[0]),
            Function::Day => format!("extract(day from {})", arity(func, args, 1)?[0]),
            Function::Hour => format!("extract(hour from {})", arity(func, args, 1)?[0]),
            Function::Minute => format!("extract(minute from {})", arity(func, args, 1)?[0]),
            Function::Second => format!("extract(second from {})", arity(func, args, 1)?[0]),
            Function::AddDays | Function::AddHours | Function::AddMinutes => {
                let unit = match func {
                    Function::AddDays => "day",
                    Function::AddHours => "hour",
                    _ => "minute",
                };
                let args = arity(func, args, 2)?;
                format!("({} + {} * interval '1' {})", args[0], args[1], unit)
            }
            Function::DiffDays => {
                let args = arity(func, args, 2)?;
                format!("extract(day from ({} - {}))", args[1], args[0])
            }
            Function::Other(name) => format!("{}({})", name, args.join(", ")),
            Function::StartsWith | Function::EndsWith | Function::Contains => {
                return Err(QueryError::unsupported(format!(
                    "{} outside of a condition",
                    func
                )));
            }
        };
        Ok(sql)
    }

    fn like_syntax(&self) -> WildcardSyntax {
        ANSI_LIKE
    }
}
