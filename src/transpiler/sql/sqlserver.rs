use chrono::NaiveDateTime;

use super::super::traits::{SqlGenerator, arity};
use crate::ast::Function;
use crate::error::{QueryError, QueryResult};

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, name: &str) -> String {
        format!("@{}", name)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val {
            "1".to_string()
        } else {
            "0".to_string()
        }
    }

    fn concat_operator(&self) -> &str {
        "+"
    }

    fn datetime_literal(&self, value: &NaiveDateTime) -> String {
        format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S"))
    }

    fn offset_fetch(&self, offset: Option<u64>, fetch: Option<u64>) -> String {
        let mut sql = String::new();
        if offset.is_none() && fetch.is_none() {
            return sql;
        }
        sql.push_str(&format!(" offset {} rows", offset.unwrap_or(0)));
        if let Some(n) = fetch {
            sql.push_str(&format!(" fetch next {} rows only", n));
        }
        sql
    }

    fn function(&self, func: &Function, args: &[String]) -> QueryResult<String> {
        let sql = match func {
            Function::CurrentDateTime => {
                arity(func, args, 0)?;
                "getdate()".to_string()
            }
            Function::CurrentUtcDateTime => {
                arity(func, args, 0)?;
                "getutcdate()".to_string()
            }
            Function::IndexOf => {
                let args = arity(func, args, 2)?;
                format!("(charindex({}, {}) - 1)", args[1], args[0])
            }
            Function::Length => format!("len({})", arity(func, args, 1)?[0]),
            Function::ToLower => format!("lower({})", arity(func, args, 1)?[0]),
            Function::ToUpper => format!("upper({})", arity(func, args, 1)?[0]),
            Function::Trim => format!("ltrim(rtrim({}))", arity(func, args, 1)?[0]),
            Function::Substring => format!("substring({})", arity(func, args, 3)?.join(", ")),
            Function::Year => format!("year({})", arity(func, args, 1)?[0]),
            Function::Month => format!("month({})", arity(func, args, 1)?[0]),
            Function::Day => format!("day({})", arity(func, args, 1)?[0]),
            Function::Hour => format!("datepart(hour, {})", arity(func, args, 1)?[0]),
            Function::Minute => format!("datepart(minute, {})", arity(func, args, 1)?[0]),
            Function::Second => format!("datepart(second, {})", arity(func, args, 1)?[0]),
            Function::AddDays | Function::AddHours | Function::AddMinutes => {
                let unit = match func {
                    Function::AddDays => "day",
                    Function::AddHours => "hour",
                    _ => "minute",
                };
                let args = arity(func, args, 2)?;
                format!("dateadd({}, {}, {})", unit, args[1], args[0])
            }
            Function::DiffDays => {
                let args = arity(func, args, 2)?;
                format!("datediff(day, {}, {})", args[0], args[1])
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
}
