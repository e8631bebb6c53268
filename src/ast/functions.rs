//! Scalar functions understood by every dialect.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Function {
    CurrentDateTime,
    CurrentUtcDateTime,
    StartsWith,
    EndsWith,
    Contains,
    /// Zero-based position of the second argument in the first, or -1.
    IndexOf,
    Length,
    ToLower,
    ToUpper,
    Trim,
    /// `substring(text, start, length)` with a zero-based start.
    Substring,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    AddDays,
    AddHours,
    AddMinutes,
    /// Whole days from the first to the second argument.
    DiffDays,
    Other(String),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::CurrentDateTime => "currentDateTime",
            Function::CurrentUtcDateTime => "currentUtcDateTime",
            Function::StartsWith => "startsWith",
            Function::EndsWith => "endsWith",
            Function::Contains => "contains",
            Function::IndexOf => "indexOf",
            Function::Length => "length",
            Function::ToLower => "toLower",
            Function::ToUpper => "toUpper",
            Function::Trim => "trim",
            Function::Substring => "substring",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::AddDays => "addDays",
            Function::AddHours => "addHours",
            Function::AddMinutes => "addMinutes",
            Function::DiffDays => "diffDays",
            Function::Other(name) => name,
        }
    }

    /// Look up a function by its canonical name, ignoring case.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "currentdatetime" => Function::CurrentDateTime,
            "currentutcdatetime" => Function::CurrentUtcDateTime,
            "startswith" => Function::StartsWith,
            "endswith" => Function::EndsWith,
            "contains" => Function::Contains,
            "indexof" => Function::IndexOf,
            "length" => Function::Length,
            "tolower" => Function::ToLower,
            "toupper" => Function::ToUpper,
            "trim" => Function::Trim,
            "substring" => Function::Substring,
            "year" => Function::Year,
            "month" => Function::Month,
            "day" => Function::Day,
            "hour" => Function::Hour,
            "minute" => Function::Minute,
            "second" => Function::Second,
            "adddays" => Function::AddDays,
            "addhours" => Function::AddHours,
            "addminutes" => Function::AddMinutes,
            "diffdays" => Function::DiffDays,
            _ => Function::Other(name.to_string()),
        }
    }

    /// Functions that yield a boolean and may stand alone as a criterion.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Function::StartsWith | Function::EndsWith | Function::Contains
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
