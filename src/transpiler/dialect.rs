use serde::{Deserialize, Serialize};

use super::sql::{AnsiGenerator, SqlServerGenerator};
use super::traits::SqlGenerator;

/// SQL dialect of rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    SqlServer,
    Ansi,
}

impl Dialect {
    pub fn generator(self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::SqlServer => Box::new(SqlServerGenerator),
            Dialect::Ansi => Box::new(AnsiGenerator),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" | "tsql" => Ok(Dialect::SqlServer),
            "ansi" | "standard" => Ok(Dialect::Ansi),
            other => Err(format!("unknown SQL dialect '{}'", other)),
        }
    }
}
