//! Engine settings and the context threaded through parse and render calls.
//!
//! Settings load from `amlq.toml`, searched in the working directory and
//! then in the user configuration directory:
//!
//! ```toml
//! dialect = "sqlserver"
//! time_zone_offset_minutes = 60
//! sql_clauses = ["where"]
//!
//! [search]
//! or_delimiters = "|;"
//! escape = "\\"
//! allow_operators = true
//!
//! [parameters]
//! state = "Released"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::ast::{PropertyRef, Query, TableId};
use crate::error::{QueryError, QueryResult};
use crate::metadata::{DataType, NoMetadata, PropertyDescriptor, PropertyMetadataProvider};
use crate::transpiler::{Dialect, SqlClause, SqlRenderOptions};

/// File name looked up when no explicit config path is given.
pub const CONFIG_FILE: &str = "amlq.toml";

/// Settings for simple-search parsing and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Every character of this string separates OR alternatives.
    pub or_delimiters: String,
    /// Character that makes the following delimiter or wildcard literal.
    pub escape: Option<char>,
    /// Whether `>5`, `<=2020-01-01` and `a...b` forms are recognized.
    pub allow_operators: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            or_delimiters: "|".to_string(),
            escape: Some('\\'),
            allow_operators: true,
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dialect: Dialect,
    /// Offset of local date-time literals from UTC, used by OData output.
    pub time_zone_offset_minutes: i32,
    pub search: SearchSettings,
    /// Clauses emitted by SQL rendering; empty means all of them.
    pub sql_clauses: Vec<SqlClause>,
    /// Values bound to named parameters at render time.
    pub parameters: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            time_zone_offset_minutes: 0,
            search: SearchSettings::default(),
            sql_clauses: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Create a new settings builder
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn from_toml(text: &str) -> QueryResult<Self> {
        toml::from_str(text).map_err(|e| QueryError::Config(e.to_string()))
    }

    /// Load settings from `path`, or discover `amlq.toml`.
    ///
    /// Falls back to defaults when no file is found.
    pub fn load(path: Option<&Path>) -> QueryResult<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(),
        };
        match candidate {
            Some(p) => {
                tracing::debug!("Loading settings from {}", p.display());
                let content = std::fs::read_to_string(&p)?;
                Self::from_toml(&content)
            }
            None => {
                tracing::debug!("No {} found, using default settings", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let user = dirs::config_dir()?.join("amlq").join(CONFIG_FILE);
        user.exists().then_some(user)
    }

    pub fn time_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.time_zone_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn render_options(&self) -> SqlRenderOptions {
        if self.sql_clauses.is_empty() {
            SqlRenderOptions::ALL
        } else {
            SqlRenderOptions::from_clauses(&self.sql_clauses)
        }
    }
}

/// Builder for [`Settings`]
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.settings.dialect = dialect;
        self
    }

    pub fn time_zone_offset_minutes(mut self, minutes: i32) -> Self {
        self.settings.time_zone_offset_minutes = minutes;
        self
    }

    pub fn or_delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.settings.search.or_delimiters = delimiters.into();
        self
    }

    pub fn escape(mut self, escape: Option<char>) -> Self {
        self.settings.search.escape = escape;
        self
    }

    pub fn allow_operators(mut self, allow: bool) -> Self {
        self.settings.search.allow_operators = allow;
        self
    }

    pub fn sql_clauses(mut self, clauses: Vec<SqlClause>) -> Self {
        self.settings.sql_clauses = clauses;
        self
    }

    /// Bind a value to a named parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.parameters.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

/// Settings plus metadata, passed explicitly to every parse and render call.
pub struct QueryContext<'a> {
    pub settings: Settings,
    pub metadata: &'a dyn PropertyMetadataProvider,
}

impl Default for QueryContext<'static> {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            metadata: &NoMetadata,
        }
    }
}

impl std::fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> QueryContext<'a> {
    pub fn new(metadata: &'a dyn PropertyMetadataProvider) -> Self {
        Self {
            settings: Settings::default(),
            metadata,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Item type of a table: its explicit type, or the related type of the
    /// property that produced it.
    pub fn table_type_name(&self, query: &Query, table: TableId) -> Option<String> {
        let item = query.get(table)?;
        if let Some(name) = &item.type_name {
            return Some(name.clone());
        }
        let provider = item.type_provider.as_ref()?;
        let parent = self.table_type_name(query, provider.table)?;
        let related = self
            .metadata
            .property(&parent, &provider.name)
            .and_then(|p| p.data_source);
        if related.is_none() {
            tracing::debug!(
                "No metadata for '{}.{}', item type of joined table unknown",
                parent,
                provider.name
            );
        }
        related
    }

    pub fn descriptor(&self, query: &Query, property: &PropertyRef) -> Option<PropertyDescriptor> {
        let type_name = self.table_type_name(query, property.table)?;
        self.metadata.property(&type_name, &property.name)
    }

    pub fn data_type(&self, query: &Query, property: &PropertyRef) -> Option<DataType> {
        self.descriptor(query, property).map(|d| d.data_type)
    }
}
