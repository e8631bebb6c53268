//! Property metadata for item types.
//!
//! The engine only needs to know, for an item type, which properties exist and
//! what their data types are. Callers plug in any [`PropertyMetadataProvider`];
//! [`Schema`] is a ready-made provider loaded from JSON or TOML.
//!
//! # Example
//! ```
//! use aml_query::metadata::{DataType, PropertyMetadataProvider, Schema};
//!
//! let json = r#"{
//!     "item_types": [{
//!         "name": "Part",
//!         "properties": [
//!             { "name": "item_number", "data_type": "string" },
//!             { "name": "cost", "data_type": "decimal" },
//!             { "name": "created_by_id", "data_type": "item", "data_source": "User" }
//!         ]
//!     }]
//! }"#;
//!
//! let schema = Schema::from_json(json).unwrap();
//! let cost = schema.property("Part", "cost").unwrap();
//! assert_eq!(cost.data_type, DataType::Decimal);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Data type tag of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Boolean,
    Date,
    Decimal,
    Float,
    Integer,
    /// Foreign key to another item type.
    Item,
    String,
    Text,
    List,
    Sequence,
    Md5,
    Other(String),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Decimal | DataType::Float | DataType::Integer)
    }

    /// Types whose values are compared as text.
    pub fn is_textual(&self) -> bool {
        !matches!(
            self,
            DataType::Boolean
                | DataType::Date
                | DataType::Decimal
                | DataType::Float
                | DataType::Integer
        )
    }
}

impl From<&str> for DataType {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => DataType::Boolean,
            "date" => DataType::Date,
            "decimal" => DataType::Decimal,
            "float" => DataType::Float,
            "integer" => DataType::Integer,
            "item" => DataType::Item,
            "string" => DataType::String,
            "text" => DataType::Text,
            "list" => DataType::List,
            "sequence" => DataType::Sequence,
            "md5" => DataType::Md5,
            other => DataType::Other(other.to_string()),
        }
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        DataType::from(s.as_str())
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Date => write!(f, "date"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::Float => write!(f, "float"),
            DataType::Integer => write!(f, "integer"),
            DataType::Item => write!(f, "item"),
            DataType::String => write!(f, "string"),
            DataType::Text => write!(f, "text"),
            DataType::List => write!(f, "list"),
            DataType::Sequence => write!(f, "sequence"),
            DataType::Md5 => write!(f, "md5"),
            DataType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Description of one property of an item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(alias = "type")]
    pub data_type: DataType,
    /// Related item type for `item` properties.
    #[serde(default)]
    pub data_source: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            data_source: None,
        }
    }

    /// Create an `item` property pointing at `related_type`.
    pub fn item(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Item,
            data_source: Some(related_type.into()),
        }
    }
}

/// Synchronous lookup of property metadata by item type name.
///
/// Implementations must be side-effect free. An unknown item type yields an
/// empty map; the engine then falls back to inferring literal types from
/// their text.
pub trait PropertyMetadataProvider {
    fn properties(&self, item_type: &str) -> BTreeMap<String, PropertyDescriptor>;

    fn property(&self, item_type: &str, name: &str) -> Option<PropertyDescriptor> {
        self.properties(item_type).remove(name)
    }
}

/// Provider that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl PropertyMetadataProvider for NoMetadata {
    fn properties(&self, _item_type: &str) -> BTreeMap<String, PropertyDescriptor> {
        BTreeMap::new()
    }
}

/// Item type definition with its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTypeDef {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

/// Metadata for a set of item types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub item_types: Vec<ItemTypeDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item type with the given properties.
    pub fn add_item_type(&mut self, name: impl Into<String>, properties: Vec<PropertyDescriptor>) {
        self.item_types.push(ItemTypeDef {
            name: name.into(),
            properties,
        });
    }

    /// Builder-style variant of [`Schema::add_item_type`].
    pub fn with_item_type(
        mut self,
        name: impl Into<String>,
        properties: Vec<PropertyDescriptor>,
    ) -> Self {
        self.add_item_type(name, properties);
        self
    }

    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(|e| QueryError::Config(format!("schema JSON: {}", e)))
    }

    pub fn from_toml(text: &str) -> QueryResult<Self> {
        toml::from_str(text).map_err(|e| QueryError::Config(format!("schema TOML: {}", e)))
    }

    /// Load a schema file, choosing the format by extension (`.toml`, otherwise JSON).
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    fn item_type(&self, name: &str) -> Option<&ItemTypeDef> {
        self.item_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

impl PropertyMetadataProvider for Schema {
    fn properties(&self, item_type: &str) -> BTreeMap<String, PropertyDescriptor> {
        match self.item_type(item_type) {
            Some(def) => def
                .properties
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    fn property(&self, item_type: &str, name: &str) -> Option<PropertyDescriptor> {
        self.item_type(item_type)?
            .properties
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }
}
