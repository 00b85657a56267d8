//! Data frames: the response envelope carried between backend round-trips

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::aggs::{AggConfig, AggDescriptor};
use crate::error::Result;

/// Normalized field types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Date,
    Keyword,
    Text,
    Number,
    Ip,
    Boolean,
    Object,
    Other(String),
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "date" | "timestamp" | "datetime" | "date_nanos" => Self::Date,
            "keyword" | "string" => Self::Keyword,
            "text" => Self::Text,
            "number" | "integer" | "long" | "short" | "byte" | "float" | "double"
            | "half_float" | "scaled_float" => Self::Number,
            "ip" => Self::Ip,
            "boolean" | "bool" => Self::Boolean,
            "object" | "struct" | "nested" => Self::Object,
            _ => Self::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Keyword => write!(f, "keyword"),
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "number"),
            Self::Ip => write!(f, "ip"),
            Self::Boolean => write!(f, "boolean"),
            Self::Object => write!(f, "object"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A named, typed column. `values` is only populated on result columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            values: Vec::new(),
        }
    }

    pub fn is_date(&self) -> bool {
        self.field_type == FieldType::Date
    }

    /// Backends report some time columns as plain strings; a column named
    /// like a date is treated as one.
    fn normalize(&mut self) {
        let name = self.name.to_lowercase();
        if name.contains("date") || name.contains("timestamp") {
            self.field_type = FieldType::Date;
        }
    }
}

/// Translation results cached on a frame so a refetch can reuse them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrameMeta {
    /// Query string the translation was computed for
    pub qs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg_config: Option<AggConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field: Option<Field>,
    pub time_filter: String,
    /// Aggregation query per aggregation id
    #[serde(default)]
    pub aggs_qs: BTreeMap<String, String>,
}

impl DataFrameMeta {
    pub fn new(
        qs: impl Into<String>,
        agg_config: Option<AggConfig>,
        time_field: Option<Field>,
        time_filter: impl Into<String>,
    ) -> Self {
        Self {
            qs: qs.into(),
            agg_config,
            time_field,
            time_filter: time_filter.into(),
            aggs_qs: BTreeMap::new(),
        }
    }

    pub fn with_aggs_qs(mut self, aggs_qs: BTreeMap<String, String>) -> Self {
        self.aggs_qs = aggs_qs;
        self
    }
}

/// Response envelope: schema, result columns and cached translation meta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<Field>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DataFrameMeta>,
}

impl DataFrame {
    /// Decode a frame from a backend response body and normalize field types
    pub fn from_value(body: &Value) -> Result<Self> {
        let mut frame: DataFrame = serde_json::from_value(body.clone())?;
        frame.schema.iter_mut().for_each(Field::normalize);
        frame.fields.iter_mut().for_each(Field::normalize);
        if frame.size == 0 {
            frame.size = frame.fields.iter().map(|f| f.values.len()).max().unwrap_or(0);
        }
        Ok(frame)
    }

    /// Schema if the backend sent one, result columns otherwise
    pub fn schema(&self) -> &[Field] {
        if self.schema.is_empty() {
            &self.fields
        } else {
            &self.schema
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.schema().iter().find(|f| f.name == name)
    }

    pub fn meta(&self) -> Option<&DataFrameMeta> {
        self.meta.as_ref()
    }
}

/// Store translation results on `frame`.
///
/// Callers attach meta once per frame. A second call replaces the first
/// (last write wins) and is logged.
pub fn attach_meta(frame: &mut DataFrame, meta: DataFrameMeta) {
    if frame.meta.is_some() {
        tracing::warn!(
            frame = frame.name.as_deref().unwrap_or(""),
            "Replacing existing data frame meta"
        );
    }
    frame.meta = Some(meta);
}

/// Pick the time field of a frame.
///
/// An explicit dataset time field name wins. Otherwise the field a
/// `date_histogram` aggregation buckets on, and finally the first field of
/// type date.
pub fn resolve_time_field(
    frame: &DataFrame,
    time_field_name: Option<&str>,
    agg: Option<&AggConfig>,
) -> Option<Field> {
    if let Some(name) = time_field_name {
        return Some(Field::new(name, FieldType::Date));
    }

    if let Some(AggDescriptor::DateHistogram { field, .. }) = agg.and_then(|a| a.descriptor.as_ref())
    {
        return frame.field(field).map(|f| Field::new(f.name.clone(), f.field_type.clone()));
    }

    frame
        .schema()
        .iter()
        .find(|f| f.is_date())
        .map(|f| Field::new(f.name.clone(), f.field_type.clone()))
}
