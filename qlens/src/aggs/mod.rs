//! Aggregation descriptors and their translation to PPL clauses
//!
//! The UI sends aggregations in OpenSearch DSL shape:
//!
//! ```json
//! { "2": { "date_histogram": { "field": "@timestamp", "fixed_interval": "30s" } } }
//! ```
//!
//! [`AggConfig::from_raw`] turns that into a typed [`AggConfig`]; the
//! [`compiler`] renders the descriptor as a PPL `stats` clause.

pub mod compiler;
pub mod interval;

pub use compiler::{aggregation_query, compile, remove_keyword};
pub use interval::{AutoInterval, BucketIntervalCalculator};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Id the UI gives the synthetic "everything else" bucket request
pub const OTHER_FILTER_ID: &str = "other-filter";

/// Histogram bucket width as requested by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Fixed(String),
    Calendar(String),
}

impl Interval {
    /// Render as a PPL span literal (`30s`, `1d`, ...)
    pub fn as_span(&self) -> String {
        match self {
            Interval::Fixed(s) => s.clone(),
            Interval::Calendar(s) => match s.as_str() {
                "minute" => "1m".to_string(),
                "hour" => "1h".to_string(),
                "day" => "1d".to_string(),
                "week" => "1w".to_string(),
                "month" => "1M".to_string(),
                "quarter" => "1q".to_string(),
                "year" => "1y".to_string(),
                other => other.to_string(),
            },
        }
    }
}

/// The aggregation a search wants computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggDescriptor {
    DateHistogram {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval: Option<Interval>,
    },
    Avg {
        field: String,
    },
    Cardinality {
        field: String,
    },
    Terms {
        field: String,
    },
    OtherBucket {
        field: String,
        excluded_values: Vec<String>,
    },
}

impl AggDescriptor {
    fn from_raw(id: &str, name: &str, params: &Value) -> Result<Self> {
        match name {
            "date_histogram" => {
                let interval = str_param(params, "fixed_interval")
                    .or_else(|| str_param(params, "interval"))
                    .map(Interval::Fixed)
                    .or_else(|| str_param(params, "calendar_interval").map(Interval::Calendar));
                Ok(AggDescriptor::DateHistogram {
                    field: required_field(name, params)?,
                    interval,
                })
            }
            "avg" => Ok(AggDescriptor::Avg {
                field: required_field(name, params)?,
            }),
            "cardinality" => Ok(AggDescriptor::Cardinality {
                field: required_field(name, params)?,
            }),
            "terms" => Ok(AggDescriptor::Terms {
                field: required_field(name, params)?,
            }),
            "filters" if id == OTHER_FILTER_ID => Ok(other_bucket(params)),
            other => Err(Error::InvalidAggregation(format!(
                "unsupported aggregation type '{}'",
                other
            ))),
        }
    }
}

/// A parsed aggregation request with its nested sub-aggregations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<AggDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_aggs: BTreeMap<String, AggConfig>,
}

impl AggConfig {
    pub fn new(id: impl Into<String>, descriptor: AggDescriptor) -> Self {
        Self {
            id: id.into(),
            descriptor: Some(descriptor),
            sub_aggs: BTreeMap::new(),
        }
    }

    /// Parse raw DSL aggregations. Only the first top-level aggregation is
    /// used; `null` or `{}` means no aggregation.
    pub fn from_raw(raw: &Value) -> Result<Option<Self>> {
        let aggs = match raw {
            Value::Null => return Ok(None),
            Value::Object(aggs) => aggs,
            _ => {
                return Err(Error::InvalidAggregation(
                    "aggregations must be a JSON object".to_string(),
                ))
            }
        };

        let Some((id, agg)) = aggs.iter().next() else {
            return Ok(None);
        };
        if aggs.len() > 1 {
            tracing::debug!(
                count = aggs.len(),
                id = %id,
                "Multiple top-level aggregations, using the first"
            );
        }

        Self::parse_one(id, agg).map(Some)
    }

    fn parse_one(id: &str, agg: &Value) -> Result<Self> {
        let body = agg.as_object().ok_or_else(|| {
            Error::InvalidAggregation(format!("aggregation '{}' must be an object", id))
        })?;

        let mut config = AggConfig {
            id: id.to_string(),
            descriptor: None,
            sub_aggs: BTreeMap::new(),
        };

        for (name, value) in body {
            match name.as_str() {
                "aggs" | "aggregations" => {
                    let subs = value.as_object().ok_or_else(|| {
                        Error::InvalidAggregation(format!(
                            "sub-aggregations of '{}' must be an object",
                            id
                        ))
                    })?;
                    for (sub_id, sub) in subs {
                        config
                            .sub_aggs
                            .insert(sub_id.clone(), Self::parse_one(sub_id, sub)?);
                    }
                }
                "meta" => {}
                _ => config.descriptor = Some(AggDescriptor::from_raw(id, name, value)?),
            }
        }

        Ok(config)
    }
}

fn str_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_string)
}

fn required_field(agg_type: &str, params: &Value) -> Result<String> {
    str_param(params, "field")
        .ok_or_else(|| Error::InvalidAggregation(format!("{} requires a field", agg_type)))
}

/// Collect the values the "other" bucket must exclude from
/// `filters.filters[""].bool.must_not`, a list of `{match_phrase: {field: value}}`.
fn other_bucket(params: &Value) -> AggDescriptor {
    let mut field = String::new();
    let mut excluded_values = Vec::new();

    let must_not = params
        .pointer("/filters/")
        .and_then(|f| f.pointer("/bool/must_not"))
        .and_then(Value::as_array);

    for clause in must_not.into_iter().flatten() {
        let Some(clause) = clause.as_object() else {
            continue;
        };
        for matcher in clause.values().filter_map(Value::as_object) {
            for (name, value) in matcher {
                field = name.clone();
                let value = value.get("query").unwrap_or(value);
                excluded_values.push(value_to_string(value));
            }
        }
    }

    AggDescriptor::OtherBucket {
        field,
        excluded_values,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
