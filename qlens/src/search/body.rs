//! Request body shared by the PPL, SQL and SQL async endpoints

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::frame::DataFrame;

/// Result format every search endpoint is asked for
pub const RESULT_FORMAT: &str = "jdbc";

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    qs: &'a str,
    format: &'static str,
}

/// JSON body of a search endpoint call:
/// `{"query": {"qs": ..., "format": "jdbc"}, "df": <frame or null>, ...}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchBody<'a> {
    query: QueryBody<'a>,
    df: Option<&'a DataFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_source_id: Option<&'a str>,
}

impl<'a> FetchBody<'a> {
    pub fn new(qs: &'a str, df: Option<&'a DataFrame>) -> Self {
        Self {
            query: QueryBody {
                qs,
                format: RESULT_FORMAT,
            },
            df,
            data_source: None,
            data_source_id: None,
        }
    }

    /// Backend selector for async job submission
    pub fn data_source(mut self, data_source: Option<&'a str>) -> Self {
        self.data_source = data_source;
        self
    }

    pub fn data_source_id(mut self, data_source_id: Option<&'a str>) -> Self {
        self.data_source_id = data_source_id;
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
