//! Search interception: one interceptor per query language
//!
//! The UI layer hands a [`SearchRequest`] to the [`SearchInterceptorRegistry`],
//! which dispatches on the declared [`QueryLanguage`]:
//!
//! - PPL runs two dependent fetches (schema, then annotated query), see [`ppl`]
//! - SQL forwards the literal query once, see [`sql`]
//! - SQL async submits a job once, see [`sql_async`]
//!
//! Every fetch made for one search honors the same cancellation token.

pub mod body;
pub mod ppl;
pub mod sql;
pub mod sql_async;

pub use body::FetchBody;
pub use ppl::{MissingTimeFieldPolicy, PplSearchInterceptor, PplState};
pub use sql::SqlSearchInterceptor;
pub use sql_async::SqlAsyncSearchInterceptor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::aggs::{AggConfig, AutoInterval, BucketIntervalCalculator};
use crate::cancel::{run_cancellable, CancellationToken};
use crate::config::{Config, EndpointsConfig};
use crate::error::{format_error, Error, Result};
use crate::frame::DataFrame;
use crate::notify::{Notifier, ToastOptions, TracingNotifier};
use crate::telemetry;
use crate::time::{DateFormatter, FixedTimeFilter, PplDateFormatter, TimeFilterSource};
use crate::transport::{FetchRequest, HttpTransport, ReqwestTransport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryLanguage {
    #[default]
    #[serde(rename = "PPL")]
    Ppl,
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "SQLAsync")]
    SqlAsync,
}

impl QueryLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLanguage::Ppl => "PPL",
            QueryLanguage::Sql => "SQL",
            QueryLanguage::SqlAsync => "SQLAsync",
        }
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ppl" => Ok(QueryLanguage::Ppl),
            "sql" => Ok(QueryLanguage::Sql),
            "sqlasync" | "sql_async" | "sql-async" => Ok(QueryLanguage::SqlAsync),
            other => Err(Error::InvalidRequest(format!(
                "unknown query language '{}'",
                other
            ))),
        }
    }
}

/// What the UI asked for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Index or dataset the query targets. SQL async also sends it as the
    /// backend data source selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Raw query string as typed by the user
    pub query: String,
    #[serde(default)]
    pub language: QueryLanguage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<AggConfig>,
    /// Frame returned by an earlier search, for warm refetches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_frame: Option<DataFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    /// Dataset time field, when the dataset declares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub params: SearchParams,
}

impl SearchRequest {
    pub fn new(language: QueryLanguage, query: impl Into<String>) -> Self {
        Self {
            id: None,
            params: SearchParams {
                query: query.into(),
                language,
                ..Default::default()
            },
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.params.index = Some(index.into());
        self
    }

    pub fn with_aggs(mut self, aggs: AggConfig) -> Self {
        self.params.aggs = Some(aggs);
        self
    }

    pub fn with_data_frame(mut self, frame: DataFrame) -> Self {
        self.params.data_frame = Some(frame);
        self
    }
}

/// Per-search options; the token governs every fetch of the search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub cancel: CancellationToken,
}

impl SearchOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

/// Error the backend reported inside an otherwise successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub response: String,
    pub msg: Option<String>,
}

/// A search hit built from one data frame row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_source")]
    pub source: Map<String, Value>,
}

/// Backend answer: `{ "type": ..., "body": <data frame or error>, "took": ms }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub took: u64,
}

impl SearchResponse {
    /// Decode a backend answer. A bare body without the envelope is accepted.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.get("body").is_some() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(Self {
                kind: "data_frame".to_string(),
                body: value,
                took: 0,
            })
        }
    }

    pub fn backend_error(&self) -> Option<BackendError> {
        let error = self.body.get("error")?;
        match error {
            Value::Null => None,
            Value::String(s) => Some(BackendError {
                response: s.clone(),
                msg: None,
            }),
            other => Some(BackendError {
                response: other
                    .get("response")
                    .map(|r| match r {
                        Value::String(s) => s.clone(),
                        v => v.to_string(),
                    })
                    .unwrap_or_else(|| other.to_string()),
                msg: other.get("msg").and_then(Value::as_str).map(str::to_string),
            }),
        }
    }

    pub fn data_frame(&self) -> Result<DataFrame> {
        DataFrame::from_value(&self.body)
    }

    /// One hit per row; error-bearing or column-less bodies yield none.
    pub fn to_hits(&self) -> Result<Vec<Hit>> {
        if self.body.get("error").is_some() {
            return Ok(Vec::new());
        }
        let frame = self.data_frame()?;
        let rows = frame
            .fields
            .iter()
            .map(|f| f.values.len())
            .max()
            .unwrap_or(0)
            .min(frame.size);
        let hits = (0..rows)
            .map(|row| Hit {
                index: frame.name.clone(),
                source: frame
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), f.values.get(row).cloned().unwrap_or(Value::Null)))
                    .collect(),
            })
            .collect();
        Ok(hits)
    }
}

/// One query language's search lifecycle
#[async_trait]
pub trait SearchInterceptor: Send + Sync {
    fn language(&self) -> QueryLanguage;

    async fn search(&self, request: &SearchRequest, options: &SearchOptions)
        -> Result<SearchResponse>;
}

/// Collaborators shared by all interceptors, built once at startup
#[derive(Clone)]
pub struct SearchServices {
    pub transport: Arc<dyn HttpTransport>,
    pub notifier: Arc<dyn Notifier>,
    pub auto_interval: Arc<dyn AutoInterval>,
    pub time_filter: Arc<dyn TimeFilterSource>,
    pub date_formatter: Arc<dyn DateFormatter>,
    pub endpoints: EndpointsConfig,
}

impl SearchServices {
    /// Services with default interval sizing, date format, time range
    /// (last 15 minutes) and endpoints
    pub fn new(transport: Arc<dyn HttpTransport>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            notifier,
            auto_interval: Arc::new(BucketIntervalCalculator::default()),
            time_filter: Arc::new(FixedTimeFilter::default()),
            date_formatter: Arc::new(PplDateFormatter::default()),
            endpoints: EndpointsConfig::default(),
        }
    }

    /// Services talking to the configured backend over HTTP
    pub fn from_config(config: &Config, time_filter: Arc<dyn TimeFilterSource>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.backend)?);
        Ok(Self {
            transport,
            notifier: Arc::new(TracingNotifier),
            auto_interval: Arc::new(BucketIntervalCalculator::new(
                config.search.histogram_bar_target,
            )),
            time_filter,
            date_formatter: Arc::new(PplDateFormatter::new(config.search.date_format.clone())?),
            endpoints: config.endpoints.clone(),
        })
    }

    pub fn with_time_filter(mut self, time_filter: Arc<dyn TimeFilterSource>) -> Self {
        self.time_filter = time_filter;
        self
    }

    pub fn with_auto_interval(mut self, auto_interval: Arc<dyn AutoInterval>) -> Self {
        self.auto_interval = auto_interval;
        self
    }

    pub fn with_date_formatter(mut self, date_formatter: Arc<dyn DateFormatter>) -> Self {
        self.date_formatter = date_formatter;
        self
    }

    pub fn with_endpoints(mut self, endpoints: EndpointsConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// POST `body` to `path` under the search's token
    pub(crate) async fn fetch(
        &self,
        path: &str,
        body: FetchBody<'_>,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let request = FetchRequest::post(path, body.to_value()?);
        let raw = run_cancellable(&options.cancel, self.transport.fetch(request, &options.cancel))
            .await
            .map_err(format_error)?;
        SearchResponse::from_value(raw)
    }

    /// Notify about an error the backend embedded in `response`, if any.
    /// The response itself is still delivered.
    pub(crate) fn surface_backend_error(
        &self,
        language: QueryLanguage,
        response: &SearchResponse,
        title: &str,
    ) {
        let Some(error) = response.backend_error() else {
            return;
        };
        tracing::warn!(language = %language, "Backend reported query error: {}", error.response);
        telemetry::record_backend_error(language.as_str());

        let mut options = ToastOptions::new(title);
        if let Some(msg) = error.msg {
            options = options.with_message(msg);
        }
        self.notifier.add_error(&Error::Backend(error.response), options);
    }
}

/// Routes searches to the interceptor registered for their language
#[derive(Default, Clone)]
pub struct SearchInterceptorRegistry {
    interceptors: HashMap<QueryLanguage, Arc<dyn SearchInterceptor>>,
}

impl SearchInterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the PPL, SQL and SQL async interceptors
    pub fn with_defaults(services: SearchServices, policy: MissingTimeFieldPolicy) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PplSearchInterceptor::new(services.clone(), policy)));
        registry.register(Arc::new(SqlSearchInterceptor::new(services.clone())));
        registry.register(Arc::new(SqlAsyncSearchInterceptor::new(services)));
        registry
    }

    /// Register an interceptor, replacing any previous one for its language
    pub fn register(&mut self, interceptor: Arc<dyn SearchInterceptor>) {
        self.interceptors.insert(interceptor.language(), interceptor);
    }

    pub fn get(&self, language: QueryLanguage) -> Option<Arc<dyn SearchInterceptor>> {
        self.interceptors.get(&language).cloned()
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let language = request.params.language;
        let interceptor = self.get(language).ok_or_else(|| {
            Error::InvalidRequest(format!("no interceptor registered for {}", language))
        })?;
        interceptor.search(request, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame_body, RecordingNotifier, RecordingTransport};
    use serde_json::json;

    #[test]
    fn test_language_parsing() {
        assert_eq!("ppl".parse::<QueryLanguage>().unwrap(), QueryLanguage::Ppl);
        assert_eq!("SQLAsync".parse::<QueryLanguage>().unwrap(), QueryLanguage::SqlAsync);
        assert!("kuery".parse::<QueryLanguage>().is_err());
        assert_eq!(serde_json::to_value(QueryLanguage::SqlAsync).unwrap(), json!("SQLAsync"));
    }

    #[test]
    fn test_to_hits() {
        let response = SearchResponse::from_value(json!({
            "type": "data_frame",
            "took": 4,
            "body": {
                "name": "logs",
                "fields": [
                    {"name": "host", "type": "keyword", "values": ["a", "b"]},
                    {"name": "bytes", "type": "long", "values": [10, 20]}
                ],
                "size": 2
            }
        }))
        .unwrap();
        let hits = response.to_hits().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].index.as_deref(), Some("logs"));
        assert_eq!(hits[1].source["host"], "b");
        assert_eq!(hits[1].source["bytes"], 20);
        assert_eq!(response.took, 4);
    }

    #[test]
    fn test_from_config_rejects_bad_date_format() {
        let mut config = Config::default();
        config.search.date_format = "%Y-%Q".to_string();
        let time_filter = Arc::new(FixedTimeFilter::default());
        let err = SearchServices::from_config(&config, time_filter).err().unwrap();
        assert_eq!(err.error_type(), "config");
    }

    #[test]
    fn test_hits_bounded_by_column_length() {
        let response = SearchResponse::from_value(json!({
            "type": "data_frame",
            "body": {
                "name": "logs",
                "fields": [{"name": "host", "type": "keyword", "values": ["a"]}],
                "size": 1000000000
            }
        }))
        .unwrap();
        assert_eq!(response.to_hits().unwrap().len(), 1);

        let response = SearchResponse::from_value(json!({
            "body": {"name": "logs", "fields": [], "size": 500}
        }))
        .unwrap();
        assert!(response.to_hits().unwrap().is_empty());
    }

    #[test]
    fn test_error_body_has_no_hits() {
        let response = SearchResponse::from_value(json!({
            "type": "data_frame",
            "body": {"error": {"response": "{\"reason\":\"bad\"}", "msg": "syntax error"}},
            "took": 0
        }))
        .unwrap();
        assert!(response.to_hits().unwrap().is_empty());
        let error = response.backend_error().unwrap();
        assert_eq!(error.msg.as_deref(), Some("syntax error"));
        assert!(error.response.contains("bad"));
    }

    #[test]
    fn test_bare_body_accepted() {
        let response = SearchResponse::from_value(frame_body("logs")).unwrap();
        assert_eq!(response.kind, "data_frame");
        assert!(response.backend_error().is_none());
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_language() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({"type": "data_frame", "body": frame_body("t"), "took": 1}));
        let services = SearchServices::new(transport.clone(), Arc::new(RecordingNotifier::default()));
        let registry = SearchInterceptorRegistry::with_defaults(services, MissingTimeFieldPolicy::Omit);

        let request = SearchRequest::new(QueryLanguage::Sql, "SELECT * FROM t");
        registry.search(&request, &SearchOptions::default()).await.unwrap();

        let calls = transport.requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/api/sqlql/search");
    }

    #[tokio::test]
    async fn test_registry_unknown_language() {
        let registry = SearchInterceptorRegistry::new();
        let request = SearchRequest::new(QueryLanguage::Ppl, "source=logs");
        let err = registry
            .search(&request, &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
