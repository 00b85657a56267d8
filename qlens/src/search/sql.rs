//! SQL interceptor: the literal query, fetched once

use async_trait::async_trait;

use super::{
    FetchBody, QueryLanguage, SearchInterceptor, SearchOptions, SearchRequest, SearchResponse,
    SearchServices,
};
use crate::error::Result;
use crate::telemetry::SearchTimer;

pub const SQL_QUERY_ERROR_TITLE: &str = "Could not complete the SQL query";

pub struct SqlSearchInterceptor {
    services: SearchServices,
}

impl SqlSearchInterceptor {
    pub fn new(services: SearchServices) -> Self {
        Self { services }
    }

    async fn run(&self, request: &SearchRequest, options: &SearchOptions) -> Result<SearchResponse> {
        let params = &request.params;
        let body = FetchBody::new(&params.query, params.data_frame.as_ref())
            .data_source_id(params.data_source_id.as_deref());
        let response = self
            .services
            .fetch(&self.services.endpoints.sql, body, options)
            .await?;
        self.services
            .surface_backend_error(QueryLanguage::Sql, &response, SQL_QUERY_ERROR_TITLE);
        Ok(response)
    }
}

#[async_trait]
impl SearchInterceptor for SqlSearchInterceptor {
    fn language(&self) -> QueryLanguage {
        QueryLanguage::Sql
    }

    async fn search(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let timer = SearchTimer::new(QueryLanguage::Sql.as_str());
        let result = self.run(request, options).await;
        if let Ok(response) = &result {
            tracing::info!(id = request.id.as_deref().unwrap_or(""), took = response.took, "SQL search delivered");
        }
        timer.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{frame_body, RecordingNotifier, RecordingTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (SqlSearchInterceptor, Arc<RecordingTransport>, Arc<RecordingNotifier>) {
        let transport = Arc::new(RecordingTransport::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = SearchServices::new(transport.clone(), notifier.clone());
        (SqlSearchInterceptor::new(services), transport, notifier)
    }

    #[tokio::test]
    async fn test_query_passed_through_verbatim() {
        let (sql, transport, notifier) = setup();
        transport.respond(json!({"type": "data_frame", "body": frame_body("logs"), "took": 2}));

        let qs = "SELECT `host.keyword`, count(*) FROM logs GROUP BY `host.keyword`";
        let request = SearchRequest::new(QueryLanguage::Sql, qs);
        let response = sql.search(&request, &SearchOptions::default()).await.unwrap();
        assert_eq!(response.to_hits().unwrap().len(), 2);

        let calls = transport.requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/api/sqlql/search");
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["query"]["qs"], qs);
        assert_eq!(body["query"]["format"], "jdbc");
        assert!(body["df"].is_null());
        assert!(notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_notifies_and_resolves() {
        let (sql, transport, notifier) = setup();
        transport.respond(json!({
            "type": "data_frame",
            "body": {"error": {"response": "{\"reason\":\"Invalid SQL query\"}", "msg": "Invalid SQL query"}},
            "took": 0
        }));

        let request = SearchRequest::new(QueryLanguage::Sql, "SELEC * FROM logs");
        let response = sql.search(&request, &SearchOptions::default()).await.unwrap();
        assert!(response.backend_error().is_some());

        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].0, Error::Backend(ref r) if r.contains("Invalid SQL query")));
        assert_eq!(errors[0].1.title, SQL_QUERY_ERROR_TITLE);
        assert_eq!(errors[0].1.toast_message.as_deref(), Some("Invalid SQL query"));
    }

    #[tokio::test]
    async fn test_http_error_rejects() {
        let (sql, transport, notifier) = setup();
        transport.fail(Error::Http {
            status: 500,
            message: "Internal Server Error".into(),
            body: None,
        });

        let request = SearchRequest::new(QueryLanguage::Sql, "SELECT 1");
        let err = sql.search(&request, &SearchOptions::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_query_is_throttled() {
        let (sql, transport, _) = setup();
        transport.fail(Error::Http {
            status: 429,
            message: "Too Many Requests".into(),
            body: None,
        });

        let request = SearchRequest::new(QueryLanguage::Sql, "SELECT 1");
        let err = sql.search(&request, &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Throttled { status: 429, .. }));
    }
}
