//! SQL async interceptor: submits a query job.
//!
//! The job submission is a single request/response. Polling for completion
//! is left to the caller.

use async_trait::async_trait;

use super::{
    FetchBody, QueryLanguage, SearchInterceptor, SearchOptions, SearchRequest, SearchResponse,
    SearchServices,
};
use crate::error::Result;
use crate::telemetry::SearchTimer;

pub const SQL_ASYNC_QUERY_ERROR_TITLE: &str = "Could not complete the SQL async query";

pub struct SqlAsyncSearchInterceptor {
    services: SearchServices,
}

impl SqlAsyncSearchInterceptor {
    pub fn new(services: SearchServices) -> Self {
        Self { services }
    }

    async fn run(&self, request: &SearchRequest, options: &SearchOptions) -> Result<SearchResponse> {
        let params = &request.params;
        let body = FetchBody::new(&params.query, params.data_frame.as_ref())
            .data_source(params.index.as_deref())
            .data_source_id(params.data_source_id.as_deref());
        let response = self
            .services
            .fetch(&self.services.endpoints.sql_async, body, options)
            .await?;
        self.services.surface_backend_error(
            QueryLanguage::SqlAsync,
            &response,
            SQL_ASYNC_QUERY_ERROR_TITLE,
        );
        Ok(response)
    }
}

#[async_trait]
impl SearchInterceptor for SqlAsyncSearchInterceptor {
    fn language(&self) -> QueryLanguage {
        QueryLanguage::SqlAsync
    }

    async fn search(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let timer = SearchTimer::new(QueryLanguage::SqlAsync.as_str());
        let result = self.run(request, options).await;
        if let Ok(response) = &result {
            tracing::info!(id = request.id.as_deref().unwrap_or(""), "SQL async job submitted");
            tracing::debug!(body = %response.body, "Job submission response");
        }
        timer.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::test_support::{RecordingNotifier, RecordingTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (SqlAsyncSearchInterceptor, Arc<RecordingTransport>, Arc<RecordingNotifier>) {
        let transport = Arc::new(RecordingTransport::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = SearchServices::new(transport.clone(), notifier.clone());
        (SqlAsyncSearchInterceptor::new(services), transport, notifier)
    }

    #[tokio::test]
    async fn test_submits_job_with_data_source() {
        let (sql_async, transport, _) = setup();
        transport.respond(json!({
            "type": "data_frame",
            "body": {"name": "mys3", "fields": [], "meta": {"queryId": "q-1", "sessionId": "s-1"}},
            "took": 1
        }));

        let request =
            SearchRequest::new(QueryLanguage::SqlAsync, "SELECT * FROM mys3.default.http_logs")
                .with_index("mys3");
        sql_async
            .search(&request, &SearchOptions::default())
            .await
            .unwrap();

        let calls = transport.requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/api/sqlasyncql/jobs");
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["dataSource"], "mys3");
        assert_eq!(body["query"]["qs"], "SELECT * FROM mys3.default.http_logs");
    }

    #[tokio::test]
    async fn test_backend_error_title() {
        let (sql_async, transport, notifier) = setup();
        transport.respond(json!({
            "type": "data_frame",
            "body": {"error": {"response": "datasource not found", "msg": "datasource not found"}},
            "took": 0
        }));

        let request = SearchRequest::new(QueryLanguage::SqlAsync, "SELECT 1").with_index("nope");
        sql_async
            .search(&request, &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(notifier.errors()[0].1.title, SQL_ASYNC_QUERY_ERROR_TITLE);
    }

    #[tokio::test]
    async fn test_cancelled_job_not_submitted() {
        let (sql_async, transport, _) = setup();
        let token = CancellationToken::new();
        token.cancel();

        let request = SearchRequest::new(QueryLanguage::SqlAsync, "SELECT 1");
        let err = sql_async
            .search(&request, &SearchOptions::new(token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }
}
