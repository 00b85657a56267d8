//! Query assist: natural-language question in, query string out

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cancel::{run_cancellable, CancellationCoordinator};
use crate::error::{format_error, Result};
use crate::search::QueryLanguage;
use crate::time::TimeRange;
use crate::transport::{FetchRequest, HttpTransport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAssistParams {
    pub question: String,
    pub index: String,
    pub language: QueryLanguage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAssistResponse {
    pub query: String,
    /// Time range the question implies, if the model extracted one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

/// Generates queries; at most one generation is in flight at a time
pub struct QueryAssistClient {
    transport: Arc<dyn HttpTransport>,
    path: String,
    coordinator: CancellationCoordinator,
}

impl QueryAssistClient {
    pub fn new(transport: Arc<dyn HttpTransport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            coordinator: CancellationCoordinator::new(),
        }
    }

    /// Generate a query. Starting a generation aborts the previous one.
    ///
    /// Guardrail refusals come back as `Error::ProhibitedQuery`, rate limits
    /// as `Error::Throttled`.
    pub async fn generate(&self, params: &QueryAssistParams) -> Result<QueryAssistResponse> {
        let token = self.coordinator.begin();
        let request = FetchRequest::post(self.path.clone(), serde_json::to_value(params)?);
        tracing::debug!(index = %params.index, language = %params.language, "Generating query");

        let value = run_cancellable(&token, self.transport.fetch(request, &token))
            .await
            .map_err(format_error)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Abort the generation in flight, if any
    pub fn cancel(&self) -> bool {
        self.coordinator.cancel_current()
    }

    /// Abort the outstanding generation for good; later calls fail as cancelled
    pub fn teardown(&self) {
        self.coordinator.teardown();
    }
}
