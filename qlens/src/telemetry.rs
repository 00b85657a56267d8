//! Logging setup and search metrics
//!
//! Metrics are emitted through the `metrics` facade; nothing is recorded
//! unless the embedding application installs a recorder.

use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level and `LOG_FORMAT` the configured
/// format (`pretty` or `json`).
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", config.log_level, e)))?;

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {}", e)))
}

/// Record one request sent to a backend endpoint
pub fn record_backend_fetch(endpoint: &str, status: &str) {
    metrics::counter!(
        "qlens_backend_fetches_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record a completed search
pub fn record_search_success(language: &str, duration: Duration) {
    metrics::counter!(
        "qlens_search_requests_total",
        "language" => language.to_string(),
        "status" => "ok",
    )
    .increment(1);

    metrics::histogram!(
        "qlens_search_duration_seconds",
        "language" => language.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a failed search
pub fn record_search_error(language: &str, error_type: &str) {
    metrics::counter!(
        "qlens_search_requests_total",
        "language" => language.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "qlens_search_errors_total",
        "language" => language.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record a backend error surfaced to the user inside a successful response
pub fn record_backend_error(language: &str) {
    metrics::counter!(
        "qlens_backend_errors_total",
        "language" => language.to_string(),
    )
    .increment(1);
}

/// Times one search and records the outcome
pub struct SearchTimer {
    language: &'static str,
    start: Instant,
}

impl SearchTimer {
    pub fn new(language: &'static str) -> Self {
        Self {
            language,
            start: Instant::now(),
        }
    }

    /// Record the outcome and hand the result back
    pub fn finish<T>(self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => record_search_success(self.language, self.start.elapsed()),
            Err(e) => record_search_error(self.language, e.error_type()),
        }
        result
    }
}
