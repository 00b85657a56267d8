use thiserror::Error;

/// Marker the query-assist backend puts in a 400 body when a guardrail model
/// refused the question.
pub const GUARDRAILS_TRIGGERED: &str = "guardrails triggered";

/// Message shown instead of the backend's text for rate-limited requests.
pub const THROTTLED_MESSAGE: &str =
    "Request is throttled. Try again later or contact your administrator";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("{message}")]
    Throttled {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Prohibited query: {0}")]
    ProhibitedQuery(String),

    #[error("No time field found in schema of '{0}'")]
    MissingTimeField(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    #[error("Invalid date math expression: {0}")]
    DateMath(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Http { .. } => "http",
            Error::Cancelled => "cancelled",
            Error::Backend(_) => "backend",
            Error::Throttled { .. } => "throttled",
            Error::ProhibitedQuery(_) => "prohibited_query",
            Error::MissingTimeField(_) => "missing_time_field",
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidAggregation(_) => "invalid_aggregation",
            Error::DateMath(_) => "date_math",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
        }
    }

    /// HTTP status carried by the error, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } | Error::Throttled { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Error::Http {
                status: status.as_u16(),
                message: err.to_string(),
                body: None,
            }
        } else {
            Error::Transport(err.to_string())
        }
    }
}

/// Rewrite an error into the shape shown to users.
///
/// Rate-limited responses get a generic message (status and body are kept),
/// guardrail refusals become [`Error::ProhibitedQuery`] so callers can show a
/// dedicated callout. Everything else passes through untouched.
pub fn format_error(err: Error) -> Error {
    match err {
        Error::Http {
            status: 429, body, ..
        } => Error::Throttled {
            status: 429,
            message: THROTTLED_MESSAGE.to_string(),
            body,
        },
        Error::Http {
            status: 400,
            message,
            ..
        } if message.contains(GUARDRAILS_TRIGGERED) => Error::ProhibitedQuery(message),
        other => other,
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(status: u16, message: &str) -> Error {
        Error::Http {
            status,
            message: message.to_string(),
            body: Some(json!({ "statusCode": status, "message": message })),
        }
    }

    #[test]
    fn test_throttled_message_rewritten() {
        let err = format_error(http(429, "Too Many Requests"));
        match err {
            Error::Throttled {
                status,
                message,
                body,
            } => {
                assert_eq!(status, 429);
                assert_eq!(message, THROTTLED_MESSAGE);
                assert_eq!(body.unwrap()["message"], "Too Many Requests");
            }
            other => panic!("expected throttled, got {other:?}"),
        }
    }

    #[test]
    fn test_guardrails_become_prohibited() {
        let err = format_error(http(400, "Bad request: guardrails triggered for input"));
        assert!(matches!(err, Error::ProhibitedQuery(ref m) if m.contains("guardrails")));
        assert_eq!(err.error_type(), "prohibited_query");
    }

    #[test]
    fn test_plain_400_passes_through() {
        let err = format_error(http(400, "syntax error near 'sourc'"));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.error_type(), "http");
    }

    #[test]
    fn test_non_http_errors_untouched() {
        assert!(format_error(Error::Cancelled).is_cancelled());
        let err = format_error(Error::Transport("connection reset".into()));
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }
}
