//! HTTP seam between the interceptors and the query backend

pub mod http;

pub use http::ReqwestTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One backend call: a path relative to the backend base URL and a JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Issues backend requests.
///
/// Implementations must honor `cancel`: a fired token aborts the request
/// with [`Error::Cancelled`]. Non-2xx answers become [`Error::Http`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(&self, request: FetchRequest, cancel: &CancellationToken) -> Result<Value>;
}

/// Map a non-2xx answer to [`Error::Http`], preferring the `message` the
/// backend put in its JSON body.
pub(crate) fn http_error(status: u16, text: &str) -> Error {
    let body: Option<Value> = serde_json::from_str(text).ok();
    let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if text.is_empty() {
                format!("request failed with status {}", status)
            } else {
                text.to_string()
            }
        });
    Error::Http {
        status,
        message,
        body,
    }
}
