//! User-facing error notifications

use crate::error::Error;

/// Toast shown alongside an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastOptions {
    pub title: String,
    /// Detail line; the error's own message is used when absent
    pub toast_message: Option<String>,
}

impl ToastOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            toast_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.toast_message = Some(message.into());
        self
    }
}

/// Surfaces errors to whoever is watching the search
pub trait Notifier: Send + Sync {
    fn add_error(&self, error: &Error, options: ToastOptions);
}

/// Logs notifications instead of drawing them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn add_error(&self, error: &Error, options: ToastOptions) {
        let message = options
            .toast_message
            .unwrap_or_else(|| error.to_string());
        tracing::error!(
            title = %options.title,
            error_type = error.error_type(),
            "{}",
            message
        );
    }
}
