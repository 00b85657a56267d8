//! Cancellation tokens for in-flight searches
//!
//! Every network call made while handling one `search()` receives the same
//! [`CancellationToken`]. A [`CancellationCoordinator`] owns the token of the
//! current user action: starting a new action aborts the previous one, and
//! tearing the owner down aborts whatever is still outstanding, once.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

pub use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Run `fut` unless `token` fires first.
///
/// A token that is already cancelled wins without polling `fut`, so no
/// request is issued after cancellation.
pub async fn run_cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Owns the token of the current user action
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    current: Mutex<Option<CancellationToken>>,
    torn_down: AtomicBool,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new action, aborting the one it supersedes.
    ///
    /// After teardown the returned token is already cancelled.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if self.torn_down.load(Ordering::Acquire) {
            token.cancel();
            return token;
        }

        let previous = self.current.lock().replace(token.clone());
        if let Some(previous) = previous {
            tracing::debug!("Superseding in-flight request");
            previous.cancel();
        }
        token
    }

    /// Abort the current action, if any. Returns whether one was aborted.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Abort the outstanding action on owner teardown. Only the first call
    /// has any effect.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_current();
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Drop for CancellationCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_begin_supersedes_previous() {
        let coordinator = CancellationCoordinator::new();
        let first = coordinator.begin();
        let second = coordinator.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_teardown_cancels_once() {
        let coordinator = CancellationCoordinator::new();
        let token = coordinator.begin();
        coordinator.teardown();
        assert!(token.is_cancelled());
        assert!(coordinator.is_torn_down());

        // nothing left to cancel
        coordinator.teardown();
        assert!(!coordinator.cancel_current());
    }

    #[test]
    fn test_begin_after_teardown_is_cancelled() {
        let coordinator = CancellationCoordinator::new();
        coordinator.teardown();
        assert!(coordinator.begin().is_cancelled());
    }

    #[test]
    fn test_drop_cancels_outstanding() {
        let token = {
            let coordinator = CancellationCoordinator::new();
            coordinator.begin()
        };
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancellable_completes() {
        let token = CancellationToken::new();
        let value = run_cancellable(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_future() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = AtomicBool::new(false);
        let result = run_cancellable(&token, async {
            polled.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let result: Result<()> = run_cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
