//! Per-call capability context.
//!
//! `Cx` is threaded through every upstream- or store-touching call. It
//! carries the caller's deadline and cancellation state so cancellation is
//! an explicit protocol rather than a silent drop: a reader checks
//! [`Cx::checkpoint`] before and after each suspension point and returns
//! `upstream_unavailable` once the deadline has elapsed, instead of
//! blocking past it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Identity of the caller on whose behalf a call is running.
///
/// The core receives this already authenticated (`spec.md` §1); it never
/// mints or verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(pub String);

impl CallerId {
    /// An internal caller (the scheduler, a cache-warm pass, ...).
    #[must_use]
    pub fn internal(label: &str) -> Self {
        Self(format!("internal:{label}"))
    }
}

/// A per-call context carrying a deadline and cancellation flag.
///
/// Cloning a `Cx` shares the same cancellation flag: cancelling one handle
/// cancels every clone, matching the "attach to the in-flight computation"
/// semantics the single-flight coordinator (C5) relies on.
#[derive(Debug, Clone)]
pub struct Cx {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    caller: CallerId,
}

impl Cx {
    /// Creates a context with no deadline, for internal callers (sync
    /// orchestrator chunks, cache warming) that are not bound by a
    /// per-request timeout.
    #[must_use]
    pub fn background(caller: CallerId) -> Self {
        Self {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            caller,
        }
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(caller: CallerId, timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
            caller,
        }
    }

    /// The caller this context was created for.
    #[must_use]
    pub fn caller(&self) -> &CallerId {
        &self.caller
    }

    /// Requests cancellation. Visible to every clone of this `Cx`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `Ok(())` if the context is still live; `Err` once cancelled or past
    /// its deadline. Call this before and after suspension points.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Error::upstream_unavailable("call cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::upstream_unavailable("deadline elapsed"));
            }
        }
        Ok(())
    }

    /// Remaining time until the deadline, or `None` if there is none.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Runs `fut` under this context's deadline, if any, mapping a timeout
    /// into `upstream_unavailable`.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.checkpoint()?;
        match self.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, fut).await?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkpoint_fails_after_cancel() {
        let cx = Cx::background(CallerId::internal("test"));
        assert!(cx.checkpoint().is_ok());
        cx.cancel();
        assert!(cx.checkpoint().is_err());
    }

    #[tokio::test]
    async fn checkpoint_fails_after_deadline() {
        let cx = Cx::with_timeout(CallerId::internal("test"), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cx.checkpoint().is_err());
    }

    #[tokio::test]
    async fn clone_shares_cancellation() {
        let cx = Cx::background(CallerId::internal("test"));
        let clone = cx.clone();
        clone.cancel();
        assert!(cx.checkpoint().is_err());
    }

    #[tokio::test]
    async fn run_times_out() {
        let cx = Cx::with_timeout(CallerId::internal("test"), Duration::from_millis(10));
        let result = cx
            .run(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .await;
        assert!(result.is_err());
    }
}
