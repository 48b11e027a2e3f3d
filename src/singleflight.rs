//! Single-flight coordinator (C5): at most one assembly in flight per MTO.
//! Concurrent callers attach to the same computation and receive the same
//! result; the entry is released as soon as the computation finishes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::assembler::AssembledStatus;
use crate::error::{Error, Result};

type SharedResult = std::result::Result<AssembledStatus, SharedError>;

/// `Error` is not `Clone` (its boxed source is not); attached callers get
/// a string-rendered clone of the failure instead of the original.
#[derive(Debug, Clone)]
pub struct SharedError {
    pub message: String,
}

impl From<&Error> for SharedError {
    fn from(e: &Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Keyed-by-MTO single-flight coordinator. Lives only for the duration of
/// the in-flight computation; the entry is removed as soon as it settles,
/// so a caller arriving after completion runs a fresh computation rather
/// than replaying a stale broadcast (`spec.md` §4.5).
pub struct MtoSingleFlight {
    inflight: Mutex<HashMap<String, Arc<broadcast::Sender<SharedResult>>>>,
}

impl MtoSingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `compute` for `key` if no computation is already in flight;
    /// otherwise awaits the in-flight computation's result. Cancellation
    /// of the calling `Cx` does not cancel a computation other callers are
    /// still attached to (`spec.md` §4.5).
    pub async fn run<F>(&self, key: &str, compute: F) -> Result<AssembledStatus>
    where
        F: std::future::Future<Output = Result<AssembledStatus>>,
    {
        let maybe_sender = {
            let mut inflight = self.inflight.lock();
            if let Some(sender) = inflight.get(key) {
                Some(sender.clone())
            } else {
                let (sender, _) = broadcast::channel(1);
                inflight.insert(key.to_string(), Arc::new(sender));
                None
            }
        };

        if let Some(sender) = maybe_sender {
            let mut receiver = sender.subscribe();
            return match receiver.recv().await {
                Ok(Ok(status)) => Ok(status),
                Ok(Err(shared)) => Err(Error::internal(shared.message)),
                Err(_) => Err(Error::internal("single-flight sender dropped")),
            };
        }

        let result = compute.await;
        let sender = {
            let mut inflight = self.inflight.lock();
            inflight.remove(key)
        };
        if let Some(sender) = sender {
            let broadcasted: SharedResult = match &result {
                Ok(status) => Ok(status.clone()),
                Err(e) => Err(SharedError::from(e)),
            };
            let _ = sender.send(broadcasted);
        }
        result
    }
}

impl Default for MtoSingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataSource;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn status() -> AssembledStatus {
        AssembledStatus {
            mto: "AK1".to_string(),
            children: Vec::new(),
            customer_name: None,
            delivery_date: None,
            data_source: DataSource::Live,
            cache_age_seconds: None,
        }
    }

    #[tokio::test]
    async fn concurrent_callers_observe_one_computation() {
        let coordinator = Arc::new(MtoSingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .run("AK1", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(status())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn releases_after_completion_for_next_caller() {
        let coordinator = Arc::new(MtoSingleFlight::new());
        coordinator.run("AK1", async { Ok(status()) }).await.unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        coordinator
            .run("AK1", async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(status())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
