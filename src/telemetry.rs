//! Structured logging setup and the counter/gauge primitives the cache,
//! sync orchestrator, and admin surface share for stats reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. Idempotent-ish: a second
/// call is a no-op error swallowed by the caller, matching the usual
/// "call once at process start, tests may call it repeatedly" pattern.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// A named, labelled monotonic counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicI64,
    labels: Mutex<HashMap<String, String>>,
}

impl Counter {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicI64::new(0),
            labels: Mutex::new(HashMap::new()),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }

    pub fn set_label(&self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.lock().insert(key.into(), value.into());
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.get())
    }
}

/// A named gauge: a value that moves up and down, unlike [`Counter`].
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    value: AtomicI64,
}

impl Gauge {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicI64::new(0),
        }
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.get())
    }
}

/// The counters and gauges shared across the cache, sync orchestrator,
/// and admin surface, so `CacheStats`/`GetSyncStatus` read one accounting
/// primitive instead of duplicating ad hoc integers.
#[derive(Debug)]
pub struct Metrics {
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub sync_records_synced: Counter,
    pub sync_failures: Counter,
    pub upstream_retries: Counter,
    pub inflight_assemblies: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            cache_hits: Counter::new("cache_hits"),
            cache_misses: Counter::new("cache_misses"),
            sync_records_synced: Counter::new("sync_records_synced"),
            sync_failures: Counter::new("sync_failures"),
            upstream_retries: Counter::new("upstream_retries"),
            inflight_assemblies: Gauge::new("inflight_assemblies"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments_and_resets() {
        let counter = Counter::new("test");
        counter.increment();
        counter.add(4);
        assert_eq!(counter.get(), 5);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn gauge_tracks_up_and_down() {
        let gauge = Gauge::new("test");
        gauge.inc();
        gauge.inc();
        gauge.dec();
        assert_eq!(gauge.get(), 1);
    }
}
