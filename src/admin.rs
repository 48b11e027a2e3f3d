//! Cache administration surface (C10): stats, clear, invalidate, warm, and
//! hot-key reporting, layered over the memory cache (C4) and assembler (C9)
//! (`spec.md` §4.10).

use std::sync::Arc;

use tracing::warn;

use crate::assembler::Assembler;
use crate::cache::{CacheStats, MemoryCache};
use crate::cx::Cx;
use crate::error::Result;
use crate::store::Store;
use crate::types::Mto;

/// The outcome of a `warm(count, use_hot)` call: how many MTOs were
/// attempted and how many failed (`spec.md` §4.10, "errors are isolated
/// per MTO and do not abort the batch").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Thin administrative wrapper; holds no state of its own beyond the
/// components it delegates to.
pub struct CacheAdmin {
    cache: Arc<MemoryCache>,
    store: Arc<Store>,
    assembler: Arc<Assembler>,
}

impl CacheAdmin {
    #[must_use]
    pub fn new(cache: Arc<MemoryCache>, store: Arc<Store>, assembler: Arc<Assembler>) -> Self {
        Self {
            cache,
            store,
            assembler,
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) -> usize {
        self.cache.clear()
    }

    pub fn invalidate(&self, mto: &str) -> bool {
        self.cache.invalidate(mto)
    }

    pub fn reset_stats(&self) {
        self.cache.reset_stats();
    }

    #[must_use]
    pub fn hot_mtos(&self, n: usize) -> Vec<(String, u64)> {
        self.cache.hot_mtos(n)
    }

    /// Re-primes the memory cache for `count` MTOs, drawn from the current
    /// hot-key histogram when `use_hot` is set, or from the most recently
    /// synced MTOs in the persistent store otherwise. Each MTO is assembled
    /// independently; a single failure does not abort the batch.
    pub async fn warm(&self, cx: &Cx, count: usize, use_hot: bool) -> Result<WarmReport> {
        let candidates = if use_hot {
            self.cache
                .hot_mtos(count)
                .into_iter()
                .map(|(mto, _)| mto)
                .collect::<Vec<_>>()
        } else {
            self.store.recently_synced_mtos(count as u32)?
        };

        let attempted = candidates.len();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for raw in candidates {
            let mto = match Mto::parse(&raw) {
                Ok(m) => m,
                Err(e) => {
                    warn!(mto = %raw, error = %e, "warm: skipping unparseable MTO");
                    failed += 1;
                    continue;
                }
            };
            match self.assembler.get_status(cx, &mto, true).await {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    warn!(mto = %raw, error = %e, "warm: assembly failed for one MTO");
                    failed += 1;
                }
            }
        }

        Ok(WarmReport {
            attempted,
            succeeded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::cx::CallerId;
    use crate::registry::ReaderRegistry;
    use crate::singleflight::MtoSingleFlight;
    use crate::telemetry::Metrics;
    use crate::upstream::mock::MockUpstream;
    use crate::upstream::UpstreamClient;
    use std::time::Duration;

    fn harness() -> (CacheAdmin, Arc<MemoryCache>) {
        let mock = MockUpstream::new();
        let client = Arc::new(UpstreamClient::new(Arc::new(mock), 2000));
        let registry = Arc::new(ReaderRegistry::new(client));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cache = Arc::new(MemoryCache::new(100, Duration::from_secs(300)));
        let single_flight = Arc::new(MtoSingleFlight::new());
        let classifier = Arc::new(Classifier::seeded());
        let metrics = Arc::new(Metrics::default());
        let assembler = Arc::new(Assembler::new(
            store.clone(),
            cache.clone(),
            single_flight,
            registry,
            classifier,
            3600,
            metrics,
        ));
        (CacheAdmin::new(cache.clone(), store, assembler), cache)
    }

    #[tokio::test]
    async fn warm_with_no_candidates_is_a_no_op() {
        let (admin, _cache) = harness();
        let cx = Cx::background(CallerId::internal("test"));
        let report = admin.warm(&cx, 5, false).await.unwrap();
        assert_eq!(report.attempted, 0);
    }

    #[test]
    fn invalidate_reports_presence() {
        let (admin, cache) = harness();
        assert!(!admin.invalidate("AK1"));
        cache.insert(
            "AK1".to_string(),
            crate::assembler::AssembledStatus {
                mto: "AK1".to_string(),
                children: Vec::new(),
                customer_name: None,
                delivery_date: None,
                data_source: crate::types::DataSource::Live,
                cache_age_seconds: None,
            },
        );
        assert!(admin.invalidate("AK1"));
    }
}
