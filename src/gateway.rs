//! Top-level wiring: the capability surface a host process (the CLI binary,
//! or any other embedder) drives, assembling C1 through C12 behind one
//! handle (`spec.md` §6).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::admin::{CacheAdmin, WarmReport};
use crate::assembler::{AssembledStatus, Assembler};
use crate::cache::{CacheStats, MemoryCache};
use crate::classifier::Classifier;
use crate::config::{ConfigPatch, GatewayConfig};
use crate::cx::Cx;
use crate::error::Result;
use crate::registry::ReaderRegistry;
use crate::related::{RelatedOrders, RelatedOrdersLookup};
use crate::scheduler::Scheduler;
use crate::singleflight::MtoSingleFlight;
use crate::store::records::HistoryEntry;
use crate::store::Store;
use crate::sync::{SyncOrchestrator, SyncStatus};
use crate::telemetry::Metrics;
use crate::types::Mto;
use crate::upstream::{UpstreamClient, UpstreamQuery};

/// The assembled gateway: every component wired together, behind the
/// operations the host process actually calls (`spec.md` §6).
pub struct Gateway {
    config: Arc<RwLock<GatewayConfig>>,
    sync_config: Arc<RwLock<crate::config::SyncConfig>>,
    assembler: Arc<Assembler>,
    related: Arc<RelatedOrdersLookup>,
    orchestrator: Arc<SyncOrchestrator>,
    admin: Arc<CacheAdmin>,
    store: Arc<Store>,
    metrics: Arc<Metrics>,
}

impl Gateway {
    /// Builds every component from a loaded, validated config and an
    /// upstream backend (the real SDK binding, or `upstream::mock` for
    /// tests and the in-process demo).
    pub fn new(config: GatewayConfig, backend: Arc<dyn UpstreamQuery>) -> Result<Self> {
        let store = Arc::new(Store::open(&config.db_path)?);
        let cache = Arc::new(MemoryCache::new(
            config.memory_cache.max_size,
            std::time::Duration::from_secs(config.memory_cache.ttl_seconds),
        ));
        let single_flight = Arc::new(MtoSingleFlight::new());
        let client = Arc::new(UpstreamClient::new(backend, config.upstream.page_size));
        let registry = Arc::new(ReaderRegistry::new(client));
        let classifier = Arc::new(Classifier::from_config(&config.material_classes)?);
        let metrics = Arc::new(Metrics::default());

        let assembler = Arc::new(Assembler::new(
            store.clone(),
            cache.clone(),
            single_flight,
            registry.clone(),
            classifier,
            config.persistent_freshness_seconds,
            metrics.clone(),
        ));
        let related = Arc::new(RelatedOrdersLookup::new(registry.clone()));
        let admin = Arc::new(CacheAdmin::new(cache, store.clone(), assembler.clone()));

        let sync_config = Arc::new(RwLock::new(config.sync.clone()));
        let orchestrator = Arc::new(SyncOrchestrator::new(store.clone(), registry, sync_config.clone()));
        let shared_config = Arc::new(RwLock::new(config));

        Ok(Self {
            config: shared_config,
            sync_config,
            assembler,
            related,
            orchestrator,
            admin,
            store,
            metrics,
        })
    }

    /// Spawns the auto-sync scheduler as a background task over the same
    /// hot-reloadable sync config the orchestrator reads, so a config patch
    /// is visible to both on the next tick. The caller holds the returned
    /// `JoinHandle` for the lifetime of the process; the scheduler never
    /// returns on its own.
    #[must_use]
    pub fn spawn_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = Scheduler::new(self.orchestrator.clone(), self.sync_config.clone());
        tokio::spawn(scheduler.run())
    }

    /// `GetStatus(mto, use_cache)` (`spec.md` §4.9/§6).
    pub async fn get_status(&self, cx: &Cx, mto: &Mto, use_cache: bool) -> Result<AssembledStatus> {
        self.assembler.get_status(cx, mto, use_cache).await
    }

    /// `GetRelatedOrders(mto)` (`spec.md` §4.11/§6).
    pub async fn get_related_orders(&self, cx: &Cx, mto: &Mto) -> Result<RelatedOrders> {
        self.related.get_related_orders(cx, mto).await
    }

    /// `TriggerSync(days_back)` (`spec.md` §4.6/§6).
    pub fn trigger_sync(&self, days_back: Option<u32>) -> Result<()> {
        self.orchestrator.trigger_sync(days_back)
    }

    /// `GetSyncStatus()` (`spec.md` §4.6/§6).
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.orchestrator.status()
    }

    /// `GetSyncHistory(limit)` (`spec.md` §4.6/§6).
    pub fn sync_history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        self.store.history(limit)
    }

    /// `UpdateSyncConfig(patch)` (`spec.md` §4.6/§6). Validates the patched
    /// config as a whole, then propagates the `sync` subtree into the lock
    /// the orchestrator and scheduler both read, so the next tick or
    /// trigger sees it without a restart. A `material_classes` patch is
    /// validated and persisted in `self.config` but does not reach the
    /// already-built classifier; see `DESIGN.md`.
    pub fn update_config(&self, patch: ConfigPatch) -> Result<()> {
        let sync_changed = patch.sync.clone();
        self.config.write().apply_patch(patch)?;
        if let Some(sync) = sync_changed {
            *self.sync_config.write() = sync;
        }
        Ok(())
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.admin.stats()
    }

    pub fn cache_clear(&self) -> usize {
        self.admin.clear()
    }

    pub fn cache_invalidate(&self, mto: &str) -> bool {
        self.admin.invalidate(mto)
    }

    pub fn cache_reset_stats(&self) {
        self.admin.reset_stats();
    }

    #[must_use]
    pub fn cache_hot_mtos(&self, n: usize) -> Vec<(String, u64)> {
        self.admin.hot_mtos(n)
    }

    pub async fn cache_warm(&self, cx: &Cx, count: usize, use_hot: bool) -> Result<WarmReport> {
        self.admin.warm(cx, count, use_hot).await
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cx::CallerId;
    use crate::upstream::mock::MockUpstream;

    fn gateway() -> Gateway {
        let mut config = GatewayConfig::default();
        config.db_path = ":memory:".to_string();
        let backend = Arc::new(MockUpstream::new());
        Gateway::new(config, backend).unwrap()
    }

    #[tokio::test]
    async fn not_found_mto_surfaces_as_not_found_error() {
        let gw = gateway();
        let cx = Cx::background(CallerId::internal("test"));
        let mto = Mto::parse("AK1").unwrap();
        let err = gw.get_status(&cx, &mto, true).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn sync_status_starts_idle() {
        let gw = gateway();
        assert_eq!(gw.sync_status().state, crate::sync::SyncState::Idle);
    }

    #[test]
    fn cache_stats_start_at_zero() {
        let gw = gateway();
        let stats = gw.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }
}
