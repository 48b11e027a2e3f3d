//! Periodic sync orchestrator (C6): date-chunked fan-out from the upstream
//! readers (C2) into the persistent store (C3), mutually exclusive across
//! concurrent triggers, with retry, progress tracking, and a history log
//! (`spec.md` §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::cx::{CallerId, Cx};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::ReaderRegistry;
use crate::store::records::{
    MaterialPickingRow, ProductionBomRow, ProductionOrderRow, ProductionReceiptRow,
    PurchaseOrderRow, PurchaseReceiptRow, SalesDeliveryRow, SalesOrderRow, SubcontractOrderRow,
};
use crate::store::Store;

/// The sync run's state machine (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A snapshot of the orchestrator's progress, returned by `GetSyncStatus`.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub state: SyncState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub days_back: u32,
    pub chunks_total: u32,
    pub chunks_completed: u32,
    pub records_synced: u64,
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            started_at: None,
            finished_at: None,
            days_back: 0,
            chunks_total: 0,
            chunks_completed: 0,
            records_synced: 0,
            last_error: None,
        }
    }
}

struct ChunkOutcome {
    records_synced: u64,
    had_query_error: bool,
}

/// Orchestrates date-chunked fan-out syncs. Mutual exclusion is enforced by
/// a single `AtomicBool`: a second `trigger_sync` call while one is running
/// fails fast with `SyncInProgress` rather than queuing (`spec.md` §4.6).
pub struct SyncOrchestrator {
    store: Arc<Store>,
    registry: Arc<ReaderRegistry>,
    config: Arc<RwLock<SyncConfig>>,
    status: Arc<Mutex<SyncStatus>>,
    running: Arc<AtomicBool>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(store: Arc<Store>, registry: Arc<ReaderRegistry>, config: Arc<RwLock<SyncConfig>>) -> Self {
        Self {
            store,
            registry,
            config,
            status: Arc::new(Mutex::new(SyncStatus::default())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    /// Starts a sync run covering the last `days_back` days (or the
    /// configured default), as a detached background task. Fails
    /// immediately with `SyncInProgress` if a run is already in flight.
    pub fn trigger_sync(self: &Arc<Self>, days_back: Option<u32>) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::sync_in_progress());
        }

        let (manual_default, min_days, max_days) = {
            let cfg = self.config.read();
            (
                cfg.manual_sync.default_days,
                cfg.manual_sync.min_days,
                cfg.manual_sync.max_days,
            )
        };
        let days_back = days_back.unwrap_or(manual_default);
        if days_back < min_days || days_back > max_days {
            self.running.store(false, Ordering::SeqCst);
            return Err(Error::validation(format!(
                "days_back {days_back} out of range [{min_days}, {max_days}]"
            )));
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(days_back).await;
        });
        Ok(())
    }

    async fn run(self: Arc<Self>, days_back: u32) {
        let started_at = Utc::now();
        {
            let mut status = self.status.lock();
            *status = SyncStatus {
                state: SyncState::Running,
                started_at: Some(started_at),
                finished_at: None,
                days_back,
                chunks_total: 0,
                chunks_completed: 0,
                records_synced: 0,
                last_error: None,
            };
        }

        let (chunk_days, parallel_chunks, retry_count) = {
            let cfg = self.config.read();
            (
                cfg.performance.chunk_days,
                cfg.performance.parallel_chunks,
                cfg.performance.retry_count,
            )
        };

        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(days_back));
        let chunks = date_chunks(start, end, chunk_days);
        self.status.lock().chunks_total = chunks.len() as u32;

        let semaphore = Arc::new(Semaphore::new(parallel_chunks.max(1) as usize));
        let cx = Cx::background(CallerId::internal("sync-orchestrator"));

        let mut any_query_error = false;
        let mut total_records = 0u64;
        let mut handles = Vec::new();
        for (chunk_start, chunk_end) in chunks {
            let semaphore = semaphore.clone();
            let this = Arc::clone(&self);
            let cx = cx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                this.sync_chunk(&cx, &chunk_start, &chunk_end, retry_count).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(outcome)) => {
                    total_records += outcome.records_synced;
                    any_query_error |= outcome.had_query_error;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "sync chunk failed terminally");
                    any_query_error = true;
                }
                Err(e) => {
                    warn!(error = %e, "sync chunk task panicked");
                    any_query_error = true;
                }
            }
            let mut status = self.status.lock();
            status.chunks_completed += 1;
            status.records_synced = total_records;
        }

        let finished_at = Utc::now();
        let final_state = if any_query_error {
            SyncState::Failed
        } else {
            SyncState::Completed
        };

        {
            let mut status = self.status.lock();
            status.state = final_state;
            status.finished_at = Some(finished_at);
            status.records_synced = total_records;
            status.last_error = any_query_error.then(|| "one or more chunks reported an upstream query error".to_string());
        }

        let history_status = if any_query_error { "partial" } else { "completed" };
        let error_message = any_query_error.then_some("one or more chunks reported an upstream query error");
        if let Err(e) = self
            .store
            .append_history(started_at, finished_at, history_status, days_back, total_records, error_message)
        {
            warn!(error = %e, "failed to append sync history entry");
        }
        if !any_query_error {
            if let Err(e) = self
                .store
                .record_sync_window(&start.format("%Y-%m-%d").to_string(), &end.format("%Y-%m-%d").to_string(), finished_at)
            {
                warn!(error = %e, "failed to record sync window");
            }
        }

        info!(days_back, total_records, state = final_state.as_str(), "sync run finished");
        self.running.store(false, Ordering::SeqCst);
    }

    async fn sync_chunk(
        &self,
        cx: &Cx,
        start: &str,
        end: &str,
        retry_count: u32,
    ) -> Result<ChunkOutcome> {
        let synced_at = Utc::now();
        let mut records_synced = 0u64;
        let mut had_query_error = false;

        macro_rules! sync_form {
            ($reader:expr, $row_ty:ty, $upsert:ident) => {{
                match fetch_with_retry(retry_count, || {
                    let reader = $reader;
                    async move { reader.fetch_by_date_range(cx, start, end).await }
                })
                .await
                {
                    Ok(records) => {
                        let rows: Vec<$row_ty> = records.iter().map(<$row_ty>::from).collect();
                        match self.store.$upsert(&rows, synced_at) {
                            Ok(n) => records_synced += n as u64,
                            Err(e) => {
                                warn!(error = %e, "chunk upsert failed");
                                had_query_error = true;
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::UpstreamQueryError => {
                        warn!(error = %e, "chunk reader reported a terminal query error");
                        had_query_error = true;
                    }
                    Err(e) => return Err(e),
                }
            }};
        }

        sync_form!(&self.registry.production_order, ProductionOrderRow, upsert_production_orders);
        sync_form!(&self.registry.production_bom, ProductionBomRow, upsert_production_bom);
        sync_form!(&self.registry.production_receipt, ProductionReceiptRow, upsert_production_receipts);
        sync_form!(&self.registry.purchase_order, PurchaseOrderRow, upsert_purchase_orders);
        sync_form!(&self.registry.purchase_receipt, PurchaseReceiptRow, upsert_purchase_receipts);
        sync_form!(&self.registry.subcontract_order, SubcontractOrderRow, upsert_subcontracting_orders);
        sync_form!(&self.registry.material_picking, MaterialPickingRow, upsert_material_picking);
        sync_form!(&self.registry.sales_delivery, SalesDeliveryRow, upsert_sales_delivery);
        sync_form!(&self.registry.sales_order, SalesOrderRow, upsert_sales_orders);

        Ok(ChunkOutcome {
            records_synced,
            had_query_error,
        })
    }
}

async fn fetch_with_retry<T, F, Fut>(retry_count: u32, call: F) -> Result<Vec<T>>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T>>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.kind() == ErrorKind::UpstreamUnavailable && attempt < retry_count => {
                attempt += 1;
                let backoff_ms = 100u64 * u64::from(attempt);
                sleep(std::time::Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Splits `[start, end]` (inclusive) into consecutive `chunk_days`-wide
/// windows.
fn date_chunks(
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
    chunk_days: u32,
) -> Vec<(String, String)> {
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let chunk_end = (cursor + ChronoDuration::days(i64::from(chunk_days) - 1)).min(end);
        chunks.push((cursor.format("%Y-%m-%d").to_string(), chunk_end.format("%Y-%m-%d").to_string()));
        cursor = chunk_end + ChronoDuration::days(1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_chunks_covers_the_full_range_without_gaps() {
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let chunks = date_chunks(start, end, 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], ("2026-01-01".to_string(), "2026-01-03".to_string()));
        assert_eq!(chunks.last().unwrap().1, "2026-01-10".to_string());
    }

    #[test]
    fn single_day_range_yields_one_chunk() {
        let d = chrono::NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let chunks = date_chunks(d, d, 7);
        assert_eq!(chunks, vec![("2026-03-05".to_string(), "2026-03-05".to_string())]);
    }

    #[tokio::test]
    async fn trigger_sync_rejects_concurrent_runs() {
        use crate::config::GatewayConfig;
        use crate::upstream::mock::MockUpstream;
        use crate::upstream::UpstreamClient;

        let mock = MockUpstream::new();
        mock.set_delay(std::time::Duration::from_millis(50));
        let client = Arc::new(UpstreamClient::new(Arc::new(mock), 2000));
        let registry = Arc::new(ReaderRegistry::new(client));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = Arc::new(RwLock::new(GatewayConfig::default().sync));
        let orchestrator = Arc::new(SyncOrchestrator::new(store, registry, config));

        orchestrator.trigger_sync(Some(1)).unwrap();
        let second = orchestrator.trigger_sync(Some(1));
        assert!(second.is_err());
    }
}
