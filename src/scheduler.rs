//! Auto-sync scheduler (C7): a wall-clock ticker that fires a sync the first
//! time each `HH:MM` entry in `sync.auto_sync.schedule` is reached, re-reading
//! the hot-reloadable config on every tick (`spec.md` §4.7).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Local, Timelike};
use parking_lot::RwLock;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::config::{parse_hhmm, SyncConfig};
use crate::sync::SyncOrchestrator;

const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Drives `SyncOrchestrator::trigger_sync` off `sync.auto_sync.schedule`.
/// Each configured entry fires at most once per calendar day; a schedule
/// edit (via `UpdateSyncConfig`) takes effect on the next tick, no restart
/// needed (`spec.md` §4.7).
pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    config: Arc<RwLock<SyncConfig>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: Arc<RwLock<SyncConfig>>) -> Self {
        Self { orchestrator, config }
    }

    /// Runs the ticker loop. Never returns; spawn it as a background task.
    pub async fn run(self) {
        let mut ticker = interval(TICK_INTERVAL);
        let mut fired_today = BTreeSet::new();
        let mut last_date = Local::now().date_naive();

        loop {
            ticker.tick().await;
            let now = Local::now();
            if now.date_naive() != last_date {
                fired_today.clear();
                last_date = now.date_naive();
            }
            self.tick_once(now, &mut fired_today);
        }
    }

    fn tick_once(&self, now: DateTime<Local>, fired_today: &mut BTreeSet<(u32, u32)>) {
        let (enabled, schedule, days_back) = {
            let cfg = self.config.read();
            (
                cfg.auto_sync.enabled,
                cfg.auto_sync.schedule.clone(),
                cfg.auto_sync.days_back,
            )
        };
        if !enabled {
            return;
        }

        for (hour, minute) in due_entries((now.hour(), now.minute()), &schedule, fired_today) {
            info!(hour, minute, "auto-sync schedule entry due, triggering sync");
            if let Err(e) = self.orchestrator.trigger_sync(Some(days_back)) {
                warn!(hour, minute, error = %e, "auto-sync trigger failed");
            }
        }
    }
}

/// The entries in `schedule` that match `now_hm` and have not already fired
/// today, marking each as fired. Unparseable entries are skipped rather than
/// failing the tick; `GatewayConfig::validate` is what should have caught
/// those at load time.
fn due_entries(now_hm: (u32, u32), schedule: &[String], fired_today: &mut BTreeSet<(u32, u32)>) -> Vec<(u32, u32)> {
    let mut due = Vec::new();
    for entry in schedule {
        let hm = match parse_hhmm(entry) {
            Ok(hm) => hm,
            Err(e) => {
                warn!(entry = %entry, error = %e, "skipping unparseable auto-sync schedule entry");
                continue;
            }
        };
        if hm == now_hm && fired_today.insert(hm) {
            due.push(hm);
        }
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_each_entry_once_per_day() {
        let schedule = vec!["09:00".to_string(), "12:00".to_string()];
        let mut fired = BTreeSet::new();
        assert_eq!(due_entries((9, 0), &schedule, &mut fired), vec![(9, 0)]);
        assert!(due_entries((9, 0), &schedule, &mut fired).is_empty());
        assert_eq!(due_entries((12, 0), &schedule, &mut fired), vec![(12, 0)]);
    }

    #[test]
    fn skips_unparseable_entries() {
        let schedule = vec!["not-a-time".to_string()];
        let mut fired = BTreeSet::new();
        assert!(due_entries((9, 0), &schedule, &mut fired).is_empty());
    }

    #[test]
    fn non_matching_minute_does_not_fire() {
        let schedule = vec!["09:00".to_string()];
        let mut fired = BTreeSet::new();
        assert!(due_entries((9, 1), &schedule, &mut fired).is_empty());
    }
}
