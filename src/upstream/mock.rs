//! An in-memory `UpstreamQuery` backend for tests and local demos.
//!
//! Records are seeded per form id and returned verbatim, filtered only by
//! the equality/date-range predicates the core actually sends; this is
//! deliberately not a faithful RPC emulator, just enough to drive C1/C2/C9
//! without a real ERP SDK binding.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Filter, QueryParams, RawRecord, UpstreamQuery};
use crate::cx::Cx;
use crate::error::Result;

#[derive(Default)]
struct State {
    records: std::collections::HashMap<String, Vec<RawRecord>>,
    artificial_delay: Option<std::time::Duration>,
    calls: u32,
}

/// A mock `UpstreamQuery` backend, seeded per form id.
#[derive(Clone)]
pub struct MockUpstream {
    state: Arc<Mutex<State>>,
}

impl MockUpstream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Replaces the record set returned for `form_id`.
    pub fn seed(&self, form_id: &str, records: Vec<RawRecord>) {
        self.state.lock().records.insert(form_id.to_string(), records);
    }

    /// Injects a fixed delay before every `query` call returns, to exercise
    /// single-flight coalescing and cancellation under timeout.
    pub fn set_delay(&self, delay: std::time::Duration) {
        self.state.lock().artificial_delay = Some(delay);
    }

    /// Total number of `query` calls observed so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.state.lock().calls
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(record: &RawRecord, filter: &Filter) -> bool {
    match filter {
        Filter::Equals { field, value } => record
            .get(field)
            .and_then(|v| v.as_str())
            .is_some_and(|v| v == value),
        Filter::DateRange { field, start, end } => record
            .get(field)
            .and_then(|v| v.as_str())
            .is_some_and(|v| v >= start.as_str() && v <= end.as_str()),
    }
}

#[async_trait]
impl UpstreamQuery for MockUpstream {
    async fn query(&self, _cx: &Cx, params: QueryParams) -> Result<Vec<RawRecord>> {
        let delay = {
            let mut state = self.state.lock();
            state.calls += 1;
            state.artificial_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        let all = state.records.get(&params.form_id).cloned().unwrap_or_default();
        let filtered: Vec<RawRecord> = all
            .into_iter()
            .filter(|r| matches(r, &params.filter))
            .collect();
        let start = params.offset as usize;
        let end = (start + params.limit as usize).min(filtered.len());
        if start >= filtered.len() {
            return Ok(Vec::new());
        }
        Ok(filtered[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cx::CallerId;

    #[tokio::test]
    async fn filters_by_equality() {
        let mock = MockUpstream::new();
        let mut a = RawRecord::new();
        a.insert("mto".to_string(), serde_json::json!("AK1"));
        let mut b = RawRecord::new();
        b.insert("mto".to_string(), serde_json::json!("AK2"));
        mock.seed("production-order", vec![a, b]);

        let cx = Cx::background(CallerId::internal("test"));
        let result = mock
            .query(
                &cx,
                QueryParams {
                    form_id: "production-order".to_string(),
                    fields: vec!["mto".to_string()],
                    filter: Filter::Equals {
                        field: "mto".to_string(),
                        value: "AK1".to_string(),
                    },
                    offset: 0,
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
    }
}
