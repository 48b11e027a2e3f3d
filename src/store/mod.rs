//! Persistent store (C3): one SQLite table per upstream form plus
//! `sync_history` and `sync_progress` (C12), WAL-enabled so readers never
//! block behind the orchestrator's writes.

pub mod records;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::types::Mto;
use records::{
    MaterialPickingRow, ProductionBomRow, ProductionOrderRow, ProductionReceiptRow,
    PurchaseOrderRow, PurchaseReceiptRow, SalesDeliveryRow, SalesOrderRow, SubcontractOrderRow,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS production_orders (
    bill_no TEXT NOT NULL,
    mto TEXT NOT NULL,
    workshop TEXT NOT NULL,
    material_code TEXT NOT NULL,
    material_name TEXT NOT NULL,
    specification TEXT,
    qty TEXT NOT NULL,
    status TEXT NOT NULL,
    create_date TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(bill_no)
);
CREATE INDEX IF NOT EXISTS idx_production_orders_mto ON production_orders(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS production_bom (
    mo_bill_no TEXT NOT NULL,
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    material_type INTEGER NOT NULL,
    need_qty TEXT NOT NULL,
    picked_qty TEXT NOT NULL,
    no_picked_qty TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(mo_bill_no, material_code, aux_prop_id)
);
CREATE INDEX IF NOT EXISTS idx_production_bom_mto ON production_bom(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS production_receipts (
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    real_qty TEXT NOT NULL,
    must_qty TEXT NOT NULL,
    mo_bill_no TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(mto, material_code, aux_prop_id)
);
CREATE INDEX IF NOT EXISTS idx_production_receipts_mto ON production_receipts(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS purchase_orders (
    bill_no TEXT NOT NULL,
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    order_qty TEXT NOT NULL,
    stock_in_qty TEXT NOT NULL,
    remain_stock_in_qty TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(bill_no, material_code, aux_prop_id)
);
CREATE INDEX IF NOT EXISTS idx_purchase_orders_mto ON purchase_orders(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS purchase_receipts (
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    real_qty TEXT NOT NULL,
    must_qty TEXT NOT NULL,
    bill_type TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(mto, material_code, aux_prop_id, bill_type)
);
CREATE INDEX IF NOT EXISTS idx_purchase_receipts_mto ON purchase_receipts(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS subcontracting_orders (
    bill_no TEXT NOT NULL,
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    order_qty TEXT NOT NULL,
    stock_in_qty TEXT NOT NULL,
    no_stock_in_qty TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(bill_no, material_code)
);
CREATE INDEX IF NOT EXISTS idx_subcontracting_orders_mto ON subcontracting_orders(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS material_picking (
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    app_qty TEXT NOT NULL,
    actual_qty TEXT NOT NULL,
    ppbom_bill_no TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(mto, material_code, ppbom_bill_no)
);
CREATE INDEX IF NOT EXISTS idx_material_picking_mto ON material_picking(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS sales_delivery (
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    real_qty TEXT NOT NULL,
    must_qty TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(mto, material_code, aux_prop_id)
);
CREATE INDEX IF NOT EXISTS idx_sales_delivery_mto ON sales_delivery(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS sales_orders (
    bill_no TEXT NOT NULL,
    mto TEXT NOT NULL,
    material_code TEXT NOT NULL,
    customer_name TEXT NOT NULL,
    delivery_date TEXT NOT NULL,
    qty TEXT NOT NULL,
    aux_prop_id INTEGER NOT NULL,
    synced_at TEXT NOT NULL,
    UNIQUE(bill_no, mto, material_code, aux_prop_id)
);
CREATE INDEX IF NOT EXISTS idx_sales_orders_mto ON sales_orders(mto, synced_at DESC);

CREATE TABLE IF NOT EXISTS sync_history (
    started_at TEXT NOT NULL PRIMARY KEY,
    finished_at TEXT NOT NULL,
    status TEXT NOT NULL,
    days_back INTEGER NOT NULL,
    records_synced INTEGER NOT NULL,
    error_message TEXT
);

CREATE TABLE IF NOT EXISTS sync_window (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    finished_at TEXT NOT NULL
);
";

/// The on-disk store. All nine form tables plus the sync journal (C12)
/// live in one SQLite file, WAL-enabled so C9's reads never block behind
/// C6's writes.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if absent) the store at `path`, enabling WAL mode
    /// and applying the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Upserts a batch of rows of one form in a single transaction, per
    /// `spec.md` §4.3's "writes must be batched and transactional".
    pub fn upsert_production_orders(&self, rows: &[ProductionOrderRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO production_orders
                 (bill_no, mto, workshop, material_code, material_name, specification, qty, status, create_date, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(bill_no) DO UPDATE SET
                   mto=excluded.mto, workshop=excluded.workshop, material_code=excluded.material_code,
                   material_name=excluded.material_name, specification=excluded.specification,
                   qty=excluded.qty, status=excluded.status, create_date=excluded.create_date,
                   synced_at=excluded.synced_at",
                params![
                    row.bill_no, row.mto, row.workshop, row.material_code, row.material_name,
                    row.specification, row.qty.to_string(), row.status, row.create_date,
                    synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_production_bom(&self, rows: &[ProductionBomRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO production_bom
                 (mo_bill_no, mto, material_code, aux_prop_id, material_type, need_qty, picked_qty, no_picked_qty, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(mo_bill_no, material_code, aux_prop_id) DO UPDATE SET
                   mto=excluded.mto, material_type=excluded.material_type, need_qty=excluded.need_qty,
                   picked_qty=excluded.picked_qty, no_picked_qty=excluded.no_picked_qty, synced_at=excluded.synced_at",
                params![
                    row.mo_bill_no, row.mto, row.material_code, row.aux_prop_id, row.material_type,
                    row.need_qty.to_string(), row.picked_qty.to_string(), row.no_picked_qty.to_string(),
                    synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_production_receipts(&self, rows: &[ProductionReceiptRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO production_receipts (mto, material_code, aux_prop_id, real_qty, must_qty, mo_bill_no, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(mto, material_code, aux_prop_id) DO UPDATE SET
                   real_qty=excluded.real_qty, must_qty=excluded.must_qty, mo_bill_no=excluded.mo_bill_no,
                   synced_at=excluded.synced_at",
                params![
                    row.mto, row.material_code, row.aux_prop_id, row.real_qty.to_string(),
                    row.must_qty.to_string(), row.mo_bill_no, synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_purchase_orders(&self, rows: &[PurchaseOrderRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO purchase_orders (bill_no, mto, material_code, aux_prop_id, order_qty, stock_in_qty, remain_stock_in_qty, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(bill_no, material_code, aux_prop_id) DO UPDATE SET
                   mto=excluded.mto, order_qty=excluded.order_qty, stock_in_qty=excluded.stock_in_qty,
                   remain_stock_in_qty=excluded.remain_stock_in_qty, synced_at=excluded.synced_at",
                params![
                    row.bill_no, row.mto, row.material_code, row.aux_prop_id, row.order_qty.to_string(),
                    row.stock_in_qty.to_string(), row.remain_stock_in_qty.to_string(), synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_purchase_receipts(&self, rows: &[PurchaseReceiptRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO purchase_receipts (mto, material_code, aux_prop_id, real_qty, must_qty, bill_type, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(mto, material_code, aux_prop_id, bill_type) DO UPDATE SET
                   real_qty=excluded.real_qty, must_qty=excluded.must_qty, synced_at=excluded.synced_at",
                params![
                    row.mto, row.material_code, row.aux_prop_id, row.real_qty.to_string(),
                    row.must_qty.to_string(), row.bill_type, synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_subcontracting_orders(&self, rows: &[SubcontractOrderRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO subcontracting_orders (bill_no, mto, material_code, order_qty, stock_in_qty, no_stock_in_qty, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(bill_no, material_code) DO UPDATE SET
                   mto=excluded.mto, order_qty=excluded.order_qty, stock_in_qty=excluded.stock_in_qty,
                   no_stock_in_qty=excluded.no_stock_in_qty, synced_at=excluded.synced_at",
                params![
                    row.bill_no, row.mto, row.material_code, row.order_qty.to_string(),
                    row.stock_in_qty.to_string(), row.no_stock_in_qty.to_string(), synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_material_picking(&self, rows: &[MaterialPickingRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO material_picking (mto, material_code, app_qty, actual_qty, ppbom_bill_no, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(mto, material_code, ppbom_bill_no) DO UPDATE SET
                   app_qty=excluded.app_qty, actual_qty=excluded.actual_qty, synced_at=excluded.synced_at",
                params![
                    row.mto, row.material_code, row.app_qty.to_string(), row.actual_qty.to_string(),
                    row.ppbom_bill_no, synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_sales_delivery(&self, rows: &[SalesDeliveryRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO sales_delivery (mto, material_code, aux_prop_id, real_qty, must_qty, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(mto, material_code, aux_prop_id) DO UPDATE SET
                   real_qty=excluded.real_qty, must_qty=excluded.must_qty, synced_at=excluded.synced_at",
                params![
                    row.mto, row.material_code, row.aux_prop_id, row.real_qty.to_string(),
                    row.must_qty.to_string(), synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn upsert_sales_orders(&self, rows: &[SalesOrderRow], synced_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut n = 0usize;
        for row in rows {
            n += tx.execute(
                "INSERT INTO sales_orders (bill_no, mto, material_code, customer_name, delivery_date, qty, aux_prop_id, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(bill_no, mto, material_code, aux_prop_id) DO UPDATE SET
                   customer_name=excluded.customer_name, delivery_date=excluded.delivery_date,
                   qty=excluded.qty, synced_at=excluded.synced_at",
                params![
                    row.bill_no, row.mto, row.material_code, row.customer_name, row.delivery_date,
                    row.qty.to_string(), row.aux_prop_id, synced_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(n)
    }

    /// Reads every row for `mto` across all nine tables, along with the
    /// oldest `synced_at` among non-empty readers (used for the freshness
    /// predicate and `cache_age_seconds`).
    pub fn read_mto(&self, mto: &Mto) -> Result<records::MtoRowSet> {
        records::MtoRowSet::load(&self.conn.lock(), mto.as_str())
    }

    /// Records that a sync run covering `[start, end]` completed at
    /// `finished_at`, overwriting any prior window (only the most recent
    /// completed window matters for the freshness rule in `SPEC_FULL.md` §4).
    pub fn record_sync_window(&self, start: &str, end: &str, finished_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_window (id, start_date, end_date, finished_at) VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET start_date=excluded.start_date, end_date=excluded.end_date, finished_at=excluded.finished_at",
            params![start, end, finished_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// The most recently completed sync window, if any.
    pub fn last_sync_window(&self) -> Result<Option<(String, String, DateTime<Utc>)>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT start_date, end_date, finished_at FROM sync_window WHERE id = 1",
                [],
                |r| {
                    let finished_at: String = r.get(2)?;
                    Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, finished_at))
                },
            )
            .optional()?;
        Ok(row.map(|(s, e, f)| {
            (
                s,
                e,
                DateTime::parse_from_rfc3339(&f).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
            )
        }))
    }

    /// Appends a terminal sync run to the history journal (C12).
    pub fn append_history(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        status: &str,
        days_back: u32,
        records_synced: u64,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_history (started_at, finished_at, status, days_back, records_synced, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                started_at.to_rfc3339(),
                finished_at.to_rfc3339(),
                status,
                days_back,
                records_synced,
                error_message,
            ],
        )?;
        Ok(())
    }

    /// The most recent `limit` history entries, newest first.
    pub fn history(&self, limit: u32) -> Result<Vec<records::HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT started_at, finished_at, status, days_back, records_synced, error_message
             FROM sync_history ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |r| {
                Ok(records::HistoryEntry {
                    started_at: r.get(0)?,
                    finished_at: r.get(1)?,
                    status: r.get(2)?,
                    days_back: r.get(3)?,
                    records_synced: r.get(4)?,
                    error_message: r.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The `limit` most recently synced distinct MTOs, used by
    /// `warm(count, use_hot=false)` (C10).
    pub fn recently_synced_mtos(&self, limit: u32) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT mto, MAX(synced_at) AS latest FROM (
                SELECT mto, synced_at FROM production_receipts
                UNION ALL SELECT mto, synced_at FROM sales_orders
             ) GROUP BY mto ORDER BY latest DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Qty;

    #[test]
    fn upsert_is_idempotent_under_compound_key() {
        let store = Store::open_in_memory().unwrap();
        let row = ProductionBomRow {
            mo_bill_no: "MO-1".to_string(),
            mto: "AK1".to_string(),
            material_code: "05.02.003".to_string(),
            aux_prop_id: 0,
            material_type: 2,
            need_qty: Qty::new(200, 0),
            picked_qty: Qty::new(50, 0),
            no_picked_qty: Qty::new(150, 0),
        };
        let now = Utc::now();
        store.upsert_production_bom(&[row.clone()], now).unwrap();
        store.upsert_production_bom(&[row], now).unwrap();
        let set = store.read_mto(&Mto::parse("AK1").unwrap()).unwrap();
        assert_eq!(set.production_bom.len(), 1);
    }

    #[test]
    fn sync_window_round_trips() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.last_sync_window().unwrap().is_none());
        let now = Utc::now();
        store.record_sync_window("2026-01-01", "2026-07-01", now).unwrap();
        let (start, end, finished_at) = store.last_sync_window().unwrap().unwrap();
        assert_eq!(start, "2026-01-01");
        assert_eq!(end, "2026-07-01");
        assert_eq!(finished_at.timestamp(), now.timestamp());
    }

    #[test]
    fn history_orders_newest_first() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc::now() - chrono::Duration::hours(2);
        let t1 = Utc::now();
        store.append_history(t0, t0, "completed", 90, 10, None).unwrap();
        store.append_history(t1, t1, "completed", 30, 5, None).unwrap();
        let history = store.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].records_synced, 5);
    }
}
