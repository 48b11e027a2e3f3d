//! Row shapes for the persistent store: plain, string-keyed structs that
//! mirror each upstream form's table (`spec.md` §4.3), decoupled from the
//! typed decode records in [`crate::registry`] so the store never depends
//! on the upstream wire format.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::registry::{
    MaterialPickingRecord, ProductionBomRecord, ProductionOrderRecord, ProductionReceiptRecord,
    PurchaseOrderRecord, PurchaseReceiptRecord, SalesDeliveryRecord, SalesOrderRecord,
    SubcontractOrderRecord,
};
use crate::types::Qty;

#[derive(Debug, Clone)]
pub struct ProductionOrderRow {
    pub bill_no: String,
    pub mto: String,
    pub workshop: String,
    pub material_code: String,
    pub material_name: String,
    pub specification: Option<String>,
    pub qty: Qty,
    pub status: String,
    pub create_date: String,
}

impl From<&ProductionOrderRecord> for ProductionOrderRow {
    fn from(r: &ProductionOrderRecord) -> Self {
        Self {
            bill_no: r.bill_no.clone(),
            mto: r.mto.as_str().to_string(),
            workshop: r.workshop.clone(),
            material_code: r.material_code.as_str().to_string(),
            material_name: r.material_name.clone(),
            specification: r.specification.clone(),
            qty: r.qty,
            status: r.status.clone(),
            create_date: r.create_date.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductionBomRow {
    pub mo_bill_no: String,
    pub mto: String,
    pub material_code: String,
    pub aux_prop_id: i64,
    pub material_type: i64,
    pub need_qty: Qty,
    pub picked_qty: Qty,
    pub no_picked_qty: Qty,
}

impl From<&ProductionBomRecord> for ProductionBomRow {
    fn from(r: &ProductionBomRecord) -> Self {
        Self {
            mo_bill_no: r.mo_bill_no.clone(),
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            aux_prop_id: r.aux_prop_id,
            material_type: r.material_type,
            need_qty: r.need_qty,
            picked_qty: r.picked_qty,
            no_picked_qty: r.no_picked_qty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductionReceiptRow {
    pub mto: String,
    pub material_code: String,
    pub aux_prop_id: i64,
    pub real_qty: Qty,
    pub must_qty: Qty,
    pub mo_bill_no: String,
}

impl From<&ProductionReceiptRecord> for ProductionReceiptRow {
    fn from(r: &ProductionReceiptRecord) -> Self {
        Self {
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            aux_prop_id: r.aux_prop_id,
            real_qty: r.real_qty,
            must_qty: r.must_qty,
            mo_bill_no: r.mo_bill_no.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseOrderRow {
    pub bill_no: String,
    pub mto: String,
    pub material_code: String,
    pub aux_prop_id: i64,
    pub order_qty: Qty,
    pub stock_in_qty: Qty,
    pub remain_stock_in_qty: Qty,
}

impl From<&PurchaseOrderRecord> for PurchaseOrderRow {
    fn from(r: &PurchaseOrderRecord) -> Self {
        Self {
            bill_no: r.bill_no.clone(),
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            aux_prop_id: r.aux_prop_id,
            order_qty: r.order_qty,
            stock_in_qty: r.stock_in_qty,
            remain_stock_in_qty: r.remain_stock_in_qty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseReceiptRow {
    pub mto: String,
    pub material_code: String,
    pub aux_prop_id: i64,
    pub real_qty: Qty,
    pub must_qty: Qty,
    pub bill_type: String,
}

impl From<&PurchaseReceiptRecord> for PurchaseReceiptRow {
    fn from(r: &PurchaseReceiptRecord) -> Self {
        let bill_type = match r.bill_type {
            crate::registry::BillType::Standard => "standard",
            crate::registry::BillType::Subcontract => "subcontract",
        };
        Self {
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            aux_prop_id: r.aux_prop_id,
            real_qty: r.real_qty,
            must_qty: r.must_qty,
            bill_type: bill_type.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubcontractOrderRow {
    pub bill_no: String,
    pub mto: String,
    pub material_code: String,
    pub order_qty: Qty,
    pub stock_in_qty: Qty,
    pub no_stock_in_qty: Qty,
}

impl From<&SubcontractOrderRecord> for SubcontractOrderRow {
    fn from(r: &SubcontractOrderRecord) -> Self {
        Self {
            bill_no: r.bill_no.clone(),
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            order_qty: r.order_qty,
            stock_in_qty: r.stock_in_qty,
            no_stock_in_qty: r.no_stock_in_qty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterialPickingRow {
    pub mto: String,
    pub material_code: String,
    pub app_qty: Qty,
    pub actual_qty: Qty,
    pub ppbom_bill_no: String,
}

impl From<&MaterialPickingRecord> for MaterialPickingRow {
    fn from(r: &MaterialPickingRecord) -> Self {
        Self {
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            app_qty: r.app_qty,
            actual_qty: r.actual_qty,
            ppbom_bill_no: r.ppbom_bill_no.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SalesDeliveryRow {
    pub mto: String,
    pub material_code: String,
    pub aux_prop_id: i64,
    pub real_qty: Qty,
    pub must_qty: Qty,
}

impl From<&SalesDeliveryRecord> for SalesDeliveryRow {
    fn from(r: &SalesDeliveryRecord) -> Self {
        Self {
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            aux_prop_id: r.aux_prop_id,
            real_qty: r.real_qty,
            must_qty: r.must_qty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SalesOrderRow {
    pub bill_no: String,
    pub mto: String,
    pub material_code: String,
    pub customer_name: String,
    pub delivery_date: String,
    pub qty: Qty,
    pub aux_prop_id: i64,
}

impl From<&SalesOrderRecord> for SalesOrderRow {
    fn from(r: &SalesOrderRecord) -> Self {
        Self {
            bill_no: r.bill_no.clone(),
            mto: r.mto.as_str().to_string(),
            material_code: r.material_code.as_str().to_string(),
            customer_name: r.customer_name.clone(),
            delivery_date: r.delivery_date.clone(),
            qty: r.qty,
            aux_prop_id: r.aux_prop_id,
        }
    }
}

/// A row freshly loaded from the store, tagged with when it was synced.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    pub row: T,
    pub synced_at: DateTime<Utc>,
}

/// One history-journal entry (C12).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub started_at: String,
    pub finished_at: String,
    pub status: String,
    pub days_back: u32,
    pub records_synced: u64,
    pub error_message: Option<String>,
}

/// Every persisted row for a single MTO, across all nine tables, as read
/// by C9 on a persistent-tier hit.
#[derive(Debug, Clone, Default)]
pub struct MtoRowSet {
    pub production_orders: Vec<Stored<ProductionOrderRow>>,
    pub production_bom: Vec<Stored<ProductionBomRow>>,
    pub production_receipts: Vec<Stored<ProductionReceiptRow>>,
    pub purchase_orders: Vec<Stored<PurchaseOrderRow>>,
    pub purchase_receipts: Vec<Stored<PurchaseReceiptRow>>,
    pub subcontracting_orders: Vec<Stored<SubcontractOrderRow>>,
    pub material_picking: Vec<Stored<MaterialPickingRow>>,
    pub sales_delivery: Vec<Stored<SalesDeliveryRow>>,
    pub sales_orders: Vec<Stored<SalesOrderRow>>,
}

fn parse_qty(s: &str) -> Qty {
    s.parse().unwrap_or_default()
}

fn parse_synced_at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MtoRowSet {
    pub(super) fn load(conn: &Connection, mto: &str) -> crate::error::Result<Self> {
        let mut set = Self::default();

        let mut stmt = conn.prepare(
            "SELECT bill_no, mto, workshop, material_code, material_name, specification, qty, status, create_date, synced_at
             FROM production_orders WHERE mto = ?1",
        )?;
        set.production_orders = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: ProductionOrderRow {
                        bill_no: r.get(0)?,
                        mto: r.get(1)?,
                        workshop: r.get(2)?,
                        material_code: r.get(3)?,
                        material_name: r.get(4)?,
                        specification: r.get(5)?,
                        qty: parse_qty(&r.get::<_, String>(6)?),
                        status: r.get(7)?,
                        create_date: r.get(8)?,
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(9)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT mo_bill_no, mto, material_code, aux_prop_id, material_type, need_qty, picked_qty, no_picked_qty, synced_at
             FROM production_bom WHERE mto = ?1",
        )?;
        set.production_bom = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: ProductionBomRow {
                        mo_bill_no: r.get(0)?,
                        mto: r.get(1)?,
                        material_code: r.get(2)?,
                        aux_prop_id: r.get(3)?,
                        material_type: r.get(4)?,
                        need_qty: parse_qty(&r.get::<_, String>(5)?),
                        picked_qty: parse_qty(&r.get::<_, String>(6)?),
                        no_picked_qty: parse_qty(&r.get::<_, String>(7)?),
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(8)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT mto, material_code, aux_prop_id, real_qty, must_qty, mo_bill_no, synced_at
             FROM production_receipts WHERE mto = ?1",
        )?;
        set.production_receipts = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: ProductionReceiptRow {
                        mto: r.get(0)?,
                        material_code: r.get(1)?,
                        aux_prop_id: r.get(2)?,
                        real_qty: parse_qty(&r.get::<_, String>(3)?),
                        must_qty: parse_qty(&r.get::<_, String>(4)?),
                        mo_bill_no: r.get(5)?,
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT bill_no, mto, material_code, aux_prop_id, order_qty, stock_in_qty, remain_stock_in_qty, synced_at
             FROM purchase_orders WHERE mto = ?1",
        )?;
        set.purchase_orders = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: PurchaseOrderRow {
                        bill_no: r.get(0)?,
                        mto: r.get(1)?,
                        material_code: r.get(2)?,
                        aux_prop_id: r.get(3)?,
                        order_qty: parse_qty(&r.get::<_, String>(4)?),
                        stock_in_qty: parse_qty(&r.get::<_, String>(5)?),
                        remain_stock_in_qty: parse_qty(&r.get::<_, String>(6)?),
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(7)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT mto, material_code, aux_prop_id, real_qty, must_qty, bill_type, synced_at
             FROM purchase_receipts WHERE mto = ?1",
        )?;
        set.purchase_receipts = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: PurchaseReceiptRow {
                        mto: r.get(0)?,
                        material_code: r.get(1)?,
                        aux_prop_id: r.get(2)?,
                        real_qty: parse_qty(&r.get::<_, String>(3)?),
                        must_qty: parse_qty(&r.get::<_, String>(4)?),
                        bill_type: r.get(5)?,
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT bill_no, mto, material_code, order_qty, stock_in_qty, no_stock_in_qty, synced_at
             FROM subcontracting_orders WHERE mto = ?1",
        )?;
        set.subcontracting_orders = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: SubcontractOrderRow {
                        bill_no: r.get(0)?,
                        mto: r.get(1)?,
                        material_code: r.get(2)?,
                        order_qty: parse_qty(&r.get::<_, String>(3)?),
                        stock_in_qty: parse_qty(&r.get::<_, String>(4)?),
                        no_stock_in_qty: parse_qty(&r.get::<_, String>(5)?),
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT mto, material_code, app_qty, actual_qty, ppbom_bill_no, synced_at
             FROM material_picking WHERE mto = ?1",
        )?;
        set.material_picking = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: MaterialPickingRow {
                        mto: r.get(0)?,
                        material_code: r.get(1)?,
                        app_qty: parse_qty(&r.get::<_, String>(2)?),
                        actual_qty: parse_qty(&r.get::<_, String>(3)?),
                        ppbom_bill_no: r.get(4)?,
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(5)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT mto, material_code, aux_prop_id, real_qty, must_qty, synced_at
             FROM sales_delivery WHERE mto = ?1",
        )?;
        set.sales_delivery = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: SalesDeliveryRow {
                        mto: r.get(0)?,
                        material_code: r.get(1)?,
                        aux_prop_id: r.get(2)?,
                        real_qty: parse_qty(&r.get::<_, String>(3)?),
                        must_qty: parse_qty(&r.get::<_, String>(4)?),
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(5)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT bill_no, mto, material_code, customer_name, delivery_date, qty, aux_prop_id, synced_at
             FROM sales_orders WHERE mto = ?1",
        )?;
        set.sales_orders = stmt
            .query_map([mto], |r| {
                Ok(Stored {
                    row: SalesOrderRow {
                        bill_no: r.get(0)?,
                        mto: r.get(1)?,
                        material_code: r.get(2)?,
                        customer_name: r.get(3)?,
                        delivery_date: r.get(4)?,
                        qty: parse_qty(&r.get::<_, String>(5)?),
                        aux_prop_id: r.get(6)?,
                    },
                    synced_at: parse_synced_at(&r.get::<_, String>(7)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(set)
    }

    /// `true` once every per-reader slice that is non-empty is entirely
    /// fresh; readers that returned zero rows are excluded from the check
    /// (`SPEC_FULL.md` §4's resolution of the freshness Open Question).
    pub fn all_nonempty_readers_fresh(&self, now: DateTime<Utc>, freshness_budget_secs: i64) -> bool {
        fn fresh<T>(rows: &[Stored<T>], now: DateTime<Utc>, budget: i64) -> bool {
            rows.is_empty() || rows.iter().all(|r| (now - r.synced_at).num_seconds() <= budget)
        }
        fresh(&self.production_orders, now, freshness_budget_secs)
            && fresh(&self.production_bom, now, freshness_budget_secs)
            && fresh(&self.production_receipts, now, freshness_budget_secs)
            && fresh(&self.purchase_orders, now, freshness_budget_secs)
            && fresh(&self.purchase_receipts, now, freshness_budget_secs)
            && fresh(&self.subcontracting_orders, now, freshness_budget_secs)
            && fresh(&self.material_picking, now, freshness_budget_secs)
            && fresh(&self.sales_delivery, now, freshness_budget_secs)
            && fresh(&self.sales_orders, now, freshness_budget_secs)
    }

    /// The oldest `synced_at` among readers that returned at least one row;
    /// `cache_age_seconds` on a persistent-tier hit (`spec.md` §4.9 step 2a).
    pub fn oldest_synced_at(&self) -> Option<DateTime<Utc>> {
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut consider = |t: DateTime<Utc>| {
            oldest = Some(oldest.map_or(t, |cur| cur.min(t)));
        };
        self.production_orders.iter().for_each(|r| consider(r.synced_at));
        self.production_bom.iter().for_each(|r| consider(r.synced_at));
        self.production_receipts.iter().for_each(|r| consider(r.synced_at));
        self.purchase_orders.iter().for_each(|r| consider(r.synced_at));
        self.purchase_receipts.iter().for_each(|r| consider(r.synced_at));
        self.subcontracting_orders.iter().for_each(|r| consider(r.synced_at));
        self.material_picking.iter().for_each(|r| consider(r.synced_at));
        self.sales_delivery.iter().for_each(|r| consider(r.synced_at));
        self.sales_orders.iter().for_each(|r| consider(r.synced_at));
        oldest
    }

    /// `true` when every table is empty: nothing has ever been synced for
    /// this MTO.
    pub fn is_empty(&self) -> bool {
        self.production_orders.is_empty()
            && self.production_bom.is_empty()
            && self.production_receipts.is_empty()
            && self.purchase_orders.is_empty()
            && self.purchase_receipts.is_empty()
            && self.subcontracting_orders.is_empty()
            && self.material_picking.is_empty()
            && self.sales_delivery.is_empty()
            && self.sales_orders.is_empty()
    }
}
