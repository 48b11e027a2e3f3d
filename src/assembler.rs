//! MTO assembler (C9): the deterministic mapping from raw upstream records
//! into the consolidated response: material-class routing, aggregation
//! by variant key, and response shaping (`spec.md` §4.9).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::cache::MemoryCache;
use crate::classifier::{Classifier, MaterialClass};
use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::registry::{BillType, ReaderRegistry};
use crate::singleflight::MtoSingleFlight;
use crate::store::Store;
use crate::telemetry::Metrics;
use crate::types::{AuxPropId, DataSource, MaterialCode, Mto, Qty, VariantKey};

/// One assembled child line, shaped by its material class.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledChild {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub material_class: &'static str,
    /// The production order's material name, for finished children only
    /// (`spec.md` §4.9, parent metadata attachment).
    pub material_name: Option<String>,

    pub sales_order_qty: Option<Qty>,
    pub prod_instock_real_qty: Option<Qty>,
    pub prod_instock_must_qty: Option<Qty>,
    pub pick_actual_qty: Option<Qty>,
    pub purchase_order_qty: Option<Qty>,
    pub purchase_stock_in_qty: Option<Qty>,
    /// `Σ purchase_receipt.real_qty` across both bill types, for purchased
    /// children (`spec.md` §4.9 step 3). `subcontract_received_qty` below
    /// is the subcontract-only subtotal of this same total, not a separate
    /// pool of receipts.
    pub purchase_received_qty: Option<Qty>,
    pub subcontract_received_qty: Option<Qty>,
    /// `Σ sales_delivery.real_qty` for this variant, populated whenever any
    /// delivery row exists (`spec.md` §4.9 step 3 / end-to-end scenario 6).
    pub delivered_qty: Option<Qty>,

    pub required_qty: Qty,
    pub unpicked_qty: Qty,
    pub over_pick: bool,
}

/// The full `GetStatus` response (`spec.md` §3, "Cached MTO result").
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledStatus {
    pub mto: String,
    pub children: Vec<AssembledChild>,
    pub customer_name: Option<String>,
    pub delivery_date: Option<String>,
    pub data_source: DataSource,
    pub cache_age_seconds: Option<i64>,
}

/// A minimal per-reader line shape, stripped to exactly the fields C9
/// aggregates over. Constructed from either live registry records or
/// persisted store rows, so the aggregation logic below runs identically
/// against both tiers.
#[derive(Debug, Clone)]
pub struct AssemblyInputs {
    pub production_order_names: Vec<(MaterialCode, String)>,
    pub bom: Vec<BomLine>,
    pub production_receipts: Vec<ReceiptLine>,
    pub purchase_orders: Vec<PurchaseOrderLine>,
    pub purchase_receipts: Vec<PurchaseReceiptLine>,
    pub picking: Vec<PickingLine>,
    pub sales_deliveries: Vec<SalesDeliveryLine>,
    pub sales_orders: Vec<SalesOrderLine>,
    pub subcontracting_orders: Vec<SubcontractOrderLine>,
}

#[derive(Debug, Clone)]
pub struct BomLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub need_qty: Qty,
    pub picked_qty: Qty,
}

#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub real_qty: Qty,
    pub must_qty: Qty,
}

#[derive(Debug, Clone)]
pub struct PurchaseOrderLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub order_qty: Qty,
    pub stock_in_qty: Qty,
}

#[derive(Debug, Clone)]
pub struct PurchaseReceiptLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub real_qty: Qty,
    pub bill_type: BillType,
}

#[derive(Debug, Clone)]
pub struct PickingLine {
    pub material_code: MaterialCode,
    pub app_qty: Qty,
    pub actual_qty: Qty,
}

#[derive(Debug, Clone)]
pub struct SalesDeliveryLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub real_qty: Qty,
}

#[derive(Debug, Clone)]
pub struct SalesOrderLine {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
    pub qty: Qty,
    pub customer_name: String,
    pub delivery_date: String,
}

#[derive(Debug, Clone)]
pub struct SubcontractOrderLine {
    pub material_code: MaterialCode,
    pub order_qty: Qty,
    pub stock_in_qty: Qty,
}

impl AssemblyInputs {
    /// `true` when every slice is empty: no reader returned anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bom.is_empty()
            && self.production_receipts.is_empty()
            && self.purchase_orders.is_empty()
            && self.purchase_receipts.is_empty()
            && self.picking.is_empty()
            && self.sales_deliveries.is_empty()
            && self.sales_orders.is_empty()
            && self.subcontracting_orders.is_empty()
    }
}

/// Builds the consolidated response from already-fetched inputs, per
/// `spec.md` §4.9 steps 3-8. Pure and synchronous: no I/O, so both the
/// persistent-tier and live-tier paths funnel through this one function.
#[must_use]
pub fn assemble(
    mto: &Mto,
    inputs: &AssemblyInputs,
    classifier: &Classifier,
    data_source: DataSource,
    cache_age_seconds: Option<i64>,
) -> AssembledStatus {
    let mut delivered: BTreeMap<VariantKey, Qty> = BTreeMap::new();
    let mut received: BTreeMap<VariantKey, Qty> = BTreeMap::new();
    let mut must_receive: BTreeMap<VariantKey, Qty> = BTreeMap::new();
    let mut subcontract_received: BTreeMap<VariantKey, Qty> = BTreeMap::new();
    let mut purchase_received: BTreeMap<VariantKey, Qty> = BTreeMap::new();

    for line in &inputs.sales_deliveries {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        *delivered.entry(key).or_insert(Qty::ZERO) += line.real_qty;
    }
    for line in &inputs.production_receipts {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        *received.entry(key.clone()).or_insert(Qty::ZERO) += line.real_qty;
        *must_receive.entry(key).or_insert(Qty::ZERO) += line.must_qty;
    }
    for line in &inputs.purchase_receipts {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        *purchase_received.entry(key.clone()).or_insert(Qty::ZERO) += line.real_qty;
        if line.bill_type == BillType::Subcontract {
            *subcontract_received.entry(key).or_insert(Qty::ZERO) += line.real_qty;
        }
    }

    let mut pick_app: BTreeMap<MaterialCode, Qty> = BTreeMap::new();
    let mut pick_actual: BTreeMap<MaterialCode, Qty> = BTreeMap::new();
    for line in &inputs.picking {
        *pick_app.entry(line.material_code.clone()).or_insert(Qty::ZERO) += line.app_qty;
        *pick_actual.entry(line.material_code.clone()).or_insert(Qty::ZERO) += line.actual_qty;
    }

    let mut sales_order_qty: BTreeMap<VariantKey, Qty> = BTreeMap::new();
    for line in &inputs.sales_orders {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        *sales_order_qty.entry(key).or_insert(Qty::ZERO) += line.qty;
    }

    let mut purchase_order_totals: BTreeMap<VariantKey, (Qty, Qty)> = BTreeMap::new();
    for line in &inputs.purchase_orders {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        let entry = purchase_order_totals.entry(key).or_insert((Qty::ZERO, Qty::ZERO));
        entry.0 += line.order_qty;
        entry.1 += line.stock_in_qty;
    }

    let mut bom_by_key: BTreeMap<VariantKey, (Qty, Qty)> = BTreeMap::new();
    for line in &inputs.bom {
        let key = VariantKey::new(line.material_code.clone(), Some(line.aux_prop_id));
        let entry = bom_by_key.entry(key).or_insert((Qty::ZERO, Qty::ZERO));
        entry.0 += line.need_qty;
        entry.1 += line.picked_qty;
    }

    let production_names: BTreeMap<MaterialCode, String> =
        inputs.production_order_names.iter().cloned().collect();

    let mut candidates: std::collections::BTreeSet<VariantKey> = std::collections::BTreeSet::new();
    candidates.extend(bom_by_key.keys().cloned());
    candidates.extend(sales_order_qty.keys().cloned());
    candidates.extend(purchase_order_totals.keys().cloned());
    for material in pick_app.keys().chain(pick_actual.keys()) {
        candidates.insert(VariantKey::new(material.clone(), None));
    }

    let mut children = Vec::new();
    for key in candidates {
        let Some(class) = classifier.classify(&key.material_code) else {
            continue;
        };
        let child = match class {
            MaterialClass::Finished => build_finished(
                &key,
                &sales_order_qty,
                &received,
                &pick_actual,
                &production_names,
                &delivered,
            ),
            MaterialClass::SelfMade => build_self_made(
                &key,
                &bom_by_key,
                &must_receive,
                &received,
                &pick_app,
                &pick_actual,
                &delivered,
            ),
            MaterialClass::Purchased => build_purchased(
                &key,
                &purchase_order_totals,
                &bom_by_key,
                &pick_app,
                &pick_actual,
                &purchase_received,
                &subcontract_received,
                &delivered,
            ),
        };
        children.push(child);
    }
    children.sort_by(|a, b| {
        (a.material_code.as_str(), a.aux_prop_id).cmp(&(b.material_code.as_str(), b.aux_prop_id))
    });

    let customer_name = inputs
        .sales_orders
        .iter()
        .map(|o| o.customer_name.clone())
        .find(|n| !n.is_empty());
    let delivery_date = inputs
        .sales_orders
        .iter()
        .map(|o| o.delivery_date.clone())
        .filter(|d| !d.is_empty())
        .min();

    AssembledStatus {
        mto: mto.as_str().to_string(),
        children,
        customer_name,
        delivery_date,
        data_source,
        cache_age_seconds,
    }
}

fn build_finished(
    key: &VariantKey,
    sales_order_qty: &BTreeMap<VariantKey, Qty>,
    received: &BTreeMap<VariantKey, Qty>,
    pick_actual: &BTreeMap<MaterialCode, Qty>,
    production_names: &BTreeMap<MaterialCode, String>,
    delivered: &BTreeMap<VariantKey, Qty>,
) -> AssembledChild {
    let required = sales_order_qty.get(key).copied().unwrap_or(Qty::ZERO);
    let received_from_prod_instock = received.get(key).copied().unwrap_or(Qty::ZERO);
    let picked = pick_actual.get(&key.material_code).copied().unwrap_or(Qty::ZERO);
    let unpicked = required - received_from_prod_instock;
    AssembledChild {
        material_code: key.material_code.clone(),
        aux_prop_id: key.aux_prop_id,
        material_class: MaterialClass::Finished.as_str(),
        material_name: production_names.get(&key.material_code).cloned(),
        sales_order_qty: Some(required),
        prod_instock_real_qty: Some(received_from_prod_instock),
        prod_instock_must_qty: None,
        pick_actual_qty: Some(picked),
        purchase_order_qty: None,
        purchase_stock_in_qty: None,
        purchase_received_qty: None,
        subcontract_received_qty: None,
        delivered_qty: delivered.get(key).copied(),
        required_qty: required,
        unpicked_qty: unpicked,
        over_pick: unpicked < Qty::ZERO,
    }
}

fn build_self_made(
    key: &VariantKey,
    bom_by_key: &BTreeMap<VariantKey, (Qty, Qty)>,
    must_receive: &BTreeMap<VariantKey, Qty>,
    received: &BTreeMap<VariantKey, Qty>,
    pick_app: &BTreeMap<MaterialCode, Qty>,
    pick_actual: &BTreeMap<MaterialCode, Qty>,
    delivered: &BTreeMap<VariantKey, Qty>,
) -> AssembledChild {
    let must = must_receive.get(key).copied().unwrap_or(Qty::ZERO);
    let required = if must != Qty::ZERO {
        must
    } else {
        pick_app.get(&key.material_code).copied().unwrap_or(Qty::ZERO)
    };
    let received_qty = received.get(key).copied().unwrap_or(Qty::ZERO);
    let picked = pick_actual.get(&key.material_code).copied().unwrap_or(Qty::ZERO);
    let bom_need = bom_by_key.get(key).map(|(need, _)| *need).unwrap_or(Qty::ZERO);
    let unpicked = required - picked;
    AssembledChild {
        material_code: key.material_code.clone(),
        aux_prop_id: key.aux_prop_id,
        material_class: MaterialClass::SelfMade.as_str(),
        material_name: None,
        sales_order_qty: None,
        prod_instock_real_qty: Some(received_qty),
        prod_instock_must_qty: Some(bom_need.max(must)),
        pick_actual_qty: Some(picked),
        purchase_order_qty: None,
        purchase_stock_in_qty: None,
        purchase_received_qty: None,
        subcontract_received_qty: None,
        delivered_qty: delivered.get(key).copied(),
        required_qty: required,
        unpicked_qty: unpicked,
        over_pick: unpicked < Qty::ZERO,
    }
}

fn build_purchased(
    key: &VariantKey,
    purchase_order_totals: &BTreeMap<VariantKey, (Qty, Qty)>,
    bom_by_key: &BTreeMap<VariantKey, (Qty, Qty)>,
    pick_app: &BTreeMap<MaterialCode, Qty>,
    pick_actual: &BTreeMap<MaterialCode, Qty>,
    purchase_received: &BTreeMap<VariantKey, Qty>,
    subcontract_received: &BTreeMap<VariantKey, Qty>,
    delivered: &BTreeMap<VariantKey, Qty>,
) -> AssembledChild {
    // Three sources in priority order; the first with a non-zero required
    // quantity wins (`spec.md` §4.9 step 6, purchased).
    let (required, picked) = if let Some((order_qty, stock_in_qty)) = purchase_order_totals.get(key) {
        if *order_qty != Qty::ZERO {
            (*order_qty, *stock_in_qty)
        } else {
            purchased_fallback(key, bom_by_key, pick_app, pick_actual)
        }
    } else {
        purchased_fallback(key, bom_by_key, pick_app, pick_actual)
    };

    let purchase_order_qty = purchase_order_totals.get(key).map(|(o, _)| *o);
    let purchase_stock_in_qty = purchase_order_totals.get(key).map(|(_, s)| *s);
    let purchase_received_qty = purchase_received.get(key).copied();
    let subcontract_qty = subcontract_received.get(key).copied();
    let unpicked = required - picked;

    AssembledChild {
        material_code: key.material_code.clone(),
        aux_prop_id: key.aux_prop_id,
        material_class: MaterialClass::Purchased.as_str(),
        material_name: None,
        sales_order_qty: None,
        prod_instock_real_qty: None,
        prod_instock_must_qty: None,
        pick_actual_qty: Some(picked),
        purchase_order_qty,
        purchase_stock_in_qty,
        purchase_received_qty,
        subcontract_received_qty: subcontract_qty,
        delivered_qty: delivered.get(key).copied(),
        required_qty: required,
        unpicked_qty: unpicked,
        over_pick: unpicked < Qty::ZERO,
    }
}

fn purchased_fallback(
    key: &VariantKey,
    bom_by_key: &BTreeMap<VariantKey, (Qty, Qty)>,
    pick_app: &BTreeMap<MaterialCode, Qty>,
    pick_actual: &BTreeMap<MaterialCode, Qty>,
) -> (Qty, Qty) {
    if let Some((must_qty, picked_qty)) = bom_by_key.get(key) {
        if *must_qty != Qty::ZERO {
            return (*must_qty, *picked_qty);
        }
    }
    let app = pick_app.get(&key.material_code).copied().unwrap_or(Qty::ZERO);
    let actual = pick_actual.get(&key.material_code).copied().unwrap_or(Qty::ZERO);
    (app, actual)
}

/// Orchestrates the three-tier lookup pipeline: memory (C4) → persistent
/// (C3, freshness-gated) → live fan-out (C1/C2), single-flighted per MTO.
pub struct Assembler {
    store: Arc<Store>,
    cache: Arc<MemoryCache>,
    single_flight: Arc<MtoSingleFlight>,
    registry: Arc<ReaderRegistry>,
    classifier: Arc<Classifier>,
    freshness_budget_secs: i64,
    metrics: Arc<Metrics>,
}

impl Assembler {
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        cache: Arc<MemoryCache>,
        single_flight: Arc<MtoSingleFlight>,
        registry: Arc<ReaderRegistry>,
        classifier: Arc<Classifier>,
        freshness_budget_secs: u64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cache,
            single_flight,
            registry,
            classifier,
            freshness_budget_secs: freshness_budget_secs as i64,
            metrics,
        }
    }

    /// `GetStatus(mto, use_cache)` (`spec.md` §4.9).
    pub async fn get_status(&self, cx: &Cx, mto: &Mto, use_cache: bool) -> Result<AssembledStatus> {
        if use_cache {
            if let Some(cached) = self.cache.get(mto.as_str()) {
                self.metrics.cache_hits.increment();
                return Ok(AssembledStatus {
                    data_source: DataSource::Memory,
                    cache_age_seconds: None,
                    ..cached
                });
            }
        }
        self.metrics.cache_misses.increment();

        let key = mto.as_str().to_string();
        let mto = mto.clone();
        let result = self
            .single_flight
            .run(&key, self.assemble_uncached(cx, &mto, use_cache))
            .await?;

        self.cache.insert(mto.as_str().to_string(), result.clone());
        Ok(result)
    }

    async fn assemble_uncached(&self, cx: &Cx, mto: &Mto, use_cache: bool) -> Result<AssembledStatus> {
        if use_cache {
            let row_set = self.store.read_mto(mto)?;
            if !row_set.is_empty() && self.is_persistent_fresh(&row_set)? {
                let age = row_set
                    .oldest_synced_at()
                    .map(|t| (Utc::now() - t).num_seconds())
                    .unwrap_or(0);
                let inputs = inputs_from_store(&row_set);
                let status = assemble(mto, &inputs, &self.classifier, DataSource::Persistent, Some(age));
                if status.children.is_empty() && inputs_is_empty_for_notfound(&row_set) {
                    return Err(Error::not_found(mto));
                }
                return Ok(status);
            }
        }

        let inputs = self.fetch_live(cx, mto).await?;
        if inputs.is_empty() {
            return Err(Error::not_found(mto));
        }
        Ok(assemble(mto, &inputs, &self.classifier, DataSource::Live, None))
    }

    /// Resolves the freshness Open Question per `SPEC_FULL.md` §4: fresh
    /// when every non-empty reader's rows are within budget, OR the most
    /// recently completed sync window covers today and is itself within
    /// budget.
    fn is_persistent_fresh(&self, row_set: &crate::store::records::MtoRowSet) -> Result<bool> {
        let now = Utc::now();
        if row_set.all_nonempty_readers_fresh(now, self.freshness_budget_secs) {
            return Ok(true);
        }
        if let Some((start, end, finished_at)) = self.store.last_sync_window()? {
            let today = now.format("%Y-%m-%d").to_string();
            let window_covers_today = start.as_str() <= today.as_str() && today.as_str() <= end.as_str();
            let run_is_fresh = (now - finished_at).num_seconds() <= self.freshness_budget_secs;
            if window_covers_today && run_is_fresh {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn fetch_live(&self, cx: &Cx, mto: &Mto) -> Result<AssemblyInputs> {
        let registry = &self.registry;
        let (
            production_orders,
            bom,
            production_receipts,
            purchase_orders,
            purchase_receipts,
            picking,
            sales_deliveries,
            sales_orders,
            subcontract_orders,
        ) = tokio::try_join!(
            registry.production_order.fetch_by_mto(cx, mto),
            registry.production_bom.fetch_by_mto(cx, mto),
            registry.production_receipt.fetch_by_mto(cx, mto),
            registry.purchase_order.fetch_by_mto(cx, mto),
            registry.purchase_receipt.fetch_by_mto(cx, mto),
            registry.material_picking.fetch_by_mto(cx, mto),
            registry.sales_delivery.fetch_by_mto(cx, mto),
            registry.sales_order.fetch_by_mto(cx, mto),
            registry.subcontract_order.fetch_by_mto(cx, mto),
        )?;

        Ok(AssemblyInputs {
            production_order_names: production_orders
                .iter()
                .map(|r| (r.material_code.clone(), r.material_name.clone()))
                .collect(),
            bom: bom
                .iter()
                .map(|r| BomLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    need_qty: r.need_qty,
                    picked_qty: r.picked_qty,
                })
                .collect(),
            production_receipts: production_receipts
                .iter()
                .map(|r| ReceiptLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    real_qty: r.real_qty,
                    must_qty: r.must_qty,
                })
                .collect(),
            purchase_orders: purchase_orders
                .iter()
                .map(|r| PurchaseOrderLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    order_qty: r.order_qty,
                    stock_in_qty: r.stock_in_qty,
                })
                .collect(),
            purchase_receipts: purchase_receipts
                .iter()
                .map(|r| PurchaseReceiptLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    real_qty: r.real_qty,
                    bill_type: r.bill_type,
                })
                .collect(),
            picking: picking
                .iter()
                .map(|r| PickingLine {
                    material_code: r.material_code.clone(),
                    app_qty: r.app_qty,
                    actual_qty: r.actual_qty,
                })
                .collect(),
            sales_deliveries: sales_deliveries
                .iter()
                .map(|r| SalesDeliveryLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    real_qty: r.real_qty,
                })
                .collect(),
            sales_orders: sales_orders
                .iter()
                .map(|r| SalesOrderLine {
                    material_code: r.material_code.clone(),
                    aux_prop_id: r.aux_prop_id,
                    qty: r.qty,
                    customer_name: r.customer_name.clone(),
                    delivery_date: r.delivery_date.clone(),
                })
                .collect(),
            subcontracting_orders: subcontract_orders
                .iter()
                .map(|r| SubcontractOrderLine {
                    material_code: r.material_code.clone(),
                    order_qty: r.order_qty,
                    stock_in_qty: r.stock_in_qty,
                })
                .collect(),
        })
    }
}

fn inputs_is_empty_for_notfound(row_set: &crate::store::records::MtoRowSet) -> bool {
    row_set.is_empty()
}

fn inputs_from_store(row_set: &crate::store::records::MtoRowSet) -> AssemblyInputs {
    AssemblyInputs {
        production_order_names: row_set
            .production_orders
            .iter()
            .map(|s| (MaterialCode::new(s.row.material_code.clone()), s.row.material_name.clone()))
            .collect(),
        bom: row_set
            .production_bom
            .iter()
            .map(|s| BomLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                need_qty: s.row.need_qty,
                picked_qty: s.row.picked_qty,
            })
            .collect(),
        production_receipts: row_set
            .production_receipts
            .iter()
            .map(|s| ReceiptLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                real_qty: s.row.real_qty,
                must_qty: s.row.must_qty,
            })
            .collect(),
        purchase_orders: row_set
            .purchase_orders
            .iter()
            .map(|s| PurchaseOrderLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                order_qty: s.row.order_qty,
                stock_in_qty: s.row.stock_in_qty,
            })
            .collect(),
        purchase_receipts: row_set
            .purchase_receipts
            .iter()
            .map(|s| PurchaseReceiptLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                real_qty: s.row.real_qty,
                bill_type: if s.row.bill_type == "subcontract" {
                    BillType::Subcontract
                } else {
                    BillType::Standard
                },
            })
            .collect(),
        picking: row_set
            .material_picking
            .iter()
            .map(|s| PickingLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                app_qty: s.row.app_qty,
                actual_qty: s.row.actual_qty,
            })
            .collect(),
        sales_deliveries: row_set
            .sales_delivery
            .iter()
            .map(|s| SalesDeliveryLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                real_qty: s.row.real_qty,
            })
            .collect(),
        sales_orders: row_set
            .sales_orders
            .iter()
            .map(|s| SalesOrderLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                aux_prop_id: s.row.aux_prop_id,
                qty: s.row.qty,
                customer_name: s.row.customer_name.clone(),
                delivery_date: s.row.delivery_date.clone(),
            })
            .collect(),
        subcontracting_orders: row_set
            .subcontracting_orders
            .iter()
            .map(|s| SubcontractOrderLine {
                material_code: MaterialCode::new(s.row.material_code.clone()),
                order_qty: s.row.order_qty,
                stock_in_qty: s.row.stock_in_qty,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mto() -> Mto {
        Mto::parse("AK2510034").unwrap()
    }

    #[test]
    fn self_made_assembly_matches_spec_scenario_one() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: vec![BomLine {
                material_code: MaterialCode::new("05.02.003"),
                aux_prop_id: 0,
                need_qty: Qty::new(200, 0),
                picked_qty: Qty::new(50, 0),
            }],
            production_receipts: vec![ReceiptLine {
                material_code: MaterialCode::new("05.02.003"),
                aux_prop_id: 0,
                real_qty: Qty::new(95, 0),
                must_qty: Qty::new(100, 0),
            }],
            purchase_orders: Vec::new(),
            purchase_receipts: Vec::new(),
            picking: Vec::new(),
            sales_deliveries: Vec::new(),
            sales_orders: Vec::new(),
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        assert_eq!(status.children.len(), 1);
        let child = &status.children[0];
        assert_eq!(child.material_class, "self-made");
        assert_eq!(child.required_qty, Qty::new(100, 0));
        assert_eq!(child.prod_instock_real_qty, Some(Qty::new(95, 0)));
    }

    #[test]
    fn over_picking_is_flagged_without_changing_other_fields() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: vec![BomLine {
                material_code: MaterialCode::new("05.02.003"),
                aux_prop_id: 0,
                need_qty: Qty::new(100, 0),
                picked_qty: Qty::new(120, 0),
            }],
            production_receipts: vec![ReceiptLine {
                material_code: MaterialCode::new("05.02.003"),
                aux_prop_id: 0,
                real_qty: Qty::new(0, 0),
                must_qty: Qty::new(0, 0),
            }],
            purchase_orders: Vec::new(),
            purchase_receipts: Vec::new(),
            picking: vec![PickingLine {
                material_code: MaterialCode::new("05.02.003"),
                app_qty: Qty::new(100, 0),
                actual_qty: Qty::new(120, 0),
            }],
            sales_deliveries: Vec::new(),
            sales_orders: Vec::new(),
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        let child = &status.children[0];
        assert_eq!(child.unpicked_qty, Qty::new(-20, 0));
        assert!(child.over_pick);
    }

    #[test]
    fn variant_aggregation_keeps_distinct_aux_props_separate() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: Vec::new(),
            production_receipts: Vec::new(),
            purchase_orders: Vec::new(),
            purchase_receipts: Vec::new(),
            picking: Vec::new(),
            sales_deliveries: vec![
                SalesDeliveryLine {
                    material_code: MaterialCode::new("07.04.231"),
                    aux_prop_id: 12345,
                    real_qty: Qty::new(40, 0),
                },
                SalesDeliveryLine {
                    material_code: MaterialCode::new("07.04.231"),
                    aux_prop_id: 12345,
                    real_qty: Qty::new(60, 0),
                },
                SalesDeliveryLine {
                    material_code: MaterialCode::new("07.04.231"),
                    aux_prop_id: 99999,
                    real_qty: Qty::new(25, 0),
                },
            ],
            sales_orders: vec![
                SalesOrderLine {
                    material_code: MaterialCode::new("07.04.231"),
                    aux_prop_id: 12345,
                    qty: Qty::new(100, 0),
                    customer_name: "Acme".to_string(),
                    delivery_date: "2026-08-01".to_string(),
                },
                SalesOrderLine {
                    material_code: MaterialCode::new("07.04.231"),
                    aux_prop_id: 99999,
                    qty: Qty::new(25, 0),
                    customer_name: "Acme".to_string(),
                    delivery_date: "2026-08-01".to_string(),
                },
            ],
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        assert_eq!(status.children.len(), 2);
        assert_eq!(status.children[0].aux_prop_id, 12345);
        assert_eq!(status.children[0].delivered_qty, Some(Qty::new(100, 0)));
        assert_eq!(status.children[1].aux_prop_id, 99999);
        assert_eq!(status.children[1].delivered_qty, Some(Qty::new(25, 0)));
    }

    #[test]
    fn unclassified_material_is_dropped() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: vec![BomLine {
                material_code: MaterialCode::new("99.00.000"),
                aux_prop_id: 0,
                need_qty: Qty::new(10, 0),
                picked_qty: Qty::new(5, 0),
            }],
            production_receipts: Vec::new(),
            purchase_orders: Vec::new(),
            purchase_receipts: Vec::new(),
            picking: Vec::new(),
            sales_deliveries: Vec::new(),
            sales_orders: Vec::new(),
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        assert!(status.children.is_empty());
    }

    #[test]
    fn purchased_prefers_purchase_order_over_bom_and_picking() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: vec![BomLine {
                material_code: MaterialCode::new("03.01.100"),
                aux_prop_id: 0,
                need_qty: Qty::new(999, 0),
                picked_qty: Qty::new(1, 0),
            }],
            production_receipts: Vec::new(),
            purchase_orders: vec![PurchaseOrderLine {
                material_code: MaterialCode::new("03.01.100"),
                aux_prop_id: 0,
                order_qty: Qty::new(50, 0),
                stock_in_qty: Qty::new(30, 0),
            }],
            purchase_receipts: Vec::new(),
            picking: Vec::new(),
            sales_deliveries: Vec::new(),
            sales_orders: Vec::new(),
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        let child = &status.children[0];
        assert_eq!(child.required_qty, Qty::new(50, 0));
        assert_eq!(child.purchase_order_qty, Some(Qty::new(50, 0)));
    }

    #[test]
    fn purchase_received_sums_both_bill_types_with_subcontract_subtotal() {
        let classifier = Classifier::seeded();
        let inputs = AssemblyInputs {
            production_order_names: Vec::new(),
            bom: Vec::new(),
            production_receipts: Vec::new(),
            purchase_orders: vec![PurchaseOrderLine {
                material_code: MaterialCode::new("03.01.100"),
                aux_prop_id: 0,
                order_qty: Qty::new(10, 0),
                stock_in_qty: Qty::new(10, 0),
            }],
            purchase_receipts: vec![
                PurchaseReceiptLine {
                    material_code: MaterialCode::new("03.01.100"),
                    aux_prop_id: 0,
                    real_qty: Qty::new(6, 0),
                    bill_type: BillType::Standard,
                },
                PurchaseReceiptLine {
                    material_code: MaterialCode::new("03.01.100"),
                    aux_prop_id: 0,
                    real_qty: Qty::new(4, 0),
                    bill_type: BillType::Subcontract,
                },
            ],
            picking: Vec::new(),
            sales_deliveries: Vec::new(),
            sales_orders: Vec::new(),
            subcontracting_orders: Vec::new(),
        };
        let status = assemble(&mto(), &inputs, &classifier, DataSource::Live, None);
        let child = &status.children[0];
        assert_eq!(child.purchase_received_qty, Some(Qty::new(10, 0)));
        assert_eq!(child.subcontract_received_qty, Some(Qty::new(4, 0)));
    }
}
