//! Related-orders aggregator (C11): bill-number-deduplicated production and
//! purchase orders linked to an MTO, for operators tracing a status back to
//! its source documents (`spec.md` §4.11).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cx::Cx;
use crate::error::Result;
use crate::registry::ReaderRegistry;
use crate::types::Mto;

/// One deduplicated production order, linked to its receipts by `mo_bill_no`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedProductionOrder {
    pub bill_no: String,
    pub workshop: String,
    pub material_code: String,
    pub status: String,
    pub received_line_count: usize,
}

/// One deduplicated purchase order, linked to its receipts by bill number.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedPurchaseOrder {
    pub bill_no: String,
    pub material_code: String,
    pub order_qty: String,
    pub received_line_count: usize,
}

/// The full related-orders view for one MTO.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedOrders {
    pub mto: String,
    pub production_orders: Vec<RelatedProductionOrder>,
    pub purchase_orders: Vec<RelatedPurchaseOrder>,
    pub subcontract_bill_nos: Vec<String>,
}

/// Fetches and links an MTO's source documents directly from the live
/// readers (C2); this is a diagnostic view, not part of the cached status
/// pipeline, so it does not consult C4/C3 (`spec.md` §4.11).
pub struct RelatedOrdersLookup {
    registry: Arc<ReaderRegistry>,
}

impl RelatedOrdersLookup {
    #[must_use]
    pub fn new(registry: Arc<ReaderRegistry>) -> Self {
        Self { registry }
    }

    pub async fn get_related_orders(&self, cx: &Cx, mto: &Mto) -> Result<RelatedOrders> {
        let (production_orders, production_receipts, purchase_orders, subcontract_orders) = tokio::try_join!(
            self.registry.production_order.fetch_by_mto(cx, mto),
            self.registry.production_receipt.fetch_by_mto(cx, mto),
            self.registry.purchase_order.fetch_by_mto(cx, mto),
            self.registry.subcontract_order.fetch_by_mto(cx, mto),
        )?;

        let mut receipt_counts_by_bill: BTreeMap<String, usize> = BTreeMap::new();
        for receipt in &production_receipts {
            *receipt_counts_by_bill.entry(receipt.mo_bill_no.clone()).or_insert(0) += 1;
        }

        let mut seen_production_bills = std::collections::BTreeSet::new();
        let mut production = Vec::new();
        for order in &production_orders {
            if !seen_production_bills.insert(order.bill_no.clone()) {
                continue;
            }
            production.push(RelatedProductionOrder {
                bill_no: order.bill_no.clone(),
                workshop: order.workshop.clone(),
                material_code: order.material_code.as_str().to_string(),
                status: order.status.clone(),
                received_line_count: receipt_counts_by_bill.get(&order.bill_no).copied().unwrap_or(0),
            });
        }
        production.sort_by(|a, b| a.bill_no.cmp(&b.bill_no));

        let mut purchase_receipt_counts: BTreeMap<String, usize> = BTreeMap::new();
        for receipt in &self.registry.purchase_receipt.fetch_by_mto(cx, mto).await? {
            let key = format!("{}:{}", receipt.material_code.as_str(), receipt.aux_prop_id);
            *purchase_receipt_counts.entry(key).or_insert(0) += 1;
        }

        let mut seen_purchase_bills = std::collections::BTreeSet::new();
        let mut purchase = Vec::new();
        for order in &purchase_orders {
            if !seen_purchase_bills.insert(order.bill_no.clone()) {
                continue;
            }
            let key = format!("{}:{}", order.material_code.as_str(), order.aux_prop_id);
            purchase.push(RelatedPurchaseOrder {
                bill_no: order.bill_no.clone(),
                material_code: order.material_code.as_str().to_string(),
                order_qty: order.order_qty.to_string(),
                received_line_count: purchase_receipt_counts.get(&key).copied().unwrap_or(0),
            });
        }
        purchase.sort_by(|a, b| a.bill_no.cmp(&b.bill_no));

        let mut subcontract_bill_nos: Vec<String> = subcontract_orders
            .iter()
            .map(|o| o.bill_no.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        subcontract_bill_nos.sort();

        Ok(RelatedOrders {
            mto: mto.as_str().to_string(),
            production_orders: production,
            purchase_orders: purchase,
            subcontract_bill_nos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cx::CallerId;
    use crate::upstream::mock::MockUpstream;
    use crate::upstream::UpstreamClient;

    fn production_order_raw(bill_no: &str, mto: &str) -> crate::upstream::RawRecord {
        let mut r = crate::upstream::RawRecord::new();
        r.insert("bill_no".to_string(), serde_json::json!(bill_no));
        r.insert("mto_a".to_string(), serde_json::json!(mto));
        r.insert("workshop".to_string(), serde_json::json!("WS-1"));
        r.insert("material_code".to_string(), serde_json::json!("05.02.003"));
        r.insert("material_name".to_string(), serde_json::json!("widget"));
        r.insert("qty".to_string(), serde_json::json!("10"));
        r.insert("status".to_string(), serde_json::json!("open"));
        r.insert("create_date".to_string(), serde_json::json!("2026-01-01"));
        r
    }

    #[tokio::test]
    async fn deduplicates_repeated_bill_numbers() {
        let mock = MockUpstream::new();
        mock.seed(
            "production-order",
            vec![
                production_order_raw("MO-1", "AK1"),
                production_order_raw("MO-1", "AK1"),
            ],
        );
        let client = Arc::new(UpstreamClient::new(Arc::new(mock), 2000));
        let registry = Arc::new(ReaderRegistry::new(client));
        let lookup = RelatedOrdersLookup::new(registry);
        let cx = Cx::background(CallerId::internal("test"));
        let related = lookup
            .get_related_orders(&cx, &Mto::parse("AK1").unwrap())
            .await
            .unwrap();
        assert_eq!(related.production_orders.len(), 1);
    }
}
