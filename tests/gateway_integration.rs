//! End-to-end scenarios driven through the public `Gateway` surface rather
//! than through `assemble()` directly: these exercise the registry's field
//! decoding, the cache/single-flight layers, and the sync orchestrator
//! together, the way a host process actually calls this crate.

use std::sync::Arc;
use std::time::Duration;

use mto_status_gateway::config::GatewayConfig;
use mto_status_gateway::cx::{CallerId, Cx};
use mto_status_gateway::error::ErrorKind;
use mto_status_gateway::types::{DataSource, Mto, Qty};
use mto_status_gateway::upstream::mock::MockUpstream;
use mto_status_gateway::Gateway;

fn raw(fields: &[(&str, serde_json::Value)]) -> std::collections::HashMap<String, serde_json::Value> {
    fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn sales_order_raw(mto: &str, material: &str, qty: &str) -> std::collections::HashMap<String, serde_json::Value> {
    raw(&[
        ("bill_no", serde_json::json!("SO-1")),
        ("mto_c", serde_json::json!(mto)),
        ("material_code", serde_json::json!(material)),
        ("customer_name", serde_json::json!("Acme")),
        ("delivery_date", serde_json::json!("2026-08-01")),
        ("qty", serde_json::json!(qty)),
        ("aux_prop_id", serde_json::json!(0)),
    ])
}

fn production_receipt_raw(
    mto: &str,
    material: &str,
    aux_prop_id: i64,
    real_qty: &str,
) -> std::collections::HashMap<String, serde_json::Value> {
    raw(&[
        ("mto_c", serde_json::json!(mto)),
        ("material_code", serde_json::json!(material)),
        ("aux_prop_id", serde_json::json!(aux_prop_id)),
        ("real_qty", serde_json::json!(real_qty)),
        ("must_qty", serde_json::json!("0")),
        ("mo_bill_no", serde_json::json!("MO-1")),
    ])
}

fn purchase_order_raw(
    mto: &str,
    material: &str,
    aux_prop_id: i64,
    bill_no: &str,
    order_qty: &str,
    stock_in_qty: &str,
) -> std::collections::HashMap<String, serde_json::Value> {
    raw(&[
        ("bill_no", serde_json::json!(bill_no)),
        ("mto_c", serde_json::json!(mto)),
        ("material_code", serde_json::json!(material)),
        ("aux_prop_id", serde_json::json!(aux_prop_id)),
        ("order_qty", serde_json::json!(order_qty)),
        ("stock_in_qty", serde_json::json!(stock_in_qty)),
        ("remain_stock_in_qty", serde_json::json!("0")),
    ])
}

fn build_gateway(mock: MockUpstream) -> Gateway {
    let mut config = GatewayConfig::default();
    config.db_path = ":memory:".to_string();
    Gateway::new(config, Arc::new(mock)).unwrap()
}

#[tokio::test]
async fn unseeded_mto_reports_not_found() {
    let gateway = build_gateway(MockUpstream::new());
    let cx = Cx::background(CallerId::internal("test"));
    let mto = Mto::parse("AK-MISSING").unwrap();
    let err = gateway.get_status(&cx, &mto, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn over_picked_finished_material_and_distinct_purchased_variants() {
    let mock = MockUpstream::new();
    mock.seed("sales-order", vec![sales_order_raw("AK-100", "07.01.001", "100")]);
    mock.seed(
        "production-receipt",
        vec![production_receipt_raw("AK-100", "07.01.001", 0, "120")],
    );
    mock.seed(
        "purchase-order",
        vec![
            purchase_order_raw("AK-100", "03.05.010", 1, "PO-1", "50", "50"),
            purchase_order_raw("AK-100", "03.05.010", 2, "PO-2", "30", "10"),
        ],
    );

    let gateway = build_gateway(mock);
    let cx = Cx::background(CallerId::internal("test"));
    let mto = Mto::parse("AK-100").unwrap();
    let status = gateway.get_status(&cx, &mto, true).await.unwrap();

    assert_eq!(status.children.len(), 3);

    let finished = status
        .children
        .iter()
        .find(|c| c.material_code.as_str() == "07.01.001")
        .expect("finished child present");
    assert!(finished.over_pick, "120 received against 100 required should over-pick");
    assert_eq!(finished.unpicked_qty, Qty::new(-20, 0));

    let purchased: Vec<_> = status
        .children
        .iter()
        .filter(|c| c.material_code.as_str() == "03.05.010")
        .collect();
    assert_eq!(purchased.len(), 2, "two aux_prop_id variants must stay distinct");
    let variant_1 = purchased.iter().find(|c| c.aux_prop_id == 1).unwrap();
    let variant_2 = purchased.iter().find(|c| c.aux_prop_id == 2).unwrap();
    assert!(!variant_1.over_pick);
    assert_eq!(variant_1.unpicked_qty, Qty::new(0, 0));
    assert!(!variant_2.over_pick);
    assert_eq!(variant_2.unpicked_qty, Qty::new(20, 0));
}

#[tokio::test]
async fn cache_hit_avoids_a_second_upstream_fetch() {
    let mock = MockUpstream::new();
    mock.seed("sales-order", vec![sales_order_raw("AK-200", "07.01.001", "10")]);
    let handle = mock.clone();
    let gateway = build_gateway(mock);
    let cx = Cx::background(CallerId::internal("test"));
    let mto = Mto::parse("AK-200").unwrap();

    let first = gateway.get_status(&cx, &mto, true).await.unwrap();
    assert_eq!(first.data_source, DataSource::Live);
    let calls_after_first = handle.call_count();
    assert!(calls_after_first > 0);

    let second = gateway.get_status(&cx, &mto, true).await.unwrap();
    assert_eq!(handle.call_count(), calls_after_first, "memory cache hit must not re-query upstream");
    assert_eq!(second.data_source, DataSource::Memory);
    assert_eq!(second.children, first.children);
}

#[tokio::test]
async fn concurrent_lookups_for_the_same_mto_coalesce_into_one_fetch() {
    let mock = MockUpstream::new();
    mock.seed("sales-order", vec![sales_order_raw("AK-300", "07.01.001", "10")]);
    mock.set_delay(Duration::from_millis(50));
    let handle = mock.clone();
    let gateway = Arc::new(build_gateway(mock));
    let mto = Mto::parse("AK-300").unwrap();

    let first = {
        let gateway = gateway.clone();
        let mto = mto.clone();
        tokio::spawn(async move {
            let cx = Cx::background(CallerId::internal("caller-a"));
            gateway.get_status(&cx, &mto, true).await
        })
    };
    let second = {
        let gateway = gateway.clone();
        let mto = mto.clone();
        tokio::spawn(async move {
            let cx = Cx::background(CallerId::internal("caller-b"));
            gateway.get_status(&cx, &mto, true).await
        })
    };

    let (a, b) = tokio::join!(first, second);
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    // One reader fetch per form in a single fetch_live fan-out; the second
    // caller attached to the first's in-flight single-flight broadcast
    // rather than issuing its own.
    assert_eq!(handle.call_count(), 9);
}

#[tokio::test]
async fn a_second_sync_trigger_fails_fast_while_one_is_in_flight() {
    let gateway = build_gateway(MockUpstream::new());
    gateway.trigger_sync(Some(5)).unwrap();
    let err = gateway.trigger_sync(Some(5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyncInProgress);
}
