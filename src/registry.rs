//! Declarative form reader registry (C2): nine upstream forms, each a
//! `ReaderConfig` mapping an internal field set to an upstream field name
//! plus a decoder, resolved into typed `fetch_by_mto`/`fetch_by_date_range`/
//! `fetch_by_bill_no` accessors over C1.
//!
//! `spec.md` §2 says "eight" logical forms but §4.2/§4.3 enumerate and use
//! nine; this registry implements all nine (see `SPEC_FULL.md` §G.1).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::types::{AuxPropId, MaterialCode, Mto, Qty};
use crate::upstream::{Filter, RawRecord, UpstreamClient};

/// The declared type of a field mapping's decoded value.
#[derive(Debug, Clone, Copy)]
pub enum FieldDecoder {
    Str,
    OptStr,
    Int,
    Qty,
}

/// One internal-name ↔ upstream-name ↔ decoder binding.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub internal: &'static str,
    pub upstream: &'static str,
    pub decoder: FieldDecoder,
}

impl FieldMapping {
    const fn new(internal: &'static str, upstream: &'static str, decoder: FieldDecoder) -> Self {
        Self {
            internal,
            upstream,
            decoder,
        }
    }
}

/// A decoded field value, typed per `FieldDecoder`.
#[derive(Debug, Clone)]
pub enum DecodedValue {
    Str(String),
    OptStr(Option<String>),
    Int(i64),
    Qty(Qty),
}

/// Declarative description of one upstream form (`spec.md` §4.2).
/// `ReaderConfig` values are immutable after construction (`spec.md` §9).
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub form_id: &'static str,
    pub date_field: &'static str,
    pub mto_field: &'static str,
    pub field_mappings: Vec<FieldMapping>,
}

fn decode_one(raw: &RawRecord, mapping: &FieldMapping) -> Result<DecodedValue> {
    let value = raw.get(mapping.upstream);
    match mapping.decoder {
        FieldDecoder::Str => {
            let s = value
                .and_then(Value::as_str)
                .ok_or_else(|| missing_field(mapping))?;
            Ok(DecodedValue::Str(s.to_string()))
        }
        FieldDecoder::OptStr => Ok(DecodedValue::OptStr(
            value.and_then(Value::as_str).map(str::to_string),
        )),
        FieldDecoder::Int => {
            let i = match value {
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| missing_field(mapping))?,
                Some(Value::String(s)) => s.parse().map_err(|_| missing_field(mapping))?,
                None => 0,
                _ => return Err(missing_field(mapping)),
            };
            Ok(DecodedValue::Int(i))
        }
        FieldDecoder::Qty => {
            let qty = match value {
                Some(Value::Number(n)) => {
                    Qty::try_from(n.as_f64().unwrap_or(0.0)).unwrap_or_default()
                }
                Some(Value::String(s)) => {
                    s.parse().map_err(|_| missing_field(mapping))?
                }
                None => Qty::ZERO,
                _ => return Err(missing_field(mapping)),
            };
            Ok(DecodedValue::Qty(qty))
        }
    }
}

fn missing_field(mapping: &FieldMapping) -> Error {
    Error::upstream_query_error(format!(
        "field '{}' (upstream '{}') missing or mistyped",
        mapping.internal, mapping.upstream
    ))
}

/// Decodes every mapped field of `raw` into a name-indexed value table.
/// Total: a field that cannot decode fails the whole record rather than
/// being silently skipped (`spec.md` §9, "Dynamic typing").
pub fn decode_record(
    raw: &RawRecord,
    mappings: &[FieldMapping],
) -> Result<HashMap<&'static str, DecodedValue>> {
    let mut out = HashMap::with_capacity(mappings.len());
    for mapping in mappings {
        out.insert(mapping.internal, decode_one(raw, mapping)?);
    }
    Ok(out)
}

fn take_str(map: &HashMap<&'static str, DecodedValue>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(DecodedValue::Str(s)) => Ok(s.clone()),
        _ => Err(Error::internal(format!("decoded field '{key}' absent"))),
    }
}

fn take_opt_str(map: &HashMap<&'static str, DecodedValue>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(DecodedValue::OptStr(s)) => s.clone(),
        Some(DecodedValue::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

fn take_int(map: &HashMap<&'static str, DecodedValue>, key: &str) -> i64 {
    match map.get(key) {
        Some(DecodedValue::Int(i)) => *i,
        _ => 0,
    }
}

/// Aux-property id decoding always defaults to `0`, uniformly, per
/// `SPEC_FULL.md` §4's resolution of the aux-property Open Question.
fn take_aux_prop(map: &HashMap<&'static str, DecodedValue>, key: &str) -> AuxPropId {
    take_int(map, key)
}

fn take_qty(map: &HashMap<&'static str, DecodedValue>, key: &str) -> Qty {
    match map.get(key) {
        Some(DecodedValue::Qty(q)) => *q,
        _ => Qty::ZERO,
    }
}

/// `purchase-receipts.bill_type`: whether a receipt was against a standard
/// purchase order or a subcontracting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillType {
    Standard,
    Subcontract,
}

impl BillType {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("subcontract") {
            Self::Subcontract
        } else {
            Self::Standard
        }
    }
}

macro_rules! reader_record {
    ($name:ident { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            $(pub $field: $ty,)+
        }
    };
}

reader_record!(ProductionOrderRecord {
    bill_no: String,
    mto: Mto,
    workshop: String,
    material_code: MaterialCode,
    material_name: String,
    specification: Option<String>,
    qty: Qty,
    status: String,
    create_date: String,
});

reader_record!(ProductionBomRecord {
    mo_bill_no: String,
    mto: Mto,
    material_code: MaterialCode,
    aux_prop_id: AuxPropId,
    material_type: i64,
    need_qty: Qty,
    picked_qty: Qty,
    no_picked_qty: Qty,
});

reader_record!(ProductionReceiptRecord {
    mto: Mto,
    material_code: MaterialCode,
    aux_prop_id: AuxPropId,
    real_qty: Qty,
    must_qty: Qty,
    mo_bill_no: String,
});

reader_record!(PurchaseOrderRecord {
    bill_no: String,
    mto: Mto,
    material_code: MaterialCode,
    aux_prop_id: AuxPropId,
    order_qty: Qty,
    stock_in_qty: Qty,
    remain_stock_in_qty: Qty,
});

reader_record!(PurchaseReceiptRecord {
    mto: Mto,
    material_code: MaterialCode,
    aux_prop_id: AuxPropId,
    real_qty: Qty,
    must_qty: Qty,
    bill_type: BillType,
});

reader_record!(SubcontractOrderRecord {
    bill_no: String,
    mto: Mto,
    material_code: MaterialCode,
    order_qty: Qty,
    stock_in_qty: Qty,
    no_stock_in_qty: Qty,
});

reader_record!(MaterialPickingRecord {
    mto: Mto,
    material_code: MaterialCode,
    app_qty: Qty,
    actual_qty: Qty,
    ppbom_bill_no: String,
});

reader_record!(SalesDeliveryRecord {
    mto: Mto,
    material_code: MaterialCode,
    aux_prop_id: AuxPropId,
    real_qty: Qty,
    must_qty: Qty,
});

reader_record!(SalesOrderRecord {
    bill_no: String,
    mto: Mto,
    material_code: MaterialCode,
    customer_name: String,
    delivery_date: String,
    qty: Qty,
    aux_prop_id: AuxPropId,
});

/// A typed accessor for one upstream form, wrapping C1 with the form's
/// `ReaderConfig` and decode function.
pub struct Reader<T> {
    config: ReaderConfig,
    client: Arc<UpstreamClient>,
    decode: fn(&HashMap<&'static str, DecodedValue>) -> Result<T>,
    cap: u32,
}

impl<T> Reader<T> {
    fn new(
        config: ReaderConfig,
        client: Arc<UpstreamClient>,
        decode: fn(&HashMap<&'static str, DecodedValue>) -> Result<T>,
    ) -> Self {
        Self {
            config,
            client,
            decode,
            cap: 50_000,
        }
    }

    fn upstream_fields(&self) -> Vec<String> {
        self.config
            .field_mappings
            .iter()
            .map(|m| m.upstream.to_string())
            .collect()
    }

    fn decode_all(&self, raws: Vec<RawRecord>) -> Result<Vec<T>> {
        raws.iter()
            .map(|raw| {
                let decoded = decode_record(raw, &self.config.field_mappings)?;
                (self.decode)(&decoded)
            })
            .collect()
    }

    pub async fn fetch_by_mto(&self, cx: &Cx, mto: &Mto) -> Result<Vec<T>> {
        let filter = Filter::Equals {
            field: self.config.mto_field.to_string(),
            value: mto.as_str().to_string(),
        };
        let raws = self
            .client
            .fetch_all(cx, self.config.form_id, &self.upstream_fields(), filter, self.cap)
            .await?;
        self.decode_all(raws)
    }

    pub async fn fetch_by_date_range(
        &self,
        cx: &Cx,
        start: &str,
        end: &str,
    ) -> Result<Vec<T>> {
        let filter = Filter::DateRange {
            field: self.config.date_field.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        };
        let raws = self
            .client
            .fetch_all(cx, self.config.form_id, &self.upstream_fields(), filter, self.cap)
            .await?;
        self.decode_all(raws)
    }

    pub async fn fetch_by_bill_no(&self, cx: &Cx, bill_no: &str) -> Result<Vec<T>> {
        let filter = Filter::Equals {
            field: "bill_no".to_string(),
            value: bill_no.to_string(),
        };
        let raws = self
            .client
            .fetch_all(cx, self.config.form_id, &self.upstream_fields(), filter, self.cap)
            .await?;
        self.decode_all(raws)
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

fn decode_production_order(map: &HashMap<&'static str, DecodedValue>) -> Result<ProductionOrderRecord> {
    Ok(ProductionOrderRecord {
        bill_no: take_str(map, "bill_no")?,
        mto: Mto::parse(take_str(map, "mto")?)?,
        workshop: take_opt_str(map, "workshop").unwrap_or_default(),
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        material_name: take_opt_str(map, "material_name").unwrap_or_default(),
        specification: take_opt_str(map, "specification"),
        qty: take_qty(map, "qty"),
        status: take_opt_str(map, "status").unwrap_or_default(),
        create_date: take_opt_str(map, "create_date").unwrap_or_default(),
    })
}

fn decode_production_bom(map: &HashMap<&'static str, DecodedValue>) -> Result<ProductionBomRecord> {
    Ok(ProductionBomRecord {
        mo_bill_no: take_str(map, "mo_bill_no")?,
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
        material_type: take_int(map, "material_type"),
        need_qty: take_qty(map, "need_qty"),
        picked_qty: take_qty(map, "picked_qty"),
        no_picked_qty: take_qty(map, "no_picked_qty"),
    })
}

fn decode_production_receipt(
    map: &HashMap<&'static str, DecodedValue>,
) -> Result<ProductionReceiptRecord> {
    Ok(ProductionReceiptRecord {
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
        real_qty: take_qty(map, "real_qty"),
        must_qty: take_qty(map, "must_qty"),
        mo_bill_no: take_opt_str(map, "mo_bill_no").unwrap_or_default(),
    })
}

fn decode_purchase_order(map: &HashMap<&'static str, DecodedValue>) -> Result<PurchaseOrderRecord> {
    Ok(PurchaseOrderRecord {
        bill_no: take_str(map, "bill_no")?,
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
        order_qty: take_qty(map, "order_qty"),
        stock_in_qty: take_qty(map, "stock_in_qty"),
        remain_stock_in_qty: take_qty(map, "remain_stock_in_qty"),
    })
}

fn decode_purchase_receipt(
    map: &HashMap<&'static str, DecodedValue>,
) -> Result<PurchaseReceiptRecord> {
    Ok(PurchaseReceiptRecord {
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
        real_qty: take_qty(map, "real_qty"),
        must_qty: take_qty(map, "must_qty"),
        bill_type: BillType::parse(&take_str(map, "bill_type")?),
    })
}

fn decode_subcontract_order(
    map: &HashMap<&'static str, DecodedValue>,
) -> Result<SubcontractOrderRecord> {
    Ok(SubcontractOrderRecord {
        bill_no: take_str(map, "bill_no")?,
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        order_qty: take_qty(map, "order_qty"),
        stock_in_qty: take_qty(map, "stock_in_qty"),
        no_stock_in_qty: take_qty(map, "no_stock_in_qty"),
    })
}

fn decode_material_picking(
    map: &HashMap<&'static str, DecodedValue>,
) -> Result<MaterialPickingRecord> {
    Ok(MaterialPickingRecord {
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        app_qty: take_qty(map, "app_qty"),
        actual_qty: take_qty(map, "actual_qty"),
        ppbom_bill_no: take_opt_str(map, "ppbom_bill_no").unwrap_or_default(),
    })
}

fn decode_sales_delivery(map: &HashMap<&'static str, DecodedValue>) -> Result<SalesDeliveryRecord> {
    Ok(SalesDeliveryRecord {
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
        real_qty: take_qty(map, "real_qty"),
        must_qty: take_qty(map, "must_qty"),
    })
}

fn decode_sales_order(map: &HashMap<&'static str, DecodedValue>) -> Result<SalesOrderRecord> {
    Ok(SalesOrderRecord {
        bill_no: take_str(map, "bill_no")?,
        mto: Mto::parse(take_str(map, "mto")?)?,
        material_code: MaterialCode::new(take_str(map, "material_code")?),
        customer_name: take_opt_str(map, "customer_name").unwrap_or_default(),
        delivery_date: take_opt_str(map, "delivery_date").unwrap_or_default(),
        qty: take_qty(map, "qty"),
        aux_prop_id: take_aux_prop(map, "aux_prop_id"),
    })
}

/// The nine readers, wired over a shared `UpstreamClient`. Mto fields use
/// the upstream's own mixed-case spelling verbatim (`spec.md` §4.2 note).
pub struct ReaderRegistry {
    pub production_order: Reader<ProductionOrderRecord>,
    pub production_bom: Reader<ProductionBomRecord>,
    pub production_receipt: Reader<ProductionReceiptRecord>,
    pub purchase_order: Reader<PurchaseOrderRecord>,
    pub purchase_receipt: Reader<PurchaseReceiptRecord>,
    pub subcontract_order: Reader<SubcontractOrderRecord>,
    pub material_picking: Reader<MaterialPickingRecord>,
    pub sales_delivery: Reader<SalesDeliveryRecord>,
    pub sales_order: Reader<SalesOrderRecord>,
}

impl ReaderRegistry {
    #[must_use]
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        use FieldDecoder::{Int, OptStr, Qty as QtyDec, Str};

        Self {
            production_order: Reader::new(
                ReaderConfig {
                    form_id: "production-order",
                    date_field: "create_date",
                    mto_field: "mto_a",
                    field_mappings: vec![
                        FieldMapping::new("bill_no", "bill_no", Str),
                        FieldMapping::new("mto", "mto_a", Str),
                        FieldMapping::new("workshop", "workshop", OptStr),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("material_name", "material_name", OptStr),
                        FieldMapping::new("specification", "specification", OptStr),
                        FieldMapping::new("qty", "qty", QtyDec),
                        FieldMapping::new("status", "status", OptStr),
                        FieldMapping::new("create_date", "create_date", OptStr),
                    ],
                },
                client.clone(),
                decode_production_order,
            ),
            production_bom: Reader::new(
                ReaderConfig {
                    form_id: "production-bom",
                    date_field: "create_date",
                    mto_field: "mto_b",
                    field_mappings: vec![
                        FieldMapping::new("mo_bill_no", "mo_bill_no", Str),
                        FieldMapping::new("mto", "mto_b", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                        FieldMapping::new("material_type", "material_type", Int),
                        FieldMapping::new("need_qty", "need_qty", QtyDec),
                        FieldMapping::new("picked_qty", "picked_qty", QtyDec),
                        FieldMapping::new("no_picked_qty", "no_picked_qty", QtyDec),
                    ],
                },
                client.clone(),
                decode_production_bom,
            ),
            production_receipt: Reader::new(
                ReaderConfig {
                    form_id: "production-receipt",
                    date_field: "create_date",
                    mto_field: "mto_c",
                    field_mappings: vec![
                        FieldMapping::new("mto", "mto_c", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                        FieldMapping::new("real_qty", "real_qty", QtyDec),
                        FieldMapping::new("must_qty", "must_qty", QtyDec),
                        FieldMapping::new("mo_bill_no", "mo_bill_no", OptStr),
                    ],
                },
                client.clone(),
                decode_production_receipt,
            ),
            purchase_order: Reader::new(
                ReaderConfig {
                    form_id: "purchase-order",
                    date_field: "create_date",
                    mto_field: "mto_c",
                    field_mappings: vec![
                        FieldMapping::new("bill_no", "bill_no", Str),
                        FieldMapping::new("mto", "mto_c", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                        FieldMapping::new("order_qty", "order_qty", QtyDec),
                        FieldMapping::new("stock_in_qty", "stock_in_qty", QtyDec),
                        FieldMapping::new("remain_stock_in_qty", "remain_stock_in_qty", QtyDec),
                    ],
                },
                client.clone(),
                decode_purchase_order,
            ),
            purchase_receipt: Reader::new(
                ReaderConfig {
                    form_id: "purchase-receipt",
                    date_field: "create_date",
                    mto_field: "mto_c",
                    field_mappings: vec![
                        FieldMapping::new("mto", "mto_c", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                        FieldMapping::new("real_qty", "real_qty", QtyDec),
                        FieldMapping::new("must_qty", "must_qty", QtyDec),
                        FieldMapping::new("bill_type", "bill_type", Str),
                    ],
                },
                client.clone(),
                decode_purchase_receipt,
            ),
            subcontract_order: Reader::new(
                ReaderConfig {
                    form_id: "subcontract-request",
                    date_field: "create_date",
                    mto_field: "mto_c",
                    field_mappings: vec![
                        FieldMapping::new("bill_no", "bill_no", Str),
                        FieldMapping::new("mto", "mto_c", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("order_qty", "order_qty", QtyDec),
                        FieldMapping::new("stock_in_qty", "stock_in_qty", QtyDec),
                        FieldMapping::new("no_stock_in_qty", "no_stock_in_qty", QtyDec),
                    ],
                },
                client.clone(),
                decode_subcontract_order,
            ),
            material_picking: Reader::new(
                ReaderConfig {
                    form_id: "picking",
                    date_field: "create_date",
                    mto_field: "mto_b",
                    field_mappings: vec![
                        FieldMapping::new("mto", "mto_b", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("app_qty", "app_qty", QtyDec),
                        FieldMapping::new("actual_qty", "actual_qty", QtyDec),
                        FieldMapping::new("ppbom_bill_no", "ppbom_bill_no", OptStr),
                    ],
                },
                client.clone(),
                decode_material_picking,
            ),
            sales_delivery: Reader::new(
                ReaderConfig {
                    form_id: "sales-delivery",
                    date_field: "create_date",
                    mto_field: "mto_b",
                    field_mappings: vec![
                        FieldMapping::new("mto", "mto_b", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                        FieldMapping::new("real_qty", "real_qty", QtyDec),
                        FieldMapping::new("must_qty", "must_qty", QtyDec),
                    ],
                },
                client.clone(),
                decode_sales_delivery,
            ),
            sales_order: Reader::new(
                ReaderConfig {
                    form_id: "sales-order",
                    date_field: "delivery_date",
                    mto_field: "mto_c",
                    field_mappings: vec![
                        FieldMapping::new("bill_no", "bill_no", Str),
                        FieldMapping::new("mto", "mto_c", Str),
                        FieldMapping::new("material_code", "material_code", Str),
                        FieldMapping::new("customer_name", "customer_name", OptStr),
                        FieldMapping::new("delivery_date", "delivery_date", OptStr),
                        FieldMapping::new("qty", "qty", QtyDec),
                        FieldMapping::new("aux_prop_id", "aux_prop_id", Int),
                    ],
                },
                client,
                decode_sales_order,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cx::CallerId;
    use crate::upstream::mock::MockUpstream;

    fn bom_raw(mto: &str, material: &str, need: &str, picked: &str) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("mo_bill_no".to_string(), serde_json::json!("MO-1"));
        r.insert("mto_b".to_string(), serde_json::json!(mto));
        r.insert("material_code".to_string(), serde_json::json!(material));
        r.insert("need_qty".to_string(), serde_json::json!(need));
        r.insert("picked_qty".to_string(), serde_json::json!(picked));
        r.insert("no_picked_qty".to_string(), serde_json::json!("0"));
        r
    }

    #[tokio::test]
    async fn production_bom_reader_decodes_and_defaults_aux_prop() {
        let mock = MockUpstream::new();
        mock.seed(
            "production-bom",
            vec![bom_raw("AK2510034", "05.02.003", "200", "50")],
        );
        let client = Arc::new(UpstreamClient::new(Arc::new(mock), 2000));
        let registry = ReaderRegistry::new(client);
        let cx = Cx::background(CallerId::internal("test"));
        let mto = Mto::parse("AK2510034").unwrap();
        let records = registry.production_bom.fetch_by_mto(&cx, &mto).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].aux_prop_id, 0);
        assert_eq!(records[0].need_qty, Qty::new(200, 0));
    }

    #[test]
    fn bill_type_parses_case_insensitively() {
        assert_eq!(BillType::parse("subcontract"), BillType::Subcontract);
        assert_eq!(BillType::parse("Subcontract"), BillType::Subcontract);
        assert_eq!(BillType::parse("standard"), BillType::Standard);
        assert_eq!(BillType::parse("anything-else"), BillType::Standard);
    }
}
