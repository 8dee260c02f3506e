//! Field normalization for raw upstream variant records.
//!
//! Price and stock live under different keys depending on the API version
//! (and on whether the payload is BSale- or Shopify-shaped). Each is resolved
//! through an ordered candidate list where the first non-zero value wins.

use crate::models::VariantRecord;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_PRICE_FIELDS: &[&str] =
    &["finalPrice", "price", "salePrice", "variantValue", "unitValue"];

pub const DEFAULT_STOCK_FIELDS: &[&str] = &[
    "quantityAvailable",
    "quantity",
    "stock",
    "inventory_quantity",
    "inventoryQuantity",
];

/// Number of attribute slots a variant can carry.
const ATTRIBUTE_SLOTS: usize = 3;

/// Ordered candidate field names for price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldPriority {
    pub price: Vec<String>,
    pub stock: Vec<String>,
}

impl Default for FieldPriority {
    fn default() -> Self {
        Self {
            price: DEFAULT_PRICE_FIELDS.iter().map(|s| s.to_string()).collect(),
            stock: DEFAULT_STOCK_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Reads a JSON number or numeric string as `f64`.
///
/// Non-finite and unparseable values yield `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// First-non-zero-wins resolution over `candidates`. All missing or zero → 0.
pub fn resolve_number(record: &Map<String, Value>, candidates: &[String]) -> f64 {
    candidates
        .iter()
        .filter_map(|field| record.get(field).and_then(as_number))
        .find(|n| *n != 0.0)
        .unwrap_or(0.0)
}

fn first_string(record: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| match record.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_default()
}

fn attributes(record: &Map<String, Value>) -> Vec<String> {
    (1..=ATTRIBUTE_SLOTS)
        .filter_map(|slot| {
            let option = format!("option{}", slot);
            let attribute = format!("attribute{}", slot);
            let value = first_string(record, &[option.as_str(), attribute.as_str()]);
            (!value.is_empty()).then_some(value)
        })
        .collect()
}

/// Normalizes one raw variant object. Returns `None` for non-objects.
pub fn normalize_variant(raw: &Value, fields: &FieldPriority) -> Option<VariantRecord> {
    let record = raw.as_object()?;

    let price = resolve_number(record, &fields.price);
    let stock = resolve_number(record, &fields.stock);

    // BSale marks discontinued variants with state != 0
    let listed = record
        .get("state")
        .and_then(Value::as_i64)
        .map_or(true, |state| state == 0);
    let available = record
        .get("available")
        .and_then(Value::as_bool)
        .unwrap_or(stock > 0.0)
        && listed;

    Some(VariantRecord {
        id: first_string(record, &["id"]),
        code: first_string(record, &["code", "sku"]),
        description: first_string(record, &["description", "title"]),
        price,
        stock,
        available,
        barcode: first_string(record, &["barCode", "barcode"]),
        attributes: attributes(record),
    })
}

/// Normalizes a raw variant list, skipping entries that are not objects.
pub fn normalize_variants(raw: &[Value], fields: &FieldPriority) -> Vec<VariantRecord> {
    raw.iter()
        .filter_map(|value| {
            let normalized = normalize_variant(value, fields);
            if normalized.is_none() {
                tracing::debug!("Skipping non-object variant entry: {}", value);
            }
            normalized
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_as_number_accepts_numeric_strings() {
        assert_eq!(as_number(&json!(12)), Some(12.0));
        assert_eq!(as_number(&json!("12.99")), Some(12.99));
        assert_eq!(as_number(&json!(" 3 ")), Some(3.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn test_resolve_number_skips_zero_candidates() {
        let fields = FieldPriority::default();
        let record = obj(json!({"finalPrice": 0, "price": "1990", "salePrice": 1500}));
        assert_eq!(resolve_number(&record, &fields.price), 1990.0);
    }

    #[test]
    fn test_resolve_number_defaults_to_zero() {
        let fields = FieldPriority::default();
        assert_eq!(resolve_number(&obj(json!({})), &fields.stock), 0.0);
        assert_eq!(
            resolve_number(&obj(json!({"quantity": 0, "stock": "x"})), &fields.stock),
            0.0
        );
    }

    #[test]
    fn test_attributes_take_first_three_slots() {
        let record = obj(json!({
            "option1": "M",
            "attribute2": "Red",
            "option3": "",
            "attribute3": "Cotton",
            "option4": "ignored"
        }));
        assert_eq!(attributes(&record), vec!["M", "Red", "Cotton"]);
    }

    #[test]
    fn test_non_object_is_skipped() {
        let fields = FieldPriority::default();
        assert!(normalize_variant(&json!("nope"), &fields).is_none());
        assert_eq!(
            normalize_variants(&[json!(1), json!({"id": 2})], &fields).len(),
            1
        );
    }
}
