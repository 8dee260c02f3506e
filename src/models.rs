use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============ Upstream Models ============

/// A product as returned by the upstream API.
///
/// Kept as the raw JSON object so every upstream field survives enrichment
/// untouched. Only the identifier and name are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductSummary(Map<String, Value>);

impl ProductSummary {
    /// Builds a summary from any JSON value; only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Upstream identifier, accepting both numeric and string ids.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// `name` (BSale) or `title` (Shopify).
    pub fn name(&self) -> Option<&str> {
        self.0
            .get("name")
            .or_else(|| self.0.get("title"))
            .and_then(Value::as_str)
    }
}

// ============ Enrichment Models ============

/// A variant after field normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRecord {
    pub id: String,
    pub code: String,
    pub description: String,
    /// Canonical price resolved from the candidate price fields.
    pub price: f64,
    /// Canonical stock resolved from the candidate stock fields.
    pub stock: f64,
    pub available: bool,
    pub barcode: String,
    /// Up to three attribute values (size, color, ...), upstream order.
    pub attributes: Vec<String>,
}

/// Derived commercial fields computed from a product's variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    /// Display price, the lowest positive variant price.
    pub price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub average_price: f64,
    pub price_range: String,
    pub has_price_range: bool,
    pub total_stock: f64,
    pub max_variant_stock: f64,
    pub min_variant_stock: f64,
    pub available_variants: usize,
    pub out_of_stock_variants: usize,
    pub variants: Vec<VariantRecord>,
    pub total_variants: usize,
    pub has_multiple_variants: bool,
    pub is_available: bool,
}

/// Field names owned by [`ProductStats`] and [`EnrichedProduct`].
///
/// Upstream keys with these names are dropped before flattening so the
/// serialized product never carries duplicate keys.
pub const DERIVED_FIELDS: &[&str] = &[
    "price",
    "minPrice",
    "maxPrice",
    "averagePrice",
    "priceRange",
    "hasPriceRange",
    "totalStock",
    "maxVariantStock",
    "minVariantStock",
    "availableVariants",
    "outOfStockVariants",
    "variants",
    "totalVariants",
    "hasMultipleVariants",
    "isAvailable",
    "lastUpdated",
];

/// A product summary augmented with derived fields.
///
/// Serializes as a single flat JSON object: upstream fields first, then the
/// derived ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedProduct {
    #[serde(flatten)]
    pub summary: Map<String, Value>,
    #[serde(flatten)]
    pub stats: ProductStats,
    pub last_updated: DateTime<Utc>,
}

impl EnrichedProduct {
    pub fn new(summary: ProductSummary, stats: ProductStats) -> Self {
        let mut fields = summary.0;
        for key in DERIVED_FIELDS {
            fields.remove(*key);
        }

        Self {
            summary: fields,
            stats,
            last_updated: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Currency rendering used for `priceRange`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFormat {
    pub symbol: String,
    pub thousands_separator: String,
    pub decimal_separator: String,
    pub decimals: u32,
}

impl Default for PriceFormat {
    /// Chilean peso convention used by BSale: `$1.500`.
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            thousands_separator: ".".to_string(),
            decimal_separator: ",".to_string(),
            decimals: 0,
        }
    }
}

// ============ API Request Models ============

/// Query parameters for `GET /api/products` and `GET /api/products/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQueryParams {
    /// Per-request credential; falls back to the configured token.
    pub token: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Enrichment is on unless explicitly disabled.
    pub enrich: Option<bool>,
    /// Single-product lookup on the list route.
    pub id: Option<String>,
}

impl ProductQueryParams {
    pub fn should_enrich(&self) -> bool {
        self.enrich.unwrap_or(true)
    }
}

/// Query parameters for `/api/clients`.
#[derive(Debug, Default, Deserialize)]
pub struct ClientQueryParams {
    pub token: Option<String>,
    pub code: Option<String>,
}

/// Query parameters shared by the POST routes.
#[derive(Debug, Default, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}
