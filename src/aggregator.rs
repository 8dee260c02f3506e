//! Folds normalized variants into the derived commercial fields of a product.

use crate::models::{PriceFormat, ProductStats, VariantRecord};

/// `priceRange` when no variant carries a positive price.
pub const NO_PRICE_LABEL: &str = "no price";

impl ProductStats {
    /// The fallback-empty record: zeros, `"no price"`, no variants.
    pub fn empty() -> Self {
        Self {
            price: 0.0,
            min_price: 0.0,
            max_price: 0.0,
            average_price: 0.0,
            price_range: NO_PRICE_LABEL.to_string(),
            has_price_range: false,
            total_stock: 0.0,
            max_variant_stock: 0.0,
            min_variant_stock: 0.0,
            available_variants: 0,
            out_of_stock_variants: 0,
            variants: Vec::new(),
            total_variants: 0,
            has_multiple_variants: false,
            is_available: false,
        }
    }
}

/// Clamps an overflowed sum to the largest finite value; NaN becomes zero.
fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f64::MIN, f64::MAX)
    }
}

/// Computes price and stock aggregates over `variants`.
///
/// Zero-priced variants are excluded from price statistics but still count
/// towards stock statistics.
pub fn aggregate(variants: Vec<VariantRecord>, format: &PriceFormat) -> ProductStats {
    if variants.is_empty() {
        return ProductStats::empty();
    }

    let prices: Vec<f64> = variants
        .iter()
        .map(|v| v.price)
        .filter(|p| *p > 0.0)
        .collect();

    let (min_price, max_price, average_price) = if prices.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        // Summation rounding can push the mean just outside [min, max]
        (min, max, mean.clamp(min, max))
    };

    let price_range = if prices.is_empty() {
        NO_PRICE_LABEL.to_string()
    } else {
        format_price_range(min_price, max_price, format)
    };

    let total_stock = saturate(variants.iter().map(|v| v.stock).sum());
    let max_variant_stock = variants
        .iter()
        .map(|v| v.stock)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_variant_stock = variants
        .iter()
        .map(|v| v.stock)
        .fold(f64::INFINITY, f64::min);
    let available_variants = variants.iter().filter(|v| v.stock > 0.0).count();
    let total_variants = variants.len();

    ProductStats {
        price: min_price,
        min_price,
        max_price,
        average_price,
        price_range,
        has_price_range: min_price != max_price,
        total_stock,
        max_variant_stock,
        min_variant_stock,
        available_variants,
        out_of_stock_variants: total_variants - available_variants,
        variants,
        total_variants,
        has_multiple_variants: total_variants > 1,
        is_available: total_stock > 0.0,
    }
}

/// `"$100"` when both ends match, `"$100 - $250"` otherwise.
pub fn format_price_range(min: f64, max: f64, format: &PriceFormat) -> String {
    if min == max {
        format_amount(min, format)
    } else {
        format!(
            "{} - {}",
            format_amount(min, format),
            format_amount(max, format)
        )
    }
}

/// Renders an amount with the currency symbol and grouped thousands.
pub fn format_amount(amount: f64, format: &PriceFormat) -> String {
    let scale = 10u128.pow(format.decimals);
    let scaled = (amount.abs() * scale as f64).round() as u128;
    let whole = group_thousands(&(scaled / scale).to_string(), &format.thousands_separator);
    let sign = if amount < 0.0 && scaled > 0 { "-" } else { "" };

    if format.decimals == 0 {
        format!("{}{}{}", sign, format.symbol, whole)
    } else {
        format!(
            "{}{}{}{}{:0width$}",
            sign,
            format.symbol,
            whole,
            format.decimal_separator,
            scaled % scale,
            width = format.decimals as usize
        )
    }
}

fn group_thousands(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("0", "."), "0");
        assert_eq!(group_thousands("999", "."), "999");
        assert_eq!(group_thousands("1000", "."), "1.000");
        assert_eq!(group_thousands("1234567", ","), "1,234,567");
    }

    #[test]
    fn test_format_amount_rounds_to_configured_decimals() {
        let clp = PriceFormat::default();
        assert_eq!(format_amount(1499.6, &clp), "$1.500");

        let usd = PriceFormat {
            symbol: "$".to_string(),
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            decimals: 2,
        };
        assert_eq!(format_amount(1234.5, &usd), "$1,234.50");
        assert_eq!(format_amount(0.05, &usd), "$0.05");
    }
}
