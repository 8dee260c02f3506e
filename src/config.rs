use crate::models::PriceFormat;
use crate::normalizer::{FieldPriority, DEFAULT_PRICE_FIELDS, DEFAULT_STOCK_FIELDS};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// BSale's hard cap on `limit` for list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 50;

const DEFAULT_BASE_URL: &str = "https://api.bsale.io/v1";

/// How the access credential is attached to upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `access_token: <token>` (BSale native header).
    AccessToken,
    /// `Authorization: Bearer <token>`.
    Bearer,
}

impl FromStr for AuthScheme {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "access_token" | "access-token" => Ok(AuthScheme::AccessToken),
            "bearer" => Ok(AuthScheme::Bearer),
            other => anyhow::bail!(
                "BSALE_AUTH_SCHEME must be 'bearer' or 'access_token', got '{}'",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub bsale_base_url: String,
    /// Credential used when a request does not carry its own `token`.
    pub bsale_access_token: String,
    pub auth_scheme: AuthScheme,
    pub variant_timeout_secs: u64,
    pub enrichment_concurrency: usize,
    pub product_page_limit: u32,
    pub field_priority: FieldPriority,
    pub price_format: PriceFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: parse_var("PORT", 3000u16)
                .and_then(|port| {
                    if port == 0 {
                        anyhow::bail!("PORT must be a valid number between 1-65535");
                    }
                    Ok(port)
                })?,
            bsale_base_url: base_url_var()?,
            bsale_access_token: std::env::var("BSALE_ACCESS_TOKEN")
                .map_err(|_| anyhow::anyhow!("BSALE_ACCESS_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("BSALE_ACCESS_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            auth_scheme: std::env::var("BSALE_AUTH_SCHEME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(AuthScheme::Bearer),
            variant_timeout_secs: parse_var("VARIANT_FETCH_TIMEOUT_SECS", 5u64).and_then(
                |secs| {
                    if secs == 0 {
                        anyhow::bail!("VARIANT_FETCH_TIMEOUT_SECS must be greater than zero");
                    }
                    Ok(secs)
                },
            )?,
            enrichment_concurrency: parse_var("ENRICHMENT_CONCURRENCY", 10usize).and_then(
                |n| {
                    if n == 0 {
                        anyhow::bail!("ENRICHMENT_CONCURRENCY must be greater than zero");
                    }
                    Ok(n)
                },
            )?,
            product_page_limit: parse_var("PRODUCT_PAGE_LIMIT", MAX_PAGE_LIMIT).and_then(
                |limit| {
                    if limit == 0 || limit > MAX_PAGE_LIMIT {
                        anyhow::bail!("PRODUCT_PAGE_LIMIT must be between 1-{}", MAX_PAGE_LIMIT);
                    }
                    Ok(limit)
                },
            )?,
            field_priority: FieldPriority {
                price: field_list("VARIANT_PRICE_FIELDS", DEFAULT_PRICE_FIELDS),
                stock: field_list("VARIANT_STOCK_FIELDS", DEFAULT_STOCK_FIELDS),
            },
            price_format: PriceFormat {
                symbol: std::env::var("PRICE_SYMBOL").unwrap_or_else(|_| "$".to_string()),
                thousands_separator: std::env::var("PRICE_THOUSANDS_SEPARATOR")
                    .unwrap_or_else(|_| ".".to_string()),
                decimal_separator: std::env::var("PRICE_DECIMAL_SEPARATOR")
                    .unwrap_or_else(|_| ",".to_string()),
                decimals: parse_var("PRICE_DECIMALS", 0u32).and_then(|d| {
                    if d > 6 {
                        anyhow::bail!("PRICE_DECIMALS must be between 0-6");
                    }
                    Ok(d)
                })?,
            },
        };

        // Never log the token itself
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("BSale Base URL: {}", config.bsale_base_url);
        tracing::debug!("Auth scheme: {:?}", config.auth_scheme);
        tracing::debug!(
            "Variant timeout: {}s, concurrency: {}, page limit: {}",
            config.variant_timeout_secs,
            config.enrichment_concurrency,
            config.product_page_limit
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn variant_timeout(&self) -> Duration {
        Duration::from_secs(self.variant_timeout_secs)
    }
}

fn base_url_var() -> anyhow::Result<String> {
    let url = std::env::var("BSALE_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    validate_base_url(url.trim())?;
    Ok(url.trim().trim_end_matches('/').to_string())
}

/// Checks that `raw` is an absolute http(s) URL.
pub fn validate_base_url(raw: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| anyhow::anyhow!("BSALE_BASE_URL is not a valid URL: {}", e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("BSALE_BASE_URL must start with http:// or https://");
    }
    Ok(())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        _ => Ok(default),
    }
}

fn field_list(name: &str, default: &[&str]) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|raw| split_field_list(&raw))
        .filter(|fields| !fields.is_empty())
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
}

/// Splits a comma-separated list of field names, dropping blanks.
pub fn split_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_scheme_parsing() {
        assert_eq!("bearer".parse::<AuthScheme>().unwrap(), AuthScheme::Bearer);
        assert_eq!(
            " ACCESS_TOKEN ".parse::<AuthScheme>().unwrap(),
            AuthScheme::AccessToken
        );
        assert!("basic".parse::<AuthScheme>().is_err());
    }

    #[test]
    fn test_split_field_list() {
        assert_eq!(
            split_field_list("finalPrice, price,,  salePrice "),
            vec!["finalPrice", "price", "salePrice"]
        );
        assert!(split_field_list(" , ").is_empty());
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://api.bsale.io/v1").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("ftp://api.bsale.io").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}
