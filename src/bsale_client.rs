use crate::config::{AuthScheme, Config};
use crate::errors::{AppError, VariantFetchError};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// Keys under which list endpoints return their records.
///
/// BSale wraps lists in `items`; Shopify uses `products`/`variants`.
pub const LIST_KEYS: &[&str] = &["items", "products", "variants", "data"];

/// Page size BSale uses for client listings.
const CLIENT_PAGE_LIMIT: &str = "50";

/// Client for the BSale REST API.
///
/// Holds no credential of its own: every call takes the token to inject, so
/// one client serves requests carrying different tokens.
#[derive(Clone)]
pub struct BsaleClient {
    client: reqwest::Client,
    base_url: String,
    auth_scheme: AuthScheme,
    variant_timeout: Duration,
}

impl BsaleClient {
    /// Creates a new `BsaleClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the BSale API (e.g. `https://api.bsale.io/v1`).
    /// * `auth_scheme` - How the token is sent upstream.
    /// * `variant_timeout` - Bound applied to each variant lookup.
    pub fn new(
        base_url: impl Into<String>,
        auth_scheme: AuthScheme,
        variant_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create BSale client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_scheme,
            variant_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.bsale_base_url.clone(),
            config.auth_scheme,
            config.variant_timeout(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, upstream_path(path))
    }

    /// Builds `{base}/{segments..}.json`, each segment percent-encoded on its own.
    fn resource_url(&self, segments: &[&str]) -> Result<reqwest::Url, String> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        let (last, head) = segments
            .split_last()
            .ok_or_else(|| "empty resource path".to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(head)
            .push(&format!("{}.json", last));
        Ok(url)
    }

    fn url_with_params(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse_with_params(&self.url(path), params)
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))
    }

    fn authorize(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match self.auth_scheme {
            AuthScheme::AccessToken => request.header("access_token", token),
            AuthScheme::Bearer => request.header("Authorization", format!("Bearer {}", token)),
        }
    }

    /// Gets one page of products.
    ///
    /// # Arguments
    ///
    /// * `token` - The access credential to inject.
    /// * `limit` - Page size.
    /// * `offset` - Optional page offset.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The raw page payload.
    pub async fn list_products(
        &self,
        token: &str,
        limit: u32,
        offset: Option<u32>,
    ) -> Result<Value, AppError> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }
        let url = self.url_with_params("/products", &params)?;
        tracing::info!(
            "Fetching product page from BSale (limit: {}, offset: {:?})",
            limit,
            offset
        );

        let response = self
            .authorize(self.client.get(url), token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("BSale request failed: {}", e)))?;

        read_json(response, "product list").await
    }

    /// Gets a single product by id.
    ///
    /// Ids that could leave the `/products/{id}` resource are rejected with
    /// [`AppError::BadRequest`] before any upstream call.
    pub async fn get_product(&self, token: &str, product_id: &str) -> Result<Value, AppError> {
        let product_id = validate_product_id(product_id)?;
        let url = self
            .resource_url(&["products", product_id])
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;
        tracing::info!("Fetching product {} from BSale", product_id);

        let response = self
            .authorize(self.client.get(url), token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("BSale request failed: {}", e)))?;

        read_json(response, "product").await
    }

    /// Creates a product, forwarding `body` untouched.
    pub async fn create_product(&self, token: &str, body: &Value) -> Result<Value, AppError> {
        let url = self.url("/products");
        tracing::info!("Creating product in BSale");

        let response = self
            .authorize(self.client.post(&url), token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create product: {}", e)))?;

        read_json(response, "product creation").await
    }

    /// Lists clients, or looks one up by `code`.
    pub async fn list_clients(&self, token: &str, code: Option<&str>) -> Result<Value, AppError> {
        let params = match code {
            Some(code) => vec![("code", code.to_string())],
            None => vec![("limit", CLIENT_PAGE_LIMIT.to_string())],
        };
        let url = self.url_with_params("/clients", &params)?;
        tracing::info!("Fetching clients from BSale (code: {:?})", code);

        let response = self
            .authorize(self.client.get(url), token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("BSale request failed: {}", e)))?;

        read_json(response, "client list").await
    }

    /// Creates a client, forwarding `body` untouched.
    pub async fn create_client(&self, token: &str, body: &Value) -> Result<Value, AppError> {
        let url = self.url("/clients");
        tracing::info!("Creating client in BSale");

        let response = self
            .authorize(self.client.post(&url), token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create client: {}", e)))?;

        read_json(response, "client creation").await
    }

    /// Fetches the raw variant list of one product.
    ///
    /// Single attempt, bounded by the configured variant timeout. A payload
    /// without a recognizable list is treated as "no variants" rather than
    /// an error.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<Value>, VariantFetchError>` - Raw variant records in upstream order.
    pub async fn fetch_variants(
        &self,
        token: &str,
        product_id: &str,
    ) -> Result<Vec<Value>, VariantFetchError> {
        let product_id = validate_product_id(product_id)
            .map_err(|_| VariantFetchError::InvalidId(product_id.to_string()))?;
        let url = self
            .resource_url(&["products", product_id, "variants"])
            .map_err(|message| VariantFetchError::Unavailable {
                status: None,
                message,
            })?;
        tracing::debug!("Fetching variants for product {}", product_id);

        let response = self
            .authorize(self.client.get(url), token)
            .timeout(self.variant_timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VariantFetchError::Unavailable {
                status: Some(status.as_u16()),
                message,
            });
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) if e.is_timeout() => {
                return Err(VariantFetchError::Timeout(self.variant_timeout));
            }
            Err(e) => {
                tracing::warn!(
                    "Malformed variant payload for product {}: {}",
                    product_id,
                    e
                );
                return Ok(Vec::new());
            }
        };

        match extract_items(&payload) {
            Some(items) => Ok(items.clone()),
            None => {
                tracing::warn!(
                    "Variant payload for product {} has no item list, treating as empty",
                    product_id
                );
                Ok(Vec::new())
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> VariantFetchError {
        if err.is_timeout() {
            VariantFetchError::Timeout(self.variant_timeout)
        } else {
            VariantFetchError::Unavailable {
                status: None,
                message: err.to_string(),
            }
        }
    }
}

async fn read_json(response: Response, what: &str) -> Result<Value, AppError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: format!("BSale {} failed: {}", what, error_text),
        });
    }

    response.json().await.map_err(|e| {
        AppError::ExternalApiError(format!("Failed to parse BSale {} response: {}", what, e))
    })
}

/// Rewrites a resource path to BSale's `.json` form.
///
/// Ensures a leading `/` and appends `.json` unless the path already has it
/// or carries query parameters.
pub fn upstream_path(path: &str) -> String {
    let mut path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if !path.contains(".json") && !path.contains('?') && !path.contains('=') {
        path.push_str(".json");
    }
    path
}

/// Accepts a product id only if it names a single path segment.
///
/// BSale ids are numeric; Shopify handles add letters, `-` and `_`. Anything
/// else (separators, dot segments, query or fragment markers, escapes) could
/// address a different upstream resource.
pub fn validate_product_id(id: &str) -> Result<&str, AppError> {
    let id = id.trim();
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(id)
    } else {
        Err(AppError::BadRequest(format!("Invalid product id: {:?}", id)))
    }
}

/// Locates the record list inside a list payload.
///
/// Accepts a bare array or an object carrying one of [`LIST_KEYS`].
pub fn extract_items(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}
