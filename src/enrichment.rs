/// Product enrichment pipeline
///
/// For every product summary:
/// 1. Fetch its variant list from BSale (bounded, single attempt)
/// 2. Normalize price/stock fields of each variant
/// 3. Aggregate into price range, stock totals and availability
///
/// A product whose variants cannot be obtained gets the fallback-empty
/// record; it never fails the page.
use crate::aggregator::aggregate;
use crate::bsale_client::BsaleClient;
use crate::config::Config;
use crate::errors::VariantFetchError;
use crate::models::{EnrichedProduct, PriceFormat, ProductStats, ProductSummary};
use crate::normalizer::{normalize_variants, FieldPriority};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Fans variant lookups out over a page of products.
///
/// The limiter is shared by every request served by this enricher, so the
/// number of in-flight variant fetches never exceeds `concurrency`.
#[derive(Clone)]
pub struct ProductEnricher {
    client: BsaleClient,
    fields: Arc<FieldPriority>,
    price_format: Arc<PriceFormat>,
    limiter: Arc<Semaphore>,
}

impl ProductEnricher {
    pub fn new(
        client: BsaleClient,
        fields: FieldPriority,
        price_format: PriceFormat,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            fields: Arc::new(fields),
            price_format: Arc::new(price_format),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn from_config(client: BsaleClient, config: &Config) -> Self {
        Self::new(
            client,
            config.field_priority.clone(),
            config.price_format.clone(),
            config.enrichment_concurrency,
        )
    }

    /// Builds the enriched record from a fetch outcome.
    ///
    /// Pure apart from the `lastUpdated` timestamp.
    pub fn assemble(
        &self,
        summary: ProductSummary,
        fetched: Result<Vec<Value>, VariantFetchError>,
    ) -> EnrichedProduct {
        match fetched {
            Ok(raw) => {
                let variants = normalize_variants(&raw, &self.fields);
                EnrichedProduct::new(summary, aggregate(variants, &self.price_format))
            }
            Err(e) => {
                tracing::warn!(
                    "Variant fetch failed for product {}: {}. Using fallback record",
                    summary.id().unwrap_or_default(),
                    e
                );
                EnrichedProduct::new(summary, ProductStats::empty())
            }
        }
    }

    /// Enriches a single product.
    pub async fn enrich_one(&self, summary: ProductSummary, token: &str) -> EnrichedProduct {
        let Some(product_id) = summary.id() else {
            tracing::warn!("Product without identifier, using fallback record");
            return EnrichedProduct::new(summary, ProductStats::empty());
        };

        let fetched = {
            // The semaphore is never closed; a failed acquire just skips the bound
            let _permit = self.limiter.acquire().await.ok();
            self.client.fetch_variants(token, &product_id).await
        };

        self.assemble(summary, fetched)
    }

    /// Enriches a page of products concurrently.
    ///
    /// `output[i]` always corresponds to `summaries[i]`, whatever order the
    /// lookups complete in.
    pub async fn enrich_page(
        &self,
        summaries: Vec<ProductSummary>,
        token: &str,
    ) -> Vec<EnrichedProduct> {
        if summaries.is_empty() {
            return Vec::new();
        }

        tracing::info!("Enriching {} product(s)", summaries.len());

        let pending: Vec<_> = summaries
            .into_iter()
            .map(|summary| {
                let enricher = self.clone();
                let token = token.to_string();
                let task_summary = summary.clone();
                let handle =
                    tokio::spawn(async move { enricher.enrich_one(task_summary, &token).await });
                (summary, handle)
            })
            .collect();

        let mut enriched = Vec::with_capacity(pending.len());
        for (summary, handle) in pending {
            match handle.await {
                Ok(product) => enriched.push(product),
                Err(e) => {
                    tracing::error!(
                        "Enrichment task for product {} failed: {}",
                        summary.id().unwrap_or_default(),
                        e
                    );
                    enriched.push(EnrichedProduct::new(summary, ProductStats::empty()));
                }
            }
        }

        let fallbacks = enriched
            .iter()
            .filter(|p| p.stats.total_variants == 0)
            .count();
        tracing::info!(
            "✓ Enriched {} product(s), {} without variants",
            enriched.len(),
            fallbacks
        );

        enriched
    }
}
