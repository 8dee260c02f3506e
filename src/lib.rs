//! BSale Catalog Proxy Library
//!
//! This library provides the core functionality for the BSale catalog proxy:
//! an HTTP boundary that forwards product and client requests to the BSale
//! REST API and enriches product responses with variant, price and stock
//! aggregates.
//!
//! # Modules
//!
//! - `aggregator`: Price and stock aggregation over variants.
//! - `bsale_client`: BSale API client.
//! - `config`: Configuration management.
//! - `enrichment`: Concurrent product enrichment pipeline.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `models`: Core data models.
//! - `normalizer`: Variant field normalization.

pub mod aggregator;
pub mod bsale_client;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
