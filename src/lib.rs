//! CAT NAT Prefill API Library
//!
//! This library turns an Italian VAT number (P.IVA) into a prefilled
//! natural-catastrophe insurance record: company data, coordinates, building
//! attributes, flood proxy and a suggested coverage, each field carrying its
//! provenance and confidence.
//!
//! # Modules
//!
//! - `app`: Startup wiring and routes.
//! - `audit`: Provenance records and best-effort audit writes.
//! - `cache_store`: Cache storage trait and in-memory implementation.
//! - `cache_validator`: Query hashing and cache entry checksums.
//! - `circuit_breaker`: Circuit breaker for upstream calls.
//! - `clock`: Injectable time source.
//! - `confidence`: Confidence levels and source attribution.
//! - `config`: Configuration management.
//! - `coverage`: Parametric coverage model.
//! - `db`: Database connection and schema.
//! - `db_storage`: Postgres cache store and audit sink.
//! - `enrichment`: The prefill pipeline.
//! - `errors`: Error handling types.
//! - `geocoding`: Nominatim client and geocoding cache.
//! - `geometry`: Polygons, areas and distances.
//! - `google`: Google Maps client (geocoding, elevation, Street View).
//! - `handlers`: HTTP request handlers.
//! - `inference`: Building attribute inference.
//! - `map_data`: Cached, rate-limited map-data gateway.
//! - `models`: Core data models.
//! - `osm`: OpenStreetMap response parsing and building source.
//! - `overpass`: Overpass QL queries and client.
//! - `rate_limiter`: Serialized, spaced job queue.
//! - `registry`: Company registries (mock and Cerved).
//! - `risk`: Flood proxy scoring.
//! - `sources`: Collaborator traits.

pub mod app;
pub mod audit;
pub mod cache_store;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod clock;
pub mod confidence;
pub mod config;
pub mod coverage;
pub mod db;
pub mod db_storage;
pub mod enrichment;
pub mod errors;
pub mod geocoding;
pub mod geometry;
pub mod google;
pub mod handlers;
pub mod inference;
pub mod map_data;
pub mod models;
pub mod osm;
pub mod overpass;
pub mod rate_limiter;
pub mod registry;
pub mod risk;
pub mod sources;
