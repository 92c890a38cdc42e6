//! ClickFold - Object graph reconstruction over ClickHouse query results
//!
//! This crate turns flat, joined result rows into nested entity graphs:
//! - Entity catalogs describing types, keys and child fields
//! - Field path resolution and type sequences
//! - Identity-table row folding with configurable null handling
//! - Multi-result-set reconstruction with batched child statements
//! - ClickHouse and in-memory row sources

pub mod config;
pub mod entity_catalog;
pub mod materializer;
pub mod row_source;
