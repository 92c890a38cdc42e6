//! Integration tests - Reconstruction through the public API against in-memory sources
//!
//! These tests verify that catalog loading, row shaping, folding and multi-source
//! orchestration work together. ClickHouse-backed runs live in the e2e suite.

mod distinct_tests;
mod fixtures;
mod multi_source_tests;
