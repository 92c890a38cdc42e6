//! Unit tests - Public API checks that need no external services
//!
//! Catalog parsing, parameter handling and row-source plumbing, exercised the way
//! downstream crates call them.

mod catalog_loading_tests;
mod row_source_tests;
