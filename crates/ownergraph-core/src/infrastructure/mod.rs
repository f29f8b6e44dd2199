//! Infrastructure layer
//!
//! Contains implementations for external systems: the SQLite graph store,
//! the web search client and the report-backed document source.

pub mod extraction;
pub mod ownership;
pub mod search;
