//! Ownership graph infrastructure implementations
//!
//! Concrete implementation of the ownership graph repository trait using
//! SQLite.

mod repository;

pub use repository::SqliteOwnershipGraphRepository;
