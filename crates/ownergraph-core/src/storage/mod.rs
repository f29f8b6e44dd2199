//! Storage layer - SQLite
//!
//! Provides database management and migrations for ownergraph.
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Schema versioning and automatic migration
//!
//! # Usage
//!
//! ```ignore
//! use ownergraph_core::storage::Database;
//!
//! // In-memory database for tests
//! let db = Database::in_memory().await?;
//!
//! // Or a file-backed one
//! let db = Database::open("graph.db").await?;
//! let repo = db.repository();
//! ```

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
