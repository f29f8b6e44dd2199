//! ownergraph core library
//!
//! This crate builds a deduplicated ownership graph of companies and funds:
//! - Domain model (entities, ownership edges, merge law, resolution)
//! - Ingestion (recursive portfolio walk, investor discovery)
//! - Storage (SQLite graph store with migrations)
//! - Collaborators (annual reports, web search, LLM extraction)
//! - Configuration (TOML file plus environment)

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod storage;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::ownership::{
        Collaborators, Entity, EntityRole, IngestRequest, IngestionResult, IngestionService,
        IngestionSettings, OrgNumber, OwnershipEdge, OwnershipGraphRepository,
    };
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::ownership::SqliteOwnershipGraphRepository;
    pub use crate::storage::{Database, DatabaseConfig};
}
