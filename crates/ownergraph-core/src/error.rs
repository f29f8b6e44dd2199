//! Error types for ownergraph

use thiserror::Error;

/// Result type alias using ownergraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// ownergraph error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (E100-E199)
    #[error("Invalid organization number '{0}'. Expected 10 digits, e.g. 556043-4200.")]
    InvalidIdentifier(String),

    #[error("Entity '{0}' cannot own itself.")]
    SelfOwnership(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Resolution errors (E200-E299)
    #[error("Entity '{0}' not found. Run `ownergraph ingest {0} <NAME>` to create it.")]
    EntityNotFound(String),

    // Collaborator errors (E300-E399)
    #[error("{service} did not answer within {seconds} seconds")]
    CollaboratorTimeout { service: String, seconds: u64 },

    #[error("{service} is unavailable: {reason}")]
    CollaboratorUnavailable { service: String, reason: String },

    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("API key not set. Export {0} or add it to .env.")]
    MissingApiKey(String),

    // Storage errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Ingestion of '{entity_id}' aborted after {companies_processed} companies: {source}")]
    IngestionAborted {
        entity_id: String,
        companies_processed: usize,
        #[source]
        source: Box<Error>,
    },

    // Config errors (E500-E599)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "E100",
            Self::SelfOwnership(_) => "E101",
            Self::InvalidInput(_) => "E102",
            Self::EntityNotFound(_) => "E200",
            Self::CollaboratorTimeout { .. } => "E300",
            Self::CollaboratorUnavailable { .. } => "E301",
            Self::NetworkError(_) => "E302",
            Self::LLMError(_) => "E303",
            Self::RateLimited(_) => "E304",
            Self::MissingApiKey(_) => "E305",
            Self::DatabaseError(_) => "E400",
            Self::MigrationFailed(_) => "E401",
            Self::SerializationError(_) => "E402",
            Self::IngestionAborted { .. } => "E403",
            Self::ConfigError(_) => "E500",
            Self::Other(_) | Self::Io(_) => "E999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidIdentifier(_) => Some("ownergraph validate <ID>".to_string()),
            Self::EntityNotFound(id) => Some(format!("ownergraph ingest {} <NAME>", id)),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::MissingApiKey(var) => Some(format!("export {}=...", var)),
            Self::ConfigError(_) => Some("ownergraph config show".to_string()),
            Self::DatabaseError(_) | Self::MigrationFailed(_) => {
                Some("Check the --db path or remove a corrupt database file".to_string())
            }
            Self::IngestionAborted { entity_id, .. } => {
                Some(format!("Re-run `ownergraph ingest {}`; finished work is kept", entity_id))
            }
            _ => None,
        }
    }

    /// Whether this error comes from the graph store.
    ///
    /// Store failures are the only errors that abort an ingestion run.
    pub fn is_store_failure(&self) -> bool {
        match self {
            Self::DatabaseError(_) | Self::MigrationFailed(_) | Self::SerializationError(_) => true,
            Self::IngestionAborted { source, .. } => source.is_store_failure(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
