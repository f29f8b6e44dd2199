//! Error module tests

use crate::error::{Error, Result};

#[test]
fn test_invalid_identifier_error() {
    let error = Error::InvalidIdentifier("12-34".to_string());
    assert_eq!(error.code(), "E100");
    assert_eq!(
        error.suggestion(),
        Some("ownergraph validate <ID>".to_string())
    );
    assert!(error.to_string().contains("12-34"));
}

#[test]
fn test_entity_not_found_error() {
    let error = Error::EntityNotFound("556043-4200".to_string());
    assert_eq!(error.code(), "E200");
    assert_eq!(
        error.suggestion(),
        Some("ownergraph ingest 556043-4200 <NAME>".to_string())
    );
}

#[test]
fn test_collaborator_timeout_error() {
    let error = Error::CollaboratorTimeout {
        service: "web search".to_string(),
        seconds: 30,
    };
    assert_eq!(error.code(), "E300");
    assert_eq!(error.suggestion(), None);
    assert!(error.to_string().contains("30 seconds"));
    assert!(!error.is_store_failure());
}

#[test]
fn test_missing_api_key_error() {
    let error = Error::MissingApiKey("TAVILY_API_KEY".to_string());
    assert_eq!(error.code(), "E305");
    assert_eq!(
        error.suggestion(),
        Some("export TAVILY_API_KEY=...".to_string())
    );
}

#[test]
fn test_database_error_is_store_failure() {
    let error: Error = sqlx::Error::RowNotFound.into();
    assert_eq!(error.code(), "E400");
    assert!(error.is_store_failure());
}

#[test]
fn test_ingestion_aborted_wraps_store_failure() {
    let error = Error::IngestionAborted {
        entity_id: "556043-4200".to_string(),
        companies_processed: 2,
        source: Box::new(Error::MigrationFailed("locked".to_string())),
    };
    assert_eq!(error.code(), "E403");
    assert!(error.is_store_failure());
    assert!(error.to_string().contains("after 2 companies"));
    assert!(error.suggestion().unwrap().contains("556043-4200"));
}

#[test]
fn test_self_ownership_is_not_store_failure() {
    let error = Error::SelfOwnership("556043-4200".to_string());
    assert_eq!(error.code(), "E101");
    assert!(!error.is_store_failure());
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: Error = io_error.into();
    assert_eq!(error.code(), "E999");
}

#[test]
fn test_result_alias() {
    fn fails() -> Result<()> {
        Err(Error::Other("boom".to_string()))
    }
    assert_eq!(fails().unwrap_err().to_string(), "boom");
}
