//! Database migrations
//!
//! This module manages SQLite schema migrations for ownergraph.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Entities and ownership edges
const MIGRATION_V1: &str = r#"
    -- One row per legal entity, keyed by organization number (NNNNNN-NNNN)
    CREATE TABLE IF NOT EXISTS entities (
        entity_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        name_norm TEXT NOT NULL,
        name_key TEXT NOT NULL,
        is_company INTEGER NOT NULL DEFAULT 1 CHECK (is_company IN (0, 1)),
        is_fund INTEGER NOT NULL DEFAULT 0 CHECK (is_fund IN (0, 1)),
        aliases TEXT NOT NULL DEFAULT '[]',
        alias_norms TEXT NOT NULL DEFAULT '[]',
        description TEXT,
        mission TEXT,
        website TEXT,
        investment_thesis TEXT,
        sectors TEXT NOT NULL DEFAULT '[]',
        key_people TEXT NOT NULL DEFAULT '[]',
        employee_count INTEGER,
        founded_year INTEGER,
        country_code TEXT NOT NULL DEFAULT 'SE',
        portfolio TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_name_norm ON entities(name_norm);
    CREATE INDEX IF NOT EXISTS idx_entities_name_key ON entities(name_key);
    CREATE INDEX IF NOT EXISTS idx_entities_is_fund ON entities(is_fund);

    -- Directed owner -> target edges, one per ordered pair
    CREATE TABLE IF NOT EXISTS ownership_edges (
        owner_id TEXT NOT NULL REFERENCES entities(entity_id),
        target_id TEXT NOT NULL REFERENCES entities(entity_id),
        relation_type TEXT NOT NULL DEFAULT 'OWNS',
        share_percentage REAL CHECK (
            share_percentage IS NULL OR (share_percentage >= 0 AND share_percentage <= 100)
        ),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (owner_id, target_id),
        CHECK (owner_id <> target_id)
    );

    CREATE INDEX IF NOT EXISTS idx_ownership_edges_target ON ownership_edges(target_id);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn apply(pool: &SqlitePool, version: i32, description: &str, sql: &str) -> Result<()> {
    tracing::info!(version, description, "Applying migration");
    sqlx::raw_sql(sql)
        .execute(pool)
        .await
        .map_err(|e| Error::MigrationFailed(format!("v{} ({}): {}", version, description, e)))?;
    record_migration(pool, version).await
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        apply(pool, 1, "Entities and ownership edges", MIGRATION_V1).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in ["entities", "ownership_edges"] {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(count, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_self_loop_rejected_by_schema() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO entities (entity_id, name, name_norm, name_key, created_at, updated_at)
             VALUES ('556043-4200', 'Investor AB', 'INVESTOR AB', 'INVESTOR', '', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO ownership_edges (owner_id, target_id, created_at, updated_at)
             VALUES ('556043-4200', '556043-4200', '', '')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
