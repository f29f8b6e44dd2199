//! SQLite implementation of the OwnershipGraphRepository
//!
//! Upserts merge inside the `ON CONFLICT` clause so that two runs writing
//! the same entity both land. Name matching runs against the pre-normalized
//! `name_norm`, `name_key` and `alias_norms` columns because SQLite's
//! `upper()` only folds ASCII. Network queries use a recursive CTE.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::domain::ownership::{
    AttributeBag, Entity, EntityRole, Holding, MAX_NETWORK_DEPTH, MAX_NETWORK_NODES, MatchStrategy,
    NameQuery, NetworkNode, OrgNumber, OwnershipEdge, OwnershipGraphRepository,
    OwnershipGraphStats, OwnershipNetwork, PortfolioItem, RelationType, RoleLabels, name_key,
    normalize_name,
};
use crate::error::{Error, Result};

/// SQLite implementation of the ownership graph repository
#[derive(Clone)]
pub struct SqliteOwnershipGraphRepository {
    pool: SqlitePool,
}

impl SqliteOwnershipGraphRepository {
    /// Create a new SQLite ownership graph repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Text columns keep the longer value; ties keep the stored one
const MERGE_TEXT: &str = "CASE WHEN entities.{c} IS NULL OR entities.{c} = '' \
     OR length(coalesce(excluded.{c}, '')) > length(entities.{c}) \
     THEN coalesce(excluded.{c}, entities.{c}) ELSE entities.{c} END";

/// JSON array columns take the sorted union
const MERGE_SET: &str = "(SELECT json_group_array(value) FROM ( \
     SELECT value FROM json_each(entities.{c}) \
     UNION SELECT value FROM json_each(excluded.{c}) ORDER BY value))";

fn merge_column(template: &str, column: &str) -> String {
    format!("{column} = {}", template.replace("{c}", column))
}

fn upsert_entity_sql() -> String {
    let mut updates = vec![
        "name = excluded.name".to_string(),
        "name_norm = excluded.name_norm".to_string(),
        "name_key = excluded.name_key".to_string(),
        "is_company = MAX(entities.is_company, excluded.is_company)".to_string(),
        "is_fund = MAX(entities.is_fund, excluded.is_fund)".to_string(),
    ];
    for column in ["description", "mission", "website", "investment_thesis"] {
        updates.push(merge_column(MERGE_TEXT, column));
    }
    for column in ["aliases", "alias_norms", "sectors", "key_people"] {
        updates.push(merge_column(MERGE_SET, column));
    }
    updates.push("employee_count = coalesce(entities.employee_count, excluded.employee_count)".to_string());
    updates.push("founded_year = coalesce(entities.founded_year, excluded.founded_year)".to_string());
    updates.push("updated_at = excluded.updated_at".to_string());

    format!(
        r#"
        INSERT INTO entities (
            entity_id, name, name_norm, name_key, is_company, is_fund,
            aliases, alias_norms, description, mission, website, investment_thesis,
            sectors, key_people, employee_count, founded_year, country_code,
            portfolio, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(entity_id) DO UPDATE SET
            {}
        "#,
        updates.join(",\n            ")
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl OwnershipGraphRepository for SqliteOwnershipGraphRepository {
    // ========== Entity Operations ==========

    async fn get_entity(&self, id: &OrgNumber) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as("SELECT * FROM entities WHERE entity_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(EntityRow::into_entity).transpose()
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let attributes = entity.attributes.clone().shaped_for(entity.role());
        let alias_norms: BTreeSet<String> =
            attributes.aliases.iter().map(|a| normalize_name(a)).collect();

        sqlx::query(&upsert_entity_sql())
            .bind(entity.entity_id.as_str())
            .bind(&entity.name)
            .bind(normalize_name(&entity.name))
            .bind(name_key(&entity.name))
            .bind(entity.labels.company)
            .bind(entity.labels.fund)
            .bind(to_json(&attributes.aliases)?)
            .bind(to_json(&alias_norms)?)
            .bind(&attributes.description)
            .bind(&attributes.mission)
            .bind(&attributes.website)
            .bind(&attributes.investment_thesis)
            .bind(to_json(&attributes.sectors)?)
            .bind(to_json(&attributes.key_people)?)
            .bind(attributes.employee_count.map(i64::from))
            .bind(attributes.founded_year)
            .bind(&entity.country_code)
            .bind(to_json(&entity.portfolio)?)
            .bind(entity.created_at.to_rfc3339())
            .bind(entity.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        debug!(entity_id = %entity.entity_id, name = %entity.name, "Entity upserted");
        Ok(())
    }

    async fn promote_to_fund(&self, id: &OrgNumber) -> Result<bool> {
        let result =
            sqlx::query("UPDATE entities SET is_fund = 1, updated_at = ? WHERE entity_id = ? AND is_fund = 0")
                .bind(Utc::now().to_rfc3339())
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;

        let promoted = result.rows_affected() > 0;
        if promoted {
            info!(entity_id = %id, "Entity promoted to fund");
        }
        Ok(promoted)
    }

    async fn find_entity_by_name(
        &self,
        query: &NameQuery,
        strategy: MatchStrategy,
    ) -> Result<Option<Entity>> {
        // Substring steps also try the suffix-stripped query as ?2
        let (filter, value, stripped) = match strategy {
            MatchStrategy::ExactName => ("name_norm = ?1", &query.normalized, None),
            MatchStrategy::ExactStrippedName => ("name_key = ?1", &query.stripped, None),
            MatchStrategy::ExactAlias => (
                "EXISTS (SELECT 1 FROM json_each(entities.alias_norms) a WHERE a.value = ?1)",
                &query.normalized,
                None,
            ),
            MatchStrategy::NameContains => (
                "name_norm <> '' AND (instr(name_norm, ?1) > 0 OR instr(?1, name_norm) > 0 \
                 OR instr(name_norm, ?2) > 0 OR instr(?2, name_norm) > 0)",
                &query.normalized,
                Some(&query.stripped),
            ),
            MatchStrategy::AliasContains => (
                "EXISTS (SELECT 1 FROM json_each(entities.alias_norms) a \
                 WHERE a.value <> '' AND (instr(a.value, ?1) > 0 OR instr(?1, a.value) > 0 \
                 OR instr(a.value, ?2) > 0 OR instr(?2, a.value) > 0))",
                &query.normalized,
                Some(&query.stripped),
            ),
        };

        let sql = format!(
            "SELECT * FROM entities WHERE {} ORDER BY created_at, rowid LIMIT 1",
            filter
        );
        let mut statement = sqlx::query_as::<_, EntityRow>(&sql).bind(value);
        if let Some(stripped) = stripped {
            statement = statement.bind(stripped);
        }
        let row = statement.fetch_optional(&self.pool).await?;

        row.map(EntityRow::into_entity).transpose()
    }

    async fn list_entities(&self, role: Option<EntityRole>) -> Result<Vec<Entity>> {
        let rows: Vec<EntityRow> = match role {
            // Funds keep their company marker, so company listings include them
            Some(EntityRole::Company) => {
                sqlx::query_as("SELECT * FROM entities WHERE is_company = 1 ORDER BY name_norm")
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(EntityRole::Fund) => {
                sqlx::query_as("SELECT * FROM entities WHERE is_fund = 1 ORDER BY name_norm")
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM entities ORDER BY name_norm")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    // ========== Edge Operations ==========

    async fn upsert_edge(&self, edge: &OwnershipEdge) -> Result<()> {
        if edge.owner_id == edge.target_id {
            return Err(Error::SelfOwnership(edge.owner_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO ownership_edges (
                owner_id, target_id, relation_type, share_percentage, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, target_id) DO UPDATE SET
                relation_type = excluded.relation_type,
                share_percentage = coalesce(excluded.share_percentage, ownership_edges.share_percentage),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(edge.owner_id.as_str())
        .bind(edge.target_id.as_str())
        .bind(edge.relation_type.as_str())
        .bind(edge.share_percentage)
        .bind(edge.created_at.to_rfc3339())
        .bind(edge.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(owner = %edge.owner_id, target = %edge.target_id, "Edge upserted");
        Ok(())
    }

    async fn get_edge(
        &self,
        owner_id: &OrgNumber,
        target_id: &OrgNumber,
    ) -> Result<Option<OwnershipEdge>> {
        let row: Option<EdgeRow> =
            sqlx::query_as("SELECT * FROM ownership_edges WHERE owner_id = ? AND target_id = ?")
                .bind(owner_id.as_str())
                .bind(target_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(EdgeRow::into_edge).transpose()
    }

    async fn list_edges(&self) -> Result<Vec<OwnershipEdge>> {
        let rows: Vec<EdgeRow> =
            sqlx::query_as("SELECT * FROM ownership_edges ORDER BY created_at, owner_id, target_id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    async fn list_owners(&self, id: &OrgNumber) -> Result<Vec<Holding>> {
        let rows: Vec<HoldingRow> = sqlx::query_as(&holding_sql("owner_id", "target_id"))
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HoldingRow::into_holding).collect()
    }

    async fn list_holdings(&self, id: &OrgNumber) -> Result<Vec<Holding>> {
        let rows: Vec<HoldingRow> = sqlx::query_as(&holding_sql("target_id", "owner_id"))
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HoldingRow::into_holding).collect()
    }

    async fn sync_portfolio(&self, id: &OrgNumber) -> Result<Vec<PortfolioItem>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE entities SET
                portfolio = (
                    SELECT json_group_array(json(item)) FROM (
                        SELECT json_object(
                            'entity_id', t.entity_id,
                            'name', t.name,
                            'role', CASE WHEN t.is_fund = 1 THEN 'fund' ELSE 'company' END,
                            'ownership_pct', ed.share_percentage
                        ) AS item
                        FROM ownership_edges ed
                        JOIN entities t ON t.entity_id = ed.target_id
                        WHERE ed.owner_id = ?1
                        ORDER BY ed.created_at, ed.target_id
                    )
                ),
                updated_at = ?2
            WHERE entity_id = ?1
            RETURNING portfolio
            "#,
        )
        .bind(id.as_str())
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        let (portfolio,) = row.ok_or_else(|| Error::EntityNotFound(id.to_string()))?;
        let items: Vec<PortfolioItem> = serde_json::from_str(&portfolio)?;
        debug!(entity_id = %id, holdings = items.len(), "Portfolio synced");
        Ok(items)
    }

    // ========== Graph Traversal ==========

    async fn network(&self, id: &OrgNumber, depth: u32) -> Result<OwnershipNetwork> {
        let depth = depth.clamp(1, MAX_NETWORK_DEPTH);

        let rows: Vec<NetworkRow> = sqlx::query_as(
            r#"
            WITH RECURSIVE reachable(entity_id, depth, path) AS (
                SELECT ?1, 0, ',' || ?1 || ','

                UNION ALL

                SELECT
                    CASE WHEN ed.owner_id = prev.entity_id THEN ed.target_id ELSE ed.owner_id END,
                    prev.depth + 1,
                    prev.path
                        || CASE WHEN ed.owner_id = prev.entity_id THEN ed.target_id ELSE ed.owner_id END
                        || ','
                FROM reachable prev
                JOIN ownership_edges ed
                    ON ed.owner_id = prev.entity_id OR ed.target_id = prev.entity_id
                WHERE prev.depth < ?2
                    AND instr(
                        prev.path,
                        ',' || CASE WHEN ed.owner_id = prev.entity_id
                                    THEN ed.target_id ELSE ed.owner_id END || ','
                    ) = 0
            )
            SELECT e.entity_id, e.name, e.is_fund, MIN(r.depth) AS distance
            FROM reachable r
            JOIN entities e ON e.entity_id = r.entity_id
            GROUP BY e.entity_id
            ORDER BY distance, e.name_norm
            LIMIT ?3
            "#,
        )
        .bind(id.as_str())
        .bind(depth)
        .bind(MAX_NETWORK_NODES)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(OwnershipNetwork::default());
        }

        let nodes = rows
            .into_iter()
            .map(NetworkRow::into_node)
            .collect::<Result<Vec<_>>>()?;

        let placeholders = vec!["?"; nodes.len()].join(", ");
        let sql = format!(
            "SELECT * FROM ownership_edges WHERE owner_id IN ({0}) AND target_id IN ({0}) \
             ORDER BY created_at, owner_id, target_id",
            placeholders
        );
        let mut query = sqlx::query_as::<_, EdgeRow>(&sql);
        for _ in 0..2 {
            for node in &nodes {
                query = query.bind(node.entity_id.as_str());
            }
        }
        let edges = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(EdgeRow::into_edge)
            .collect::<Result<Vec<_>>>()?;

        Ok(OwnershipNetwork { nodes, edges })
    }

    // ========== Statistics ==========

    async fn stats(&self) -> Result<OwnershipGraphStats> {
        let (total_entities, total_funds, total_edges, edges_with_share): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM entities),
                    (SELECT COUNT(*) FROM entities WHERE is_fund = 1),
                    (SELECT COUNT(*) FROM ownership_edges),
                    (SELECT COUNT(*) FROM ownership_edges WHERE share_percentage IS NOT NULL)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(OwnershipGraphStats {
            total_entities: total_entities as u64,
            total_funds: total_funds as u64,
            total_edges: total_edges as u64,
            edges_with_share: edges_with_share as u64,
        })
    }
}

/// Joins edges to the entity on `entity_side`, filtered by `filter_side`
fn holding_sql(entity_side: &str, filter_side: &str) -> String {
    format!(
        r#"
        SELECT e.*,
            ed.owner_id AS edge_owner_id,
            ed.target_id AS edge_target_id,
            ed.relation_type AS edge_relation_type,
            ed.share_percentage AS edge_share_percentage,
            ed.created_at AS edge_created_at,
            ed.updated_at AS edge_updated_at
        FROM ownership_edges ed
        JOIN entities e ON e.entity_id = ed.{entity_side}
        WHERE ed.{filter_side} = ?
        ORDER BY ed.created_at, e.name_norm
        "#
    )
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
struct EntityRow {
    entity_id: String,
    name: String,
    is_company: bool,
    is_fund: bool,
    aliases: String,
    description: Option<String>,
    mission: Option<String>,
    website: Option<String>,
    investment_thesis: Option<String>,
    sectors: String,
    key_people: String,
    employee_count: Option<i64>,
    founded_year: Option<i64>,
    country_code: String,
    portfolio: String,
    created_at: String,
    updated_at: String,
}

impl EntityRow {
    fn into_entity(self) -> Result<Entity> {
        let attributes = AttributeBag {
            description: self.description,
            mission: self.mission,
            website: self.website,
            investment_thesis: self.investment_thesis,
            sectors: serde_json::from_str(&self.sectors)?,
            key_people: serde_json::from_str(&self.key_people)?,
            aliases: serde_json::from_str(&self.aliases)?,
            employee_count: self.employee_count.and_then(|c| u32::try_from(c).ok()),
            founded_year: self.founded_year.and_then(|y| i32::try_from(y).ok()),
        };

        Ok(Entity {
            entity_id: OrgNumber::parse(&self.entity_id)?,
            name: self.name,
            labels: RoleLabels {
                company: self.is_company,
                fund: self.is_fund,
            },
            attributes,
            country_code: self.country_code,
            portfolio: serde_json::from_str(&self.portfolio)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    owner_id: String,
    target_id: String,
    relation_type: String,
    share_percentage: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> Result<OwnershipEdge> {
        let relation_type = RelationType::parse(&self.relation_type)
            .ok_or_else(|| Error::Other(format!("Invalid relation type: {}", self.relation_type)))?;

        Ok(OwnershipEdge {
            owner_id: OrgNumber::parse(&self.owner_id)?,
            target_id: OrgNumber::parse(&self.target_id)?,
            relation_type,
            share_percentage: self.share_percentage,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct HoldingRow {
    #[sqlx(flatten)]
    entity: EntityRow,
    edge_owner_id: String,
    edge_target_id: String,
    edge_relation_type: String,
    edge_share_percentage: Option<f64>,
    edge_created_at: String,
    edge_updated_at: String,
}

impl HoldingRow {
    fn into_holding(self) -> Result<Holding> {
        let edge = EdgeRow {
            owner_id: self.edge_owner_id,
            target_id: self.edge_target_id,
            relation_type: self.edge_relation_type,
            share_percentage: self.edge_share_percentage,
            created_at: self.edge_created_at,
            updated_at: self.edge_updated_at,
        };
        Ok(Holding {
            entity: self.entity.into_entity()?,
            edge: edge.into_edge()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct NetworkRow {
    entity_id: String,
    name: String,
    is_fund: bool,
    distance: i64,
}

impl NetworkRow {
    fn into_node(self) -> Result<NetworkNode> {
        Ok(NetworkNode {
            entity_id: OrgNumber::parse(&self.entity_id)?,
            name: self.name,
            role: if self.is_fund {
                EntityRole::Fund
            } else {
                EntityRole::Company
            },
            distance: u32::try_from(self.distance).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqliteOwnershipGraphRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        run_migrations(&pool).await.expect("Failed to run migrations");
        SqliteOwnershipGraphRepository::new(pool)
    }

    fn id(s: &str) -> OrgNumber {
        OrgNumber::parse(s).unwrap()
    }

    async fn seed(repo: &SqliteOwnershipGraphRepository, entity_id: &str, name: &str) -> Entity {
        let entity = Entity::new(id(entity_id), name);
        repo.upsert_entity(&entity).await.unwrap();
        entity
    }

    async fn own(repo: &SqliteOwnershipGraphRepository, owner: &str, target: &str, pct: Option<f64>) {
        let edge = OwnershipEdge::new(id(owner), id(target))
            .unwrap()
            .with_share_percentage(pct);
        repo.upsert_edge(&edge).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_and_get_entity() {
        let repo = setup_test_db().await;
        let entity = Entity::new(id("556043-4200"), "Investor AB").with_attributes(
            AttributeBag::new()
                .with_description("Holding company")
                .with_sectors(["Finance"])
                .with_alias("Investor"),
        );
        repo.upsert_entity(&entity).await.unwrap();

        let stored = repo.get_entity(&entity.entity_id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Investor AB");
        assert_eq!(stored.role(), EntityRole::Company);
        assert_eq!(stored.attributes.description.as_deref(), Some("Holding company"));
        assert!(stored.attributes.sectors.contains("Finance"));
        assert!(stored.attributes.aliases.contains("Investor"));

        assert!(repo.get_entity(&id("556016-0680")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_merges_attributes() {
        let repo = setup_test_db().await;
        let first = Entity::new(id("556043-4200"), "Investor AB").with_attributes(
            AttributeBag::new()
                .with_description("A long description of the holding company")
                .with_sectors(["Finance"])
                .with_employee_count(20),
        );
        repo.upsert_entity(&first).await.unwrap();

        let second = Entity::new(id("556043-4200"), "Investor AB").with_attributes(
            AttributeBag::new()
                .with_description("Short")
                .with_mission("Own great companies")
                .with_sectors(["Industrials"])
                .with_employee_count(99),
        );
        repo.upsert_entity(&second).await.unwrap();

        let stored = repo.get_entity(&first.entity_id).await.unwrap().unwrap();
        assert_eq!(
            stored.attributes.description.as_deref(),
            Some("A long description of the holding company")
        );
        assert_eq!(stored.attributes.mission.as_deref(), Some("Own great companies"));
        assert_eq!(stored.attributes.sectors.len(), 2);
        assert_eq!(stored.attributes.employee_count, Some(20));
    }

    #[tokio::test]
    async fn test_company_upsert_never_demotes() {
        let repo = setup_test_db().await;
        let fund = Entity::new(id("556043-4200"), "Investor AB").with_role(EntityRole::Fund);
        repo.upsert_entity(&fund).await.unwrap();

        seed(&repo, "556043-4200", "Investor AB").await;

        let stored = repo.get_entity(&fund.entity_id).await.unwrap().unwrap();
        assert!(stored.is_fund());
        assert!(stored.labels.company);
    }

    #[tokio::test]
    async fn test_promote_to_fund() {
        let repo = setup_test_db().await;
        let entity = seed(&repo, "556043-4200", "Investor AB").await;

        assert!(repo.promote_to_fund(&entity.entity_id).await.unwrap());
        assert!(!repo.promote_to_fund(&entity.entity_id).await.unwrap());
        assert!(!repo.promote_to_fund(&id("556016-0680")).await.unwrap());

        let stored = repo.get_entity(&entity.entity_id).await.unwrap().unwrap();
        assert_eq!(stored.role(), EntityRole::Fund);
    }

    #[tokio::test]
    async fn test_find_by_name_strategies() {
        let repo = setup_test_db().await;
        let mut seb = Entity::new(id("502032-9081"), "Skandinaviska Enskilda Banken AB");
        seb.add_alias("SEB");
        repo.upsert_entity(&seb).await.unwrap();
        seed(&repo, "556016-0680", "Ericsson AB").await;

        let query = NameQuery::new("ericsson ab").unwrap();
        let found = repo
            .find_entity_by_name(&query, MatchStrategy::ExactName)
            .await
            .unwrap();
        assert_eq!(found.unwrap().entity_id, id("556016-0680"));

        let query = NameQuery::new("Ericsson").unwrap();
        assert!(repo
            .find_entity_by_name(&query, MatchStrategy::ExactName)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_entity_by_name(&query, MatchStrategy::ExactStrippedName)
            .await
            .unwrap()
            .is_some());

        let query = NameQuery::new("seb").unwrap();
        let found = repo
            .find_entity_by_name(&query, MatchStrategy::ExactAlias)
            .await
            .unwrap();
        assert_eq!(found.unwrap().entity_id, id("502032-9081"));

        let query = NameQuery::new("Enskilda").unwrap();
        assert!(repo
            .find_entity_by_name(&query, MatchStrategy::NameContains)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_non_ascii_names_match_case_insensitively() {
        let repo = setup_test_db().await;
        seed(&repo, "556012-5790", "Öresundskraft AB").await;

        let query = NameQuery::new("öresundskraft").unwrap();
        let found = repo
            .find_entity_by_name(&query, MatchStrategy::ExactStrippedName)
            .await
            .unwrap();
        assert_eq!(found.unwrap().name, "Öresundskraft AB");
    }

    #[tokio::test]
    async fn test_list_entities_by_role() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;
        repo.promote_to_fund(&id("556043-4200")).await.unwrap();

        assert_eq!(repo.list_entities(None).await.unwrap().len(), 2);
        let funds = repo.list_entities(Some(EntityRole::Fund)).await.unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].name, "Investor AB");
        let companies = repo.list_entities(Some(EntityRole::Company)).await.unwrap();
        assert_eq!(companies.len(), 2);
    }

    #[tokio::test]
    async fn test_edge_upsert_keeps_share_when_missing() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;

        own(&repo, "556043-4200", "556016-0680", Some(22.5)).await;
        own(&repo, "556043-4200", "556016-0680", None).await;

        let edges = repo.list_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].share_percentage, Some(22.5));

        own(&repo, "556043-4200", "556016-0680", Some(23.0)).await;
        let edge = repo
            .get_edge(&id("556043-4200"), &id("556016-0680"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edge.share_percentage, Some(23.0));
    }

    #[tokio::test]
    async fn test_owners_and_holdings() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;
        seed(&repo, "556029-7390", "ABB AB").await;
        own(&repo, "556043-4200", "556016-0680", Some(22.5)).await;
        own(&repo, "556043-4200", "556029-7390", None).await;

        let holdings = repo.list_holdings(&id("556043-4200")).await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert!(holdings.iter().all(|h| h.edge.owner_id == id("556043-4200")));

        let owners = repo.list_owners(&id("556016-0680")).await.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].entity.name, "Investor AB");
        assert_eq!(owners[0].edge.share_percentage, Some(22.5));
    }

    #[tokio::test]
    async fn test_sync_portfolio_reflects_edges() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;
        seed(&repo, "556029-7390", "ABB AB").await;
        repo.promote_to_fund(&id("556029-7390")).await.unwrap();
        own(&repo, "556043-4200", "556016-0680", Some(22.5)).await;
        own(&repo, "556043-4200", "556029-7390", None).await;

        let items = repo.sync_portfolio(&id("556043-4200")).await.unwrap();
        assert_eq!(items.len(), 2);
        let ericsson = items.iter().find(|i| i.name == "Ericsson AB").unwrap();
        assert_eq!(ericsson.ownership_pct, Some(22.5));
        assert_eq!(ericsson.role, EntityRole::Company);
        let abb = items.iter().find(|i| i.name == "ABB AB").unwrap();
        assert_eq!(abb.role, EntityRole::Fund);
        assert_eq!(abb.ownership_pct, None);

        let stored = repo.get_entity(&id("556043-4200")).await.unwrap().unwrap();
        assert_eq!(stored.portfolio, items);

        let empty = repo.sync_portfolio(&id("556016-0680")).await.unwrap();
        assert!(empty.is_empty());

        assert!(matches!(
            repo.sync_portfolio(&id("556677-8899")).await,
            Err(Error::EntityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_does_not_overwrite_portfolio() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;
        own(&repo, "556043-4200", "556016-0680", None).await;
        repo.sync_portfolio(&id("556043-4200")).await.unwrap();

        seed(&repo, "556043-4200", "Investor AB").await;

        let stored = repo.get_entity(&id("556043-4200")).await.unwrap().unwrap();
        assert_eq!(stored.portfolio.len(), 1);
    }

    #[tokio::test]
    async fn test_self_edge_rejected() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;

        let mut edge = OwnershipEdge::new(id("556043-4200"), id("556016-0680")).unwrap();
        edge.target_id = id("556043-4200");
        assert!(matches!(
            repo.upsert_edge(&edge).await,
            Err(Error::SelfOwnership(_))
        ));
    }

    #[tokio::test]
    async fn test_network_follows_both_directions() {
        let repo = setup_test_db().await;
        // A -> B -> C, D -> A
        seed(&repo, "556000-0001", "A").await;
        seed(&repo, "556000-0002", "B").await;
        seed(&repo, "556000-0003", "C").await;
        seed(&repo, "556000-0004", "D").await;
        own(&repo, "556000-0001", "556000-0002", None).await;
        own(&repo, "556000-0002", "556000-0003", None).await;
        own(&repo, "556000-0004", "556000-0001", None).await;

        let network = repo.network(&id("556000-0001"), 1).await.unwrap();
        let names: Vec<_> = network.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "D"]);
        assert_eq!(network.nodes[0].distance, 0);
        assert_eq!(network.edges.len(), 2);

        let network = repo.network(&id("556000-0001"), 2).await.unwrap();
        assert_eq!(network.nodes.len(), 4);
        assert_eq!(network.edges.len(), 3);
        let c = network.nodes.iter().find(|n| n.name == "C").unwrap();
        assert_eq!(c.distance, 2);
    }

    #[tokio::test]
    async fn test_network_terminates_on_cycles() {
        let repo = setup_test_db().await;
        seed(&repo, "556000-0001", "A").await;
        seed(&repo, "556000-0002", "B").await;
        own(&repo, "556000-0001", "556000-0002", None).await;
        own(&repo, "556000-0002", "556000-0001", None).await;

        let network = repo.network(&id("556000-0001"), 50).await.unwrap();
        assert_eq!(network.nodes.len(), 2);
        assert_eq!(network.edges.len(), 2);

        let missing = repo.network(&id("556000-0009"), 2).await.unwrap();
        assert!(missing.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let repo = setup_test_db().await;
        seed(&repo, "556043-4200", "Investor AB").await;
        seed(&repo, "556016-0680", "Ericsson AB").await;
        seed(&repo, "556029-7390", "ABB AB").await;
        repo.promote_to_fund(&id("556043-4200")).await.unwrap();
        own(&repo, "556043-4200", "556016-0680", Some(22.5)).await;
        own(&repo, "556043-4200", "556029-7390", None).await;

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.total_funds, 1);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.edges_with_share, 1);
    }
}
