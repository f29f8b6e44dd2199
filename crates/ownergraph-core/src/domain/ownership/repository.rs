//! Repository trait for ownership graph persistence
//!
//! Every write is an idempotent upsert keyed by organization number (for
//! entities) or by ordered pair (for edges), so concurrent ingestion runs
//! converge instead of overwriting each other.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

use super::entity::{Entity, EntityRole, PortfolioItem};
use super::identifier::OrgNumber;
use super::relationship::OwnershipEdge;

/// Deepest network expansion the store will run
pub const MAX_NETWORK_DEPTH: u32 = 5;

/// Largest number of nodes a network query returns
pub const MAX_NETWORK_NODES: u32 = 100;

/// Repository trait for ownership graph persistence
#[async_trait]
pub trait OwnershipGraphRepository: Send + Sync {
    // ========== Entity Operations ==========

    /// Get an entity by organization number
    async fn get_entity(&self, id: &OrgNumber) -> Result<Option<Entity>>;

    /// Insert an entity, or merge it into the stored record
    ///
    /// Attributes follow the merge law, role markers are only ever added,
    /// and the display name is taken from `entity`. The cached portfolio is
    /// not written here; see [`Self::sync_portfolio`].
    async fn upsert_entity(&self, entity: &Entity) -> Result<()>;

    /// Add the fund marker. Returns `false` when the entity already was a
    /// fund or does not exist.
    async fn promote_to_fund(&self, id: &OrgNumber) -> Result<bool>;

    /// Look up an entity by name using one matching strategy
    async fn find_entity_by_name(
        &self,
        query: &NameQuery,
        strategy: MatchStrategy,
    ) -> Result<Option<Entity>>;

    /// List entities carrying a role marker; every fund is also a company
    async fn list_entities(&self, role: Option<EntityRole>) -> Result<Vec<Entity>>;

    // ========== Edge Operations ==========

    /// Insert an edge, or update the properties of the existing one
    ///
    /// A missing share percentage keeps the stored one.
    async fn upsert_edge(&self, edge: &OwnershipEdge) -> Result<()>;

    /// Get the edge for an ordered pair
    async fn get_edge(&self, owner_id: &OrgNumber, target_id: &OrgNumber)
    -> Result<Option<OwnershipEdge>>;

    /// List every edge
    async fn list_edges(&self) -> Result<Vec<OwnershipEdge>>;

    /// Entities owning `id`, with the connecting edge
    async fn list_owners(&self, id: &OrgNumber) -> Result<Vec<Holding>>;

    /// Entities owned by `id`, with the connecting edge
    async fn list_holdings(&self, id: &OrgNumber) -> Result<Vec<Holding>>;

    /// Rebuild the cached portfolio of `id` from its outgoing edges
    async fn sync_portfolio(&self, id: &OrgNumber) -> Result<Vec<PortfolioItem>>;

    // ========== Graph Traversal ==========

    /// Entities within `depth` hops of `id`, following edges both ways
    ///
    /// Depth is clamped to `1..=MAX_NETWORK_DEPTH`.
    async fn network(&self, id: &OrgNumber, depth: u32) -> Result<OwnershipNetwork>;

    // ========== Statistics ==========

    async fn stats(&self) -> Result<OwnershipGraphStats>;
}

/// A name prepared for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    /// Trimmed, upper-cased name
    pub normalized: String,
    /// `normalized` without a legal-form suffix
    pub stripped: String,
}

/// One step of the name resolution cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Normalized name equals the stored normalized name
    ExactName,
    /// Suffix-stripped names are equal
    ExactStrippedName,
    /// Normalized name equals a stored alias
    ExactAlias,
    /// One name contains the other
    NameContains,
    /// One name contains an alias or the reverse
    AliasContains,
}

impl MatchStrategy {
    /// Cascade order: precise first, permissive last
    pub const CASCADE: [MatchStrategy; 5] = [
        Self::ExactName,
        Self::ExactStrippedName,
        Self::ExactAlias,
        Self::NameContains,
        Self::AliasContains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::ExactStrippedName => "exact_stripped_name",
            Self::ExactAlias => "exact_alias",
            Self::NameContains => "name_contains",
            Self::AliasContains => "alias_contains",
        }
    }
}

/// An entity together with the edge connecting it to the queried entity
#[derive(Debug, Clone)]
pub struct Holding {
    pub entity: Entity,
    pub edge: OwnershipEdge,
}

/// A node of a network query result
#[derive(Debug, Clone, Serialize)]
pub struct NetworkNode {
    pub entity_id: OrgNumber,
    pub name: String,
    pub role: EntityRole,
    /// Hops from the queried entity
    pub distance: u32,
}

/// Neighbourhood of an entity in the ownership graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnershipNetwork {
    pub nodes: Vec<NetworkNode>,
    /// Edges whose endpoints are both in `nodes`
    pub edges: Vec<OwnershipEdge>,
}

/// Statistics about the ownership graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnershipGraphStats {
    pub total_entities: u64,
    pub total_funds: u64,
    pub total_edges: u64,
    /// Edges carrying a share percentage
    pub edges_with_share: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_order() {
        assert_eq!(MatchStrategy::CASCADE[0], MatchStrategy::ExactName);
        assert_eq!(MatchStrategy::CASCADE[1], MatchStrategy::ExactStrippedName);
        assert_eq!(MatchStrategy::CASCADE[4], MatchStrategy::AliasContains);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(MatchStrategy::ExactAlias.as_str(), "exact_alias");
        assert_eq!(
            serde_json::to_string(&MatchStrategy::NameContains).unwrap(),
            "\"name_contains\""
        );
    }
}
