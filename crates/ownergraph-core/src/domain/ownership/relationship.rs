//! Ownership edges
//!
//! A directed `owner -> target` relation. At most one edge exists per
//! ordered pair; recording it again updates its properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifier::OrgNumber;
use crate::error::{Error, Result};

/// Kind of relation between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Owns,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owns => "OWNS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OWNS" => Some(Self::Owns),
            _ => None,
        }
    }
}

/// A directed ownership relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub owner_id: OrgNumber,
    pub target_id: OrgNumber,
    pub relation_type: RelationType,
    /// Share of the target held by the owner, in percent
    pub share_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnershipEdge {
    /// Create an edge; an entity cannot own itself
    pub fn new(owner_id: OrgNumber, target_id: OrgNumber) -> Result<Self> {
        if owner_id == target_id {
            return Err(Error::SelfOwnership(owner_id.to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            owner_id,
            target_id,
            relation_type: RelationType::Owns,
            share_percentage: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Set the share; values outside `[0, 100]` are dropped
    pub fn with_share_percentage(mut self, pct: Option<f64>) -> Self {
        self.share_percentage = sanitize_share(pct);
        self
    }
}

/// Keep a share percentage only when it is a finite value in `[0, 100]`
pub fn sanitize_share(pct: Option<f64>) -> Option<f64> {
    pct.filter(|p| p.is_finite() && (0.0..=100.0).contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OrgNumber {
        OrgNumber::parse(s).unwrap()
    }

    #[test]
    fn test_self_loop_rejected() {
        let result = OwnershipEdge::new(id("556043-4200"), id("5560434200"));
        assert!(matches!(result, Err(Error::SelfOwnership(_))));
    }

    #[test]
    fn test_edge_defaults() {
        let edge = OwnershipEdge::new(id("556043-4200"), id("556029-7390")).unwrap();
        assert_eq!(edge.relation_type, RelationType::Owns);
        assert_eq!(edge.share_percentage, None);
    }

    #[test]
    fn test_share_percentage_sanitized() {
        let edge = OwnershipEdge::new(id("556043-4200"), id("556029-7390")).unwrap();
        assert_eq!(
            edge.clone().with_share_percentage(Some(22.5)).share_percentage,
            Some(22.5)
        );
        assert_eq!(edge.clone().with_share_percentage(Some(100.0)).share_percentage, Some(100.0));
        assert_eq!(edge.clone().with_share_percentage(Some(120.0)).share_percentage, None);
        assert_eq!(edge.clone().with_share_percentage(Some(-1.0)).share_percentage, None);
        assert_eq!(edge.with_share_percentage(Some(f64::NAN)).share_percentage, None);
    }

    #[test]
    fn test_relation_type_roundtrip() {
        assert_eq!(RelationType::parse(RelationType::Owns.as_str()), Some(RelationType::Owns));
        assert_eq!(RelationType::parse("LIKES"), None);
        assert_eq!(serde_json::to_string(&RelationType::Owns).unwrap(), "\"OWNS\"");
    }
}
