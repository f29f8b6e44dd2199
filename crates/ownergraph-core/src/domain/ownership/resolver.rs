//! Entity resolution
//!
//! Maps a free-text company name (and an optional organization number) to
//! a stored entity. Strategies are tried in order and the first hit wins:
//!
//! 1. organization number
//! 2. exact normalized name
//! 3. exact name with legal-form suffix stripped on both sides
//! 4. exact alias
//! 5. two-way substring on names
//! 6. two-way substring on aliases

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;

use super::entity::Entity;
use super::identifier::OrgNumber;
use super::repository::{MatchStrategy, NameQuery, OwnershipGraphRepository};

/// Legal-form suffixes, longest first
const LEGAL_SUFFIXES: [&str; 5] = [" AB (PUBL)", " AB PUBL", " (PUBL)", " AKTIEBOLAG", " AB"];

/// Trim, collapse inner whitespace and upper-case
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Remove one trailing legal-form suffix from a normalized name
pub fn strip_legal_suffix(normalized: &str) -> &str {
    LEGAL_SUFFIXES
        .iter()
        .find_map(|suffix| normalized.strip_suffix(suffix))
        .map(str::trim_end)
        .filter(|s| !s.is_empty())
        .unwrap_or(normalized)
}

/// Normalized name with its legal-form suffix removed
pub fn name_key(name: &str) -> String {
    strip_legal_suffix(&normalize_name(name)).to_string()
}

impl NameQuery {
    /// Prepare a name for matching; `None` for blank input
    pub fn new(name: &str) -> Option<Self> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }
        let stripped = strip_legal_suffix(&normalized).to_string();
        Some(Self {
            normalized,
            stripped,
        })
    }
}

/// How an entity was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Identifier,
    Name(MatchStrategy),
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone)]
pub enum Resolution {
    Found { entity: Entity, matched_by: MatchedBy },
    NotFound,
}

impl Resolution {
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Found { entity, .. } => Some(entity),
            Self::NotFound => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Self::Found { entity, .. } => Some(entity),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Resolves names to canonical entities
pub struct EntityResolver<R: OwnershipGraphRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: OwnershipGraphRepository + ?Sized> Clone for EntityResolver<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: OwnershipGraphRepository + ?Sized> EntityResolver<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Run the resolution cascade
    ///
    /// An invalid `hint_id` is ignored rather than rejected; it only skips
    /// the identifier step.
    pub async fn resolve(&self, name: &str, hint_id: Option<&str>) -> Result<Resolution> {
        if let Some(id) = hint_id.and_then(|h| OrgNumber::parse(h).ok()) {
            if let Some(entity) = self.repository.get_entity(&id).await? {
                debug!(entity_id = %id, "Resolved by organization number");
                return Ok(Resolution::Found {
                    entity,
                    matched_by: MatchedBy::Identifier,
                });
            }
        }

        let Some(query) = NameQuery::new(name) else {
            return Ok(Resolution::NotFound);
        };

        for strategy in MatchStrategy::CASCADE {
            if let Some(entity) = self.repository.find_entity_by_name(&query, strategy).await? {
                debug!(
                    query = %query.normalized,
                    entity_id = %entity.entity_id,
                    strategy = strategy.as_str(),
                    "Resolved by name"
                );
                return Ok(Resolution::Found {
                    entity,
                    matched_by: MatchedBy::Name(strategy),
                });
            }
        }

        debug!(query = %query.normalized, "No entity matched");
        Ok(Resolution::NotFound)
    }
}
