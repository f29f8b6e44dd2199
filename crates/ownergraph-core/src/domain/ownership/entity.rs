//! Entities of the ownership graph
//!
//! An [`Entity`] is one legal company or fund, addressed only by its
//! [`OrgNumber`]. Names are display values and resolution hints; they are
//! never used as a storage key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifier::OrgNumber;
use super::merge::{self, AttributeBag};
use super::resolver::{name_key, normalize_name};

/// Country assigned to new entities when nothing else is known
pub const DEFAULT_COUNTRY_CODE: &str = "SE";

/// Logical classification of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    /// Operating company
    Company,
    /// Investment fund or holding entity with at least one known holding
    Fund,
}

impl EntityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Fund => "fund",
        }
    }
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification markers as stored
///
/// Both markers may be set at once. A promoted fund keeps its company
/// marker so it still shows up in company lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLabels {
    pub company: bool,
    pub fund: bool,
}

impl RoleLabels {
    pub fn company() -> Self {
        Self {
            company: true,
            fund: false,
        }
    }

    pub fn fund() -> Self {
        Self {
            company: true,
            fund: true,
        }
    }

    pub fn role(&self) -> EntityRole {
        if self.fund {
            EntityRole::Fund
        } else {
            EntityRole::Company
        }
    }

    /// Markers after adding the fund marker
    pub fn promoted(self) -> Self {
        Self { fund: true, ..self }
    }
}

impl From<EntityRole> for RoleLabels {
    fn from(role: EntityRole) -> Self {
        match role {
            EntityRole::Company => Self::company(),
            EntityRole::Fund => Self::fund(),
        }
    }
}

/// One holding in an entity's denormalized portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub entity_id: OrgNumber,
    pub name: String,
    pub role: EntityRole,
    pub ownership_pct: Option<f64>,
}

impl PortfolioItem {
    pub fn new(entity_id: OrgNumber, name: impl Into<String>, role: EntityRole) -> Self {
        Self {
            entity_id,
            name: name.into(),
            role,
            ownership_pct: None,
        }
    }

    pub fn with_ownership_pct(mut self, pct: Option<f64>) -> Self {
        self.ownership_pct = pct;
        self
    }
}

/// A legal entity in the ownership graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical organization number
    pub entity_id: OrgNumber,
    /// Current display name
    pub name: String,
    pub labels: RoleLabels,
    pub attributes: AttributeBag,
    pub country_code: String,
    /// Cached outgoing ownership edges
    pub portfolio: Vec<PortfolioItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a minimal company record
    pub fn new(entity_id: OrgNumber, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            name: name.into().trim().to_string(),
            labels: RoleLabels::company(),
            attributes: AttributeBag::default(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            portfolio: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: EntityRole) -> Self {
        self.labels = role.into();
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeBag) -> Self {
        self.attributes = attributes.shaped_for(self.role());
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn role(&self) -> EntityRole {
        self.labels.role()
    }

    pub fn is_fund(&self) -> bool {
        self.labels.fund
    }

    /// Suffix-stripped, upper-cased name used for exact matching
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Merge freshly extracted attributes into this record
    ///
    /// Returns whether anything changed.
    pub fn absorb(&mut self, incoming: &AttributeBag) -> bool {
        let merged = merge::merge(&self.attributes, incoming).shaped_for(self.role());
        if merged == self.attributes {
            return false;
        }
        self.attributes = merged;
        self.updated_at = Utc::now();
        true
    }

    /// Record an alternate name unless it equals the display name
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let alias = alias.trim();
        if alias.is_empty() || normalize_name(alias) == normalize_name(&self.name) {
            return false;
        }
        let known = self
            .attributes
            .aliases
            .iter()
            .any(|a| normalize_name(a) == normalize_name(alias));
        if known {
            return false;
        }
        self.attributes.aliases.insert(alias.to_string());
        self.updated_at = Utc::now();
        true
    }
}
