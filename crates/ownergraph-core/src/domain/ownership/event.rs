//! Domain events for ownership ingestion
//!
//! Each ingestion run keeps an ordered log of what it changed and what it
//! had to skip. The log is returned with the run's result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifier::OrgNumber;
use super::lifecycle::PromotionTrigger;

/// Events that can occur during ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum IngestionEvent {
    /// A minimal entity record was created
    EntityCreated {
        entity_id: OrgNumber,
        name: String,
        timestamp: DateTime<Utc>,
    },
    /// Extracted attributes were merged into an entity
    EntityEnriched {
        entity_id: OrgNumber,
        timestamp: DateTime<Utc>,
    },
    /// An entity gained the fund marker
    EntityPromoted {
        entity_id: OrgNumber,
        trigger: String,
        timestamp: DateTime<Utc>,
    },
    /// An ownership edge was written
    EdgeRecorded {
        owner_id: OrgNumber,
        target_id: OrgNumber,
        share_percentage: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    /// A holding or investor candidate could not be used
    CandidateSkipped {
        source_id: OrgNumber,
        candidate: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// An investor was linked as owner
    InvestorLinked {
        investor_id: OrgNumber,
        target_id: OrgNumber,
        timestamp: DateTime<Utc>,
    },
    /// A collaborator timed out or failed; the step continued without it
    CollaboratorDegraded {
        service: String,
        entity_id: Option<OrgNumber>,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl IngestionEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EntityCreated { timestamp, .. }
            | Self::EntityEnriched { timestamp, .. }
            | Self::EntityPromoted { timestamp, .. }
            | Self::EdgeRecorded { timestamp, .. }
            | Self::CandidateSkipped { timestamp, .. }
            | Self::InvestorLinked { timestamp, .. }
            | Self::CollaboratorDegraded { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::EntityCreated { .. } => "entity_created",
            Self::EntityEnriched { .. } => "entity_enriched",
            Self::EntityPromoted { .. } => "entity_promoted",
            Self::EdgeRecorded { .. } => "edge_recorded",
            Self::CandidateSkipped { .. } => "candidate_skipped",
            Self::InvestorLinked { .. } => "investor_linked",
            Self::CollaboratorDegraded { .. } => "collaborator_degraded",
        }
    }

    pub fn entity_created(entity_id: &OrgNumber, name: impl Into<String>) -> Self {
        Self::EntityCreated {
            entity_id: entity_id.clone(),
            name: name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn entity_enriched(entity_id: &OrgNumber) -> Self {
        Self::EntityEnriched {
            entity_id: entity_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn entity_promoted(entity_id: &OrgNumber, trigger: PromotionTrigger) -> Self {
        Self::EntityPromoted {
            entity_id: entity_id.clone(),
            trigger: trigger.as_str().to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn edge_recorded(owner_id: &OrgNumber, target_id: &OrgNumber, share: Option<f64>) -> Self {
        Self::EdgeRecorded {
            owner_id: owner_id.clone(),
            target_id: target_id.clone(),
            share_percentage: share,
            timestamp: Utc::now(),
        }
    }

    pub fn candidate_skipped(
        source_id: &OrgNumber,
        candidate: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CandidateSkipped {
            source_id: source_id.clone(),
            candidate: candidate.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn investor_linked(investor_id: &OrgNumber, target_id: &OrgNumber) -> Self {
        Self::InvestorLinked {
            investor_id: investor_id.clone(),
            target_id: target_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn collaborator_degraded(
        service: impl Into<String>,
        entity_id: Option<&OrgNumber>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CollaboratorDegraded {
            service: service.into(),
            entity_id: entity_id.cloned(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}
