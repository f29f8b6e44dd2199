//! Company to fund role transitions
//!
//! The only transition is `company -> fund`. It is monotonic: nothing in
//! the engine ever removes the fund marker.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};

use super::identifier::OrgNumber;
use super::repository::OwnershipGraphRepository;

/// Evidence that an entity holds a portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionTrigger {
    /// Portfolio ingestion recorded outgoing edges
    OwnsPortfolio,
    /// Investor discovery found it owning another entity
    DiscoveredAsInvestor,
    /// An ingestion request declared a portfolio
    DeclaredPortfolio,
}

impl PromotionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnsPortfolio => "owns_portfolio",
            Self::DiscoveredAsInvestor => "discovered_as_investor",
            Self::DeclaredPortfolio => "declared_portfolio",
        }
    }
}

/// Result of a promotion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Promoted,
    AlreadyFund,
}

/// Applies role transitions through the repository
pub struct LabelLifecycle<R: OwnershipGraphRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: OwnershipGraphRepository + ?Sized> Clone for LabelLifecycle<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: OwnershipGraphRepository + ?Sized> LabelLifecycle<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Promote an entity to fund; a no-op for funds
    pub async fn promote(&self, id: &OrgNumber, trigger: PromotionTrigger) -> Result<Promotion> {
        if self.repository.promote_to_fund(id).await? {
            info!(entity_id = %id, trigger = trigger.as_str(), "Entity promoted to fund");
            return Ok(Promotion::Promoted);
        }

        match self.repository.get_entity(id).await? {
            Some(_) => Ok(Promotion::AlreadyFund),
            None => Err(Error::EntityNotFound(id.to_string())),
        }
    }
}
