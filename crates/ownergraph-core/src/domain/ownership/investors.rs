//! Investor discovery
//!
//! The reverse direction of portfolio ingestion: ask the web who owns an
//! entity and link each owner. Owners are always funds. Discovery runs one
//! level deep and never expands the owners' own holdings.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;

use super::collaborator::{Collaborators, InvestorCandidate, Lookup};
use super::entity::{Entity, EntityRole};
use super::event::IngestionEvent;
use super::identifier::OrgNumber;
use super::lifecycle::{LabelLifecycle, Promotion, PromotionTrigger};
use super::registry::EntityRegistry;
use super::repository::OwnershipGraphRepository;
use super::resolver::EntityResolver;
use super::traversal::TraversalContext;

/// Counts from one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvestorDiscovery {
    /// Investors reported by the web source
    pub discovered: usize,
    /// Investors linked by an edge
    pub linked: usize,
}

pub struct InvestorDiscoverer<R: OwnershipGraphRepository + ?Sized> {
    registry: EntityRegistry<R>,
    resolver: EntityResolver<R>,
    lifecycle: LabelLifecycle<R>,
    collaborators: Collaborators,
}

impl<R: OwnershipGraphRepository + ?Sized> InvestorDiscoverer<R> {
    pub fn new(registry: EntityRegistry<R>, collaborators: Collaborators) -> Self {
        let repository = Arc::clone(registry.repository());
        Self {
            resolver: EntityResolver::new(Arc::clone(&repository)),
            lifecycle: LabelLifecycle::new(repository),
            registry,
            collaborators,
        }
    }

    /// Find and link the owners of `entity_id`
    pub async fn discover_investors(
        &self,
        entity_id: &OrgNumber,
        name: &str,
        ctx: &mut TraversalContext,
    ) -> Result<InvestorDiscovery> {
        let candidates = match self.collaborators.find_investors(name, entity_id).await {
            Lookup::Found(candidates) => candidates,
            Lookup::NotFound => Vec::new(),
            degraded => {
                ctx.record(IngestionEvent::collaborator_degraded(
                    Collaborators::WEB,
                    Some(entity_id),
                    degraded.degradation().unwrap_or_default(),
                ));
                return Ok(InvestorDiscovery::default());
            }
        };

        let mut summary = InvestorDiscovery {
            discovered: candidates.len(),
            linked: 0,
        };

        for candidate in candidates {
            if self.link_investor(entity_id, &candidate, ctx).await? {
                summary.linked += 1;
            }
        }

        info!(
            entity_id = %entity_id,
            discovered = summary.discovered,
            linked = summary.linked,
            "Investor discovery finished"
        );
        Ok(summary)
    }

    async fn link_investor(
        &self,
        entity_id: &OrgNumber,
        candidate: &InvestorCandidate,
        ctx: &mut TraversalContext,
    ) -> Result<bool> {
        let Some(investor) = self.resolve_or_create(entity_id, candidate, ctx).await? else {
            return Ok(false);
        };

        if investor.entity_id == *entity_id {
            debug!(entity_id = %entity_id, investor = %candidate.name, "Skipping self-ownership");
            ctx.record(IngestionEvent::candidate_skipped(
                entity_id,
                &candidate.name,
                "investor resolves to the owned entity",
            ));
            return Ok(false);
        }

        self.registry
            .link(&investor.entity_id, entity_id, candidate.ownership_pct, ctx)
            .await?;

        let promotion = self
            .lifecycle
            .promote(&investor.entity_id, PromotionTrigger::DiscoveredAsInvestor)
            .await?;
        if promotion == Promotion::Promoted {
            ctx.record(IngestionEvent::entity_promoted(
                &investor.entity_id,
                PromotionTrigger::DiscoveredAsInvestor,
            ));
        }
        self.registry
            .repository()
            .sync_portfolio(&investor.entity_id)
            .await?;

        ctx.record(IngestionEvent::investor_linked(&investor.entity_id, entity_id));
        Ok(true)
    }

    async fn resolve_or_create(
        &self,
        entity_id: &OrgNumber,
        candidate: &InvestorCandidate,
        ctx: &mut TraversalContext,
    ) -> Result<Option<Entity>> {
        let resolution = self
            .resolver
            .resolve(&candidate.name, candidate.entity_id.as_deref())
            .await?;
        if let Some(mut entity) = resolution.into_entity() {
            self.registry.remember_alias(&mut entity, &candidate.name).await?;
            return Ok(Some(entity));
        }

        let id = match candidate
            .entity_id
            .as_deref()
            .and_then(|raw| OrgNumber::parse(raw).ok())
        {
            Some(id) => id,
            None => match self.collaborators.find_identifier(&candidate.name).await {
                Lookup::Found(id) => id,
                lookup => {
                    let reason = lookup
                        .degradation()
                        .unwrap_or_else(|| "no organization number found".to_string());
                    ctx.record(IngestionEvent::candidate_skipped(
                        entity_id,
                        &candidate.name,
                        reason,
                    ));
                    return Ok(None);
                }
            },
        };

        let entity = self
            .registry
            .ensure(&id, &candidate.name, EntityRole::Fund, ctx)
            .await?;
        Ok(Some(entity))
    }
}
