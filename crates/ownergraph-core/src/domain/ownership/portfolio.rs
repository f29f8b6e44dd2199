//! Recursive portfolio ingestion
//!
//! Starting from one entity, ask the document source for its holdings,
//! resolve or create each holding, record the ownership edge, enrich the
//! holding and recurse into it. The visited set in [`TraversalContext`]
//! expands each entity at most once per run, so the walk terminates on
//! cyclic ownership.
//!
//! Collaborator failures skip the affected candidate. Store failures abort
//! the run; whatever was written before stays written.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;

use super::collaborator::{Collaborators, HoldingCandidate, Lookup, PortfolioDocument};
use super::entity::{Entity, EntityRole, PortfolioItem};
use super::event::IngestionEvent;
use super::identifier::OrgNumber;
use super::lifecycle::{LabelLifecycle, Promotion, PromotionTrigger};
use super::merge;
use super::registry::EntityRegistry;
use super::repository::OwnershipGraphRepository;
use super::resolver::EntityResolver;
use super::traversal::TraversalContext;

/// Default cap on holdings taken from one document
pub const DEFAULT_MAX_CANDIDATES: usize = 50;

type IngestFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<PortfolioItem>>> + Send + 'a>>;

/// Walks holdings recursively and writes them into the graph
pub struct PortfolioIngestor<R: OwnershipGraphRepository + ?Sized> {
    registry: EntityRegistry<R>,
    resolver: EntityResolver<R>,
    lifecycle: LabelLifecycle<R>,
    collaborators: Collaborators,
    max_candidates: usize,
}

impl<R: OwnershipGraphRepository + ?Sized> PortfolioIngestor<R> {
    pub fn new(registry: EntityRegistry<R>, collaborators: Collaborators) -> Self {
        let repository = Arc::clone(registry.repository());
        Self {
            resolver: EntityResolver::new(Arc::clone(&repository)),
            lifecycle: LabelLifecycle::new(repository),
            registry,
            collaborators,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Limit how many holdings are taken from one document
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Ingest the holdings of `source_id`, recursing into each holding
    ///
    /// Returns the holdings found at this level only; deeper levels end up
    /// in the holdings' own cached portfolios.
    pub fn ingest_portfolio<'a>(
        &'a self,
        source_id: &'a OrgNumber,
        ctx: &'a mut TraversalContext,
    ) -> IngestFuture<'a> {
        Box::pin(async move {
            if !ctx.visit(source_id) {
                debug!(entity_id = %source_id, "Already expanded in this run");
                return Ok(Vec::new());
            }

            let candidates = self
                .document(source_id, ctx)
                .await
                .map(|d| d.candidates)
                .unwrap_or_default();
            if candidates.is_empty() {
                debug!(entity_id = %source_id, "No holdings found");
                return Ok(Vec::new());
            }

            info!(
                entity_id = %source_id,
                candidates = candidates.len(),
                visited = ctx.visited_count(),
                "Expanding portfolio"
            );

            let mut candidates = candidates;
            let overflow = candidates.split_off(candidates.len().min(self.max_candidates));
            if !overflow.is_empty() {
                warn!(
                    entity_id = %source_id,
                    dropped = overflow.len(),
                    max_candidates = self.max_candidates,
                    "Holding list exceeds the candidate limit"
                );
                for dropped in &overflow {
                    ctx.record(IngestionEvent::candidate_skipped(
                        source_id,
                        &dropped.name,
                        "over the candidate limit",
                    ));
                }
            }

            let mut items = Vec::new();
            for candidate in candidates {
                if let Some(item) = self.ingest_candidate(source_id, candidate, ctx).await? {
                    items.push(item);
                }
            }
            Ok(items)
        })
    }

    async fn ingest_candidate(
        &self,
        source_id: &OrgNumber,
        candidate: HoldingCandidate,
        ctx: &mut TraversalContext,
    ) -> Result<Option<PortfolioItem>> {
        let Some(target) = self.resolve_or_create(source_id, &candidate.name, ctx).await? else {
            return Ok(None);
        };

        if target.entity_id == *source_id {
            debug!(entity_id = %source_id, candidate = %candidate.name, "Skipping self-ownership");
            ctx.record(IngestionEvent::candidate_skipped(
                source_id,
                &candidate.name,
                "resolves to the owner itself",
            ));
            return Ok(None);
        }

        let edge = self
            .registry
            .link(source_id, &target.entity_id, candidate.ownership_pct, ctx)
            .await?;

        if !ctx.is_visited(&target.entity_id) {
            self.enrich(&target, ctx).await?;
        }

        let holdings = self.ingest_portfolio(&target.entity_id, ctx).await?;

        let mut role = target.role();
        if !holdings.is_empty() {
            let promotion = self
                .lifecycle
                .promote(&target.entity_id, PromotionTrigger::OwnsPortfolio)
                .await?;
            if promotion == Promotion::Promoted {
                ctx.record(IngestionEvent::entity_promoted(
                    &target.entity_id,
                    PromotionTrigger::OwnsPortfolio,
                ));
            }
            self.registry
                .repository()
                .sync_portfolio(&target.entity_id)
                .await?;
            role = EntityRole::Fund;
        }

        Ok(Some(
            PortfolioItem::new(target.entity_id.clone(), target.name.clone(), role)
                .with_ownership_pct(edge.share_percentage),
        ))
    }

    /// Resolve a holding by name, falling back to an identifier search
    ///
    /// `None` means the candidate is skipped: no entity is ever created
    /// without a validated organization number.
    async fn resolve_or_create(
        &self,
        source_id: &OrgNumber,
        name: &str,
        ctx: &mut TraversalContext,
    ) -> Result<Option<Entity>> {
        if let Some(mut entity) = self.resolver.resolve(name, None).await?.into_entity() {
            self.registry.remember_alias(&mut entity, name).await?;
            return Ok(Some(entity));
        }

        match self.collaborators.find_identifier(name).await {
            Lookup::Found(id) => {
                let mut entity = self
                    .registry
                    .ensure(&id, name, EntityRole::Company, ctx)
                    .await?;
                self.registry.remember_alias(&mut entity, name).await?;
                Ok(Some(entity))
            }
            Lookup::NotFound => {
                debug!(candidate = %name, "No organization number found");
                ctx.record(IngestionEvent::candidate_skipped(
                    source_id,
                    name,
                    "no organization number found",
                ));
                Ok(None)
            }
            degraded => {
                let reason = degraded.degradation().unwrap_or_default();
                ctx.record(IngestionEvent::collaborator_degraded(
                    Collaborators::WEB,
                    Some(source_id),
                    reason.clone(),
                ));
                ctx.record(IngestionEvent::candidate_skipped(source_id, name, reason));
                Ok(None)
            }
        }
    }

    /// Merge document- and web-derived attributes into an entity
    ///
    /// Runs at most once per entity and run. Returns whether the stored
    /// record changed.
    pub async fn enrich(&self, entity: &Entity, ctx: &mut TraversalContext) -> Result<bool> {
        if !ctx.mark_enriched(&entity.entity_id) {
            return Ok(false);
        }

        let document = self.document(&entity.entity_id, ctx).await;
        let (report_bag, report_text) = match document {
            Some(d) => (d.attributes.normalized(), d.report_text),
            None => Default::default(),
        };

        let web_bag = match self
            .collaborators
            .extract_attributes(&entity.name, &entity.entity_id, report_text.as_deref())
            .await
        {
            Lookup::Found(bag) => bag,
            Lookup::NotFound => Default::default(),
            degraded => {
                ctx.record(IngestionEvent::collaborator_degraded(
                    Collaborators::WEB,
                    Some(&entity.entity_id),
                    degraded.degradation().unwrap_or_default(),
                ));
                Default::default()
            }
        };

        let combined = merge::combine([&report_bag, &web_bag]);
        if combined.is_empty() {
            return Ok(false);
        }

        let mut updated = entity.clone();
        if !updated.absorb(&combined) {
            return Ok(false);
        }
        self.registry.repository().upsert_entity(&updated).await?;

        debug!(entity_id = %entity.entity_id, "Entity enriched");
        ctx.record(IngestionEvent::entity_enriched(&entity.entity_id));
        Ok(true)
    }

    /// Fetch the document for `id` once per run
    async fn document(
        &self,
        id: &OrgNumber,
        ctx: &mut TraversalContext,
    ) -> Option<PortfolioDocument> {
        if let Some(cached) = ctx.cached_document(id) {
            return cached;
        }
        let lookup = self.collaborators.portfolio_document(id).await;
        ctx.cache_document(id, lookup, Collaborators::DOCUMENTS)
    }
}
