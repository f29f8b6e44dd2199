//! Ingestion coordinator
//!
//! `ingest` is the single entry point callers use. One run:
//!
//! 1. validates the root organization number and ensures the root exists
//! 2. walks the root's portfolio recursively with a fresh visited set
//! 3. merges root-level attributes
//! 4. links any declared holdings
//! 5. promotes the root if it holds anything and refreshes its portfolio
//! 6. discovers the root's investors once
//!
//! There is no transaction around the whole run. If the store fails midway
//! the work done so far stays committed and the error reports how far the
//! run got.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::collaborator::Collaborators;
use super::entity::{DEFAULT_COUNTRY_CODE, EntityRole, PortfolioItem};
use super::event::IngestionEvent;
use super::identifier::OrgNumber;
use super::investors::InvestorDiscoverer;
use super::lifecycle::{LabelLifecycle, Promotion, PromotionTrigger};
use super::portfolio::{DEFAULT_MAX_CANDIDATES, PortfolioIngestor};
use super::registry::EntityRegistry;
use super::repository::OwnershipGraphRepository;
use super::traversal::TraversalContext;

/// Tunables for ingestion runs
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Country code given to newly created entities
    pub country_code: String,
    /// Holdings taken from one document at most
    pub max_candidates: usize,
    /// Timeout applied to each collaborator call
    pub collaborator_timeout: Duration,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            collaborator_timeout: super::collaborator::DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }
}

/// A holding supplied by the caller rather than discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredHolding {
    pub entity_id: String,
    pub name: String,
    #[serde(default)]
    pub ownership_pct: Option<f64>,
}

/// A request to ingest one root entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub entity_id: String,
    pub name: String,
    #[serde(default)]
    pub declared_portfolio: Vec<DeclaredHolding>,
}

impl IngestRequest {
    pub fn new(entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            declared_portfolio: Vec::new(),
        }
    }

    pub fn with_declared_holding(
        mut self,
        entity_id: impl Into<String>,
        name: impl Into<String>,
        ownership_pct: Option<f64>,
    ) -> Self {
        self.declared_portfolio.push(DeclaredHolding {
            entity_id: entity_id.into(),
            name: name.into(),
            ownership_pct,
        });
        self
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub entity_id: OrgNumber,
    /// Holdings found directly under the root
    pub portfolio: Vec<PortfolioItem>,
    /// Entities expanded besides the root
    pub companies_processed: usize,
    pub investors_discovered: usize,
    pub investors_linked: usize,
    pub events: Vec<IngestionEvent>,
}

/// Runs ingestion against a repository and a set of collaborators
pub struct IngestionService<R: OwnershipGraphRepository + ?Sized> {
    registry: EntityRegistry<R>,
    lifecycle: LabelLifecycle<R>,
    portfolio: PortfolioIngestor<R>,
    investors: InvestorDiscoverer<R>,
}

impl<R: OwnershipGraphRepository + ?Sized> IngestionService<R> {
    /// Create a service with default settings
    pub fn new(repository: Arc<R>, collaborators: Collaborators) -> Self {
        Self::with_settings(repository, collaborators, IngestionSettings::default())
    }

    pub fn with_settings(
        repository: Arc<R>,
        collaborators: Collaborators,
        settings: IngestionSettings,
    ) -> Self {
        let collaborators = collaborators.with_timeout(settings.collaborator_timeout);
        let registry = EntityRegistry::new(Arc::clone(&repository), settings.country_code);
        Self {
            lifecycle: LabelLifecycle::new(repository),
            portfolio: PortfolioIngestor::new(registry.clone(), collaborators.clone())
                .with_max_candidates(settings.max_candidates),
            investors: InvestorDiscoverer::new(registry.clone(), collaborators),
            registry,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        self.registry.repository()
    }

    /// Ingest an entity by organization number and name
    pub async fn ingest(&self, entity_id: &str, name: &str) -> Result<IngestionResult> {
        self.ingest_request(IngestRequest::new(entity_id, name)).await
    }

    /// Ingest a root entity, including any declared holdings
    pub async fn ingest_request(&self, request: IngestRequest) -> Result<IngestionResult> {
        let root_id = OrgNumber::parse(&request.entity_id)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("entity name must not be empty".to_string()));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, entity_id = %root_id);

        async {
            info!(name, "Ingestion started");
            let mut ctx = TraversalContext::new();
            match self
                .run(&root_id, name, &request.declared_portfolio, &mut ctx)
                .await
            {
                Ok(mut result) => {
                    result.events = ctx.into_events();
                    info!(
                        portfolio = result.portfolio.len(),
                        companies_processed = result.companies_processed,
                        investors_linked = result.investors_linked,
                        "Ingestion finished"
                    );
                    Ok(result)
                }
                Err(e) => {
                    warn!(error = %e, "Ingestion aborted");
                    Err(Error::IngestionAborted {
                        entity_id: root_id.to_string(),
                        companies_processed: ctx.companies_processed(),
                        source: Box::new(e),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        root_id: &OrgNumber,
        name: &str,
        declared: &[DeclaredHolding],
        ctx: &mut TraversalContext,
    ) -> Result<IngestionResult> {
        let root = self
            .registry
            .ensure(root_id, name, EntityRole::Company, ctx)
            .await?;

        let mut portfolio = self.portfolio.ingest_portfolio(root_id, ctx).await?;
        let companies_processed = ctx.companies_processed();

        self.portfolio.enrich(&root, ctx).await?;

        let declared_items = self.link_declared(root_id, declared, ctx).await?;

        let trigger = if !portfolio.is_empty() {
            Some(PromotionTrigger::OwnsPortfolio)
        } else if !declared_items.is_empty() {
            Some(PromotionTrigger::DeclaredPortfolio)
        } else {
            None
        };
        if let Some(trigger) = trigger {
            if self.lifecycle.promote(root_id, trigger).await? == Promotion::Promoted {
                ctx.record(IngestionEvent::entity_promoted(root_id, trigger));
            }
            self.repository().sync_portfolio(root_id).await?;
        }

        for item in declared_items {
            if !portfolio.iter().any(|p| p.entity_id == item.entity_id) {
                portfolio.push(item);
            }
        }

        let investors = self
            .investors
            .discover_investors(root_id, &root.name, ctx)
            .await?;

        Ok(IngestionResult {
            entity_id: root_id.clone(),
            portfolio,
            companies_processed,
            investors_discovered: investors.discovered,
            investors_linked: investors.linked,
            events: Vec::new(),
        })
    }

    /// Create and link holdings supplied with the request
    async fn link_declared(
        &self,
        root_id: &OrgNumber,
        declared: &[DeclaredHolding],
        ctx: &mut TraversalContext,
    ) -> Result<Vec<PortfolioItem>> {
        let mut items = Vec::new();
        for holding in declared {
            let id = match OrgNumber::parse(&holding.entity_id) {
                Ok(id) if id != *root_id => id,
                Ok(_) => {
                    ctx.record(IngestionEvent::candidate_skipped(
                        root_id,
                        &holding.name,
                        "declared holding is the root itself",
                    ));
                    continue;
                }
                Err(e) => {
                    ctx.record(IngestionEvent::candidate_skipped(
                        root_id,
                        &holding.name,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            let target = self
                .registry
                .ensure(&id, &holding.name, EntityRole::Company, ctx)
                .await?;
            let edge = self
                .registry
                .link(root_id, &id, holding.ownership_pct, ctx)
                .await?;
            items.push(
                PortfolioItem::new(id, target.name.clone(), target.role())
                    .with_ownership_pct(edge.share_percentage),
            );
        }
        Ok(items)
    }
}

impl<R: OwnershipGraphRepository + ?Sized + 'static> IngestionService<R> {
    /// Run an ingestion on the tokio runtime
    pub fn spawn(self: Arc<Self>, request: IngestRequest) -> JoinHandle<Result<IngestionResult>> {
        tokio::spawn(async move { self.ingest_request(request).await })
    }

    /// Ingest several roots concurrently, at most `max_concurrent` at a time
    ///
    /// Results come back in completion order, keyed by the requested id.
    pub async fn ingest_many(
        self: Arc<Self>,
        requests: Vec<IngestRequest>,
        max_concurrent: usize,
    ) -> Vec<(String, Result<IngestionResult>)> {
        let max_concurrent = max_concurrent.max(1);
        let mut pending = requests.into_iter();
        let mut running = JoinSet::new();
        let mut results = Vec::new();

        loop {
            while running.len() < max_concurrent {
                let Some(request) = pending.next() else { break };
                let service = Arc::clone(&self);
                running.spawn(async move {
                    let id = request.entity_id.clone();
                    (id, service.ingest_request(request).await)
                });
            }

            match running.join_next().await {
                Some(Ok(outcome)) => results.push(outcome),
                Some(Err(e)) => warn!(error = %e, "Ingestion task failed"),
                None => break,
            }
        }

        results
    }
}
