//! Per-run traversal state
//!
//! A [`TraversalContext`] belongs to exactly one ingestion run. It holds the
//! visited set that bounds the portfolio recursion, the documents already
//! fetched in this run and the run's event log. It is never persisted.

use std::collections::{HashMap, HashSet};

use super::collaborator::{Lookup, PortfolioDocument};
use super::event::IngestionEvent;
use super::identifier::OrgNumber;

#[derive(Debug, Default)]
pub struct TraversalContext {
    visited: HashSet<OrgNumber>,
    documents: HashMap<OrgNumber, Option<PortfolioDocument>>,
    enriched: HashSet<OrgNumber>,
    events: Vec<IngestionEvent>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as expanded. Returns `false` if it already was.
    pub fn visit(&mut self, id: &OrgNumber) -> bool {
        self.visited.insert(id.clone())
    }

    pub fn is_visited(&self, id: &OrgNumber) -> bool {
        self.visited.contains(id)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Entities expanded besides the root
    pub fn companies_processed(&self) -> usize {
        self.visited.len().saturating_sub(1)
    }

    /// Mark `id` as enriched. Returns `false` if it already was.
    pub fn mark_enriched(&mut self, id: &OrgNumber) -> bool {
        self.enriched.insert(id.clone())
    }

    pub fn cached_document(&self, id: &OrgNumber) -> Option<Option<PortfolioDocument>> {
        self.documents.get(id).cloned()
    }

    /// Remember a document lookup; degraded lookups are logged and cached as
    /// "no document" so the run does not retry them
    pub fn cache_document(
        &mut self,
        id: &OrgNumber,
        lookup: Lookup<PortfolioDocument>,
        service: &str,
    ) -> Option<PortfolioDocument> {
        if let Some(reason) = lookup.degradation() {
            self.record(IngestionEvent::collaborator_degraded(service, Some(id), reason));
        }
        let document = lookup.found();
        self.documents.insert(id.clone(), document.clone());
        document
    }

    pub fn record(&mut self, event: IngestionEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[IngestionEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<IngestionEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ownership::collaborator::HoldingCandidate;

    #[test]
    fn test_visit_once() {
        let mut ctx = TraversalContext::new();
        let id = OrgNumber::parse("556043-4200").unwrap();

        assert!(ctx.visit(&id));
        assert!(!ctx.visit(&id));
        assert!(ctx.is_visited(&id));
        assert_eq!(ctx.visited_count(), 1);
        assert_eq!(ctx.companies_processed(), 0);
    }

    #[test]
    fn test_companies_processed_empty() {
        assert_eq!(TraversalContext::new().companies_processed(), 0);
    }

    #[test]
    fn test_document_cache() {
        let mut ctx = TraversalContext::new();
        let id = OrgNumber::parse("556043-4200").unwrap();
        assert!(ctx.cached_document(&id).is_none());

        let document = PortfolioDocument {
            candidates: vec![HoldingCandidate::new("ABB", Some(12.0))],
            ..Default::default()
        };
        ctx.cache_document(&id, Lookup::Found(document.clone()), "docs");
        assert_eq!(ctx.cached_document(&id), Some(Some(document)));
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn test_degraded_document_is_cached_as_missing() {
        let mut ctx = TraversalContext::new();
        let id = OrgNumber::parse("556043-4200").unwrap();

        let document = ctx.cache_document(&id, Lookup::TimedOut, "docs");
        assert!(document.is_none());
        assert_eq!(ctx.cached_document(&id), Some(None));
        assert_eq!(ctx.events()[0].event_type_name(), "collaborator_degraded");
    }
}
