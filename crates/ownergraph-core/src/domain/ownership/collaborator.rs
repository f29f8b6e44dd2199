//! External capabilities used during ingestion
//!
//! Document extraction and web intelligence are traits so the engine can be
//! driven by real services, fixtures or scripted fakes. Implementations
//! return ordinary `Result`s; the engine only ever sees them through
//! [`Collaborators`], which applies a timeout and folds every outcome into a
//! [`Lookup`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

use super::identifier::OrgNumber;
use super::merge::AttributeBag;

/// Default per-call timeout
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(60);

/// A company named as a holding in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingCandidate {
    pub name: String,
    pub ownership_pct: Option<f64>,
}

impl HoldingCandidate {
    pub fn new(name: impl Into<String>, ownership_pct: Option<f64>) -> Self {
        Self {
            name: name.into(),
            ownership_pct,
        }
    }
}

/// What a document source knows about one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    /// Holdings named in the entity's reports; empty is a valid answer
    pub candidates: Vec<HoldingCandidate>,
    /// Attributes read from the report itself
    #[serde(default)]
    pub attributes: AttributeBag,
    /// Raw report text, usable as context for attribute extraction
    pub report_text: Option<String>,
}

/// An owner of some entity, as found on the web
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorCandidate {
    pub name: String,
    pub ownership_pct: Option<f64>,
    /// Organization number if the source gave one; not yet validated
    pub entity_id: Option<String>,
}

impl InvestorCandidate {
    pub fn new(name: impl Into<String>, ownership_pct: Option<f64>) -> Self {
        Self {
            name: name.into(),
            ownership_pct,
            entity_id: None,
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Source of annual reports and the holdings listed in them
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Holdings of `entity_id`; `None` when no document exists
    async fn portfolio_document(&self, entity_id: &OrgNumber) -> Result<Option<PortfolioDocument>>;
}

/// Web search combined with language-model extraction
#[async_trait]
pub trait WebIntelligence: Send + Sync {
    /// Find the organization number of a named company
    async fn find_identifier(&self, name: &str) -> Result<Option<OrgNumber>>;

    /// Extract descriptive attributes, optionally grounded in `context`
    async fn extract_attributes(
        &self,
        name: &str,
        entity_id: &OrgNumber,
        context: Option<&str>,
    ) -> Result<Option<AttributeBag>>;

    /// Find the owners of a company
    async fn find_investors(
        &self,
        name: &str,
        entity_id: &OrgNumber,
    ) -> Result<Vec<InvestorCandidate>>;
}

/// Outcome of one guarded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    TimedOut,
    Unavailable(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(value) => Lookup::Found(f(value)),
            Self::NotFound => Lookup::NotFound,
            Self::TimedOut => Lookup::TimedOut,
            Self::Unavailable(reason) => Lookup::Unavailable(reason),
        }
    }

    /// Why the call degraded, if it did
    pub fn degradation(&self) -> Option<String> {
        match self {
            Self::TimedOut => Some("timed out".to_string()),
            Self::Unavailable(reason) => Some(reason.clone()),
            Self::Found(_) | Self::NotFound => None,
        }
    }
}

/// Run a collaborator call under a timeout and classify the outcome
pub async fn guarded<T, F>(service: &str, limit: Duration, call: F) -> Lookup<T>
where
    F: Future<Output = Result<Option<T>>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(Some(value))) => Lookup::Found(value),
        Ok(Ok(None)) => Lookup::NotFound,
        Ok(Err(e)) => {
            warn!(service, error = %e, "Collaborator call failed");
            Lookup::Unavailable(e.to_string())
        }
        Err(_) => {
            warn!(service, timeout_secs = limit.as_secs(), "Collaborator call timed out");
            Lookup::TimedOut
        }
    }
}

/// The collaborators an ingestion run talks to
#[derive(Clone)]
pub struct Collaborators {
    documents: Arc<dyn DocumentSource>,
    web: Arc<dyn WebIntelligence>,
    timeout: Duration,
}

impl Collaborators {
    pub const DOCUMENTS: &'static str = "document extraction";
    pub const WEB: &'static str = "web intelligence";

    pub fn new(documents: Arc<dyn DocumentSource>, web: Arc<dyn WebIntelligence>) -> Self {
        Self {
            documents,
            web,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn portfolio_document(&self, entity_id: &OrgNumber) -> Lookup<PortfolioDocument> {
        guarded(
            Self::DOCUMENTS,
            self.timeout,
            self.documents.portfolio_document(entity_id),
        )
        .await
    }

    pub async fn find_identifier(&self, name: &str) -> Lookup<OrgNumber> {
        guarded(Self::WEB, self.timeout, self.web.find_identifier(name)).await
    }

    pub async fn extract_attributes(
        &self,
        name: &str,
        entity_id: &OrgNumber,
        context: Option<&str>,
    ) -> Lookup<AttributeBag> {
        guarded(
            Self::WEB,
            self.timeout,
            self.web.extract_attributes(name, entity_id, context),
        )
        .await
        .map(AttributeBag::normalized)
    }

    /// Owners of an entity; an empty answer is `Found(vec![])`
    pub async fn find_investors(
        &self,
        name: &str,
        entity_id: &OrgNumber,
    ) -> Lookup<Vec<InvestorCandidate>> {
        let call = async { self.web.find_investors(name, entity_id).await.map(Some) };
        guarded(Self::WEB, self.timeout, call).await
    }
}
