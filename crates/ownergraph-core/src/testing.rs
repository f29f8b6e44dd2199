//! Scripted collaborators for tests
//!
//! Both fakes answer from tables filled in by the test and record every call
//! so tests can assert how often a collaborator was consulted.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ownership::{
    AttributeBag, DocumentSource, HoldingCandidate, InvestorCandidate, OrgNumber,
    PortfolioDocument, WebIntelligence, normalize_name,
};
use crate::error::{Error, Result};

fn id(raw: &str) -> OrgNumber {
    OrgNumber::parse(raw).expect("scripted ids are valid organization numbers")
}

fn unavailable(service: &str) -> Error {
    Error::CollaboratorUnavailable {
        service: service.to_string(),
        reason: "scripted failure".to_string(),
    }
}

/// Document source answering from a table of reports
#[derive(Debug, Default)]
pub struct ScriptedDocuments {
    documents: HashMap<OrgNumber, PortfolioDocument>,
    failing: HashSet<OrgNumber>,
    delay: Option<Duration>,
    calls: Mutex<Vec<OrgNumber>>,
}

impl ScriptedDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holdings listed in the report of `owner`
    pub fn with_holdings<'a, I>(mut self, owner: &str, holdings: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        let doc = self.documents.entry(id(owner)).or_default();
        doc.candidates.extend(
            holdings
                .into_iter()
                .map(|(name, pct)| HoldingCandidate::new(name, pct)),
        );
        self
    }

    /// Attributes stated in the report of `owner`
    pub fn with_attributes(mut self, owner: &str, attributes: AttributeBag) -> Self {
        self.documents.entry(id(owner)).or_default().attributes = attributes;
        self
    }

    pub fn with_report_text(mut self, owner: &str, text: &str) -> Self {
        self.documents.entry(id(owner)).or_default().report_text = Some(text.to_string());
        self
    }

    /// Fail every lookup for `owner`
    pub fn failing(mut self, owner: &str) -> Self {
        self.failing.insert(id(owner));
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times the report of `owner` was requested
    pub fn calls_for(&self, owner: &str) -> usize {
        let owner = id(owner);
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|c| **c == owner).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentSource for ScriptedDocuments {
    async fn portfolio_document(&self, entity_id: &OrgNumber) -> Result<Option<PortfolioDocument>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(entity_id.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(entity_id) {
            return Err(unavailable("documents"));
        }
        Ok(self.documents.get(entity_id).cloned())
    }
}

/// Web intelligence answering from lookup tables
#[derive(Debug, Default)]
pub struct ScriptedWeb {
    identifiers: HashMap<String, OrgNumber>,
    attributes: HashMap<OrgNumber, AttributeBag>,
    investors: HashMap<OrgNumber, Vec<InvestorCandidate>>,
    unavailable: bool,
    delay: Option<Duration>,
    identifier_calls: Mutex<Vec<String>>,
    investor_calls: Mutex<Vec<OrgNumber>>,
}

impl ScriptedWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer identifier searches for `name` with `entity_id`
    pub fn with_identifier(mut self, name: &str, entity_id: &str) -> Self {
        self.identifiers.insert(normalize_name(name), id(entity_id));
        self
    }

    pub fn with_attributes(mut self, entity_id: &str, attributes: AttributeBag) -> Self {
        self.attributes.insert(id(entity_id), attributes);
        self
    }

    pub fn with_investor(mut self, target: &str, investor: InvestorCandidate) -> Self {
        self.investors.entry(id(target)).or_default().push(investor);
        self
    }

    /// Fail every call
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn identifier_calls(&self) -> Vec<String> {
        self.identifier_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn investor_calls(&self) -> usize {
        self.investor_calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn pause(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(unavailable("web"));
        }
        Ok(())
    }
}

#[async_trait]
impl WebIntelligence for ScriptedWeb {
    async fn find_identifier(&self, name: &str) -> Result<Option<OrgNumber>> {
        if let Ok(mut calls) = self.identifier_calls.lock() {
            calls.push(name.to_string());
        }
        self.pause().await?;
        Ok(self.identifiers.get(&normalize_name(name)).cloned())
    }

    async fn extract_attributes(
        &self,
        _name: &str,
        entity_id: &OrgNumber,
        _context: Option<&str>,
    ) -> Result<Option<AttributeBag>> {
        self.pause().await?;
        Ok(self.attributes.get(entity_id).cloned())
    }

    async fn find_investors(
        &self,
        _name: &str,
        entity_id: &OrgNumber,
    ) -> Result<Vec<InvestorCandidate>> {
        if let Ok(mut calls) = self.investor_calls.lock() {
            calls.push(entity_id.clone());
        }
        self.pause().await?;
        Ok(self.investors.get(entity_id).cloned().unwrap_or_default())
    }
}
