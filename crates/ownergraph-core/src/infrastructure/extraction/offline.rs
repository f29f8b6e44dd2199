//! Stand-ins for collaborators that are not configured

use async_trait::async_trait;

use crate::domain::ownership::{
    AttributeBag, DocumentSource, InvestorCandidate, OrgNumber, PortfolioDocument,
    WebIntelligence,
};
use crate::error::{Error, Result};

/// A document source with no reports at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocuments;

#[async_trait]
impl DocumentSource for NoDocuments {
    async fn portfolio_document(&self, _entity_id: &OrgNumber) -> Result<Option<PortfolioDocument>> {
        Ok(None)
    }
}

/// Web intelligence that always reports itself unavailable
///
/// Ingestion still runs; every web step is recorded as degraded with
/// `reason`.
#[derive(Debug, Clone)]
pub struct UnavailableWeb {
    reason: String,
}

impl UnavailableWeb {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> Error {
        Error::CollaboratorUnavailable {
            service: "web intelligence".to_string(),
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl WebIntelligence for UnavailableWeb {
    async fn find_identifier(&self, _name: &str) -> Result<Option<OrgNumber>> {
        Err(self.error())
    }

    async fn extract_attributes(
        &self,
        _name: &str,
        _entity_id: &OrgNumber,
        _context: Option<&str>,
    ) -> Result<Option<AttributeBag>> {
        Err(self.error())
    }

    async fn find_investors(
        &self,
        _name: &str,
        _entity_id: &OrgNumber,
    ) -> Result<Vec<InvestorCandidate>> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_web_reports_reason() {
        let web = UnavailableWeb::new("TAVILY_API_KEY not set");
        let err = web.find_identifier("Investor AB").await.unwrap_err();
        assert_eq!(err.code(), "E301");
        assert!(err.to_string().contains("TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn test_no_documents() {
        let id = OrgNumber::parse("5560434200").unwrap();
        assert_eq!(NoDocuments.portfolio_document(&id).await.unwrap(), None);
    }
}
