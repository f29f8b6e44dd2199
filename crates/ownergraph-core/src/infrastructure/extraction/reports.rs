//! Annual reports stored as text files

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::ownership::{DocumentSource, HoldingCandidate, OrgNumber, PortfolioDocument};
use crate::error::Result;
use crate::llm::JsonCompletion;

use super::{ExtractedAttributes, parse_percentage};

const HOLDINGS_SYSTEM: &str = "You read annual reports of investment companies and funds. List \
every company the report names as a holding or portfolio company. Answer with a JSON object \
{\"holdings\": [{\"company_name\": string, \"ownership_percentage\": number or null}], \
\"description\": string or null, \"mission\": string or null, \"investment_thesis\": string or \
null, \"sectors\": [string], \"website\": string or null}. Use the legal company name when the \
report gives it. Never include the reporting company itself. Use an empty list when the report \
names no holdings.";

pub const DEFAULT_MAX_REPORT_CHARS: usize = 24_000;

#[derive(Debug, Deserialize)]
struct HoldingsAnswer {
    #[serde(default)]
    holdings: Vec<HoldingAnswer>,
    #[serde(flatten)]
    attributes: ExtractedAttributes,
}

#[derive(Debug, Deserialize)]
struct HoldingAnswer {
    #[serde(alias = "name")]
    company_name: Option<String>,
    #[serde(default)]
    ownership_percentage: Value,
}

/// [`DocumentSource`] over a directory of `<digits>.txt` reports
///
/// A report for `556043-4200` lives at `<dir>/5560434200.txt`. A missing
/// file means the entity has no document, not a failure.
#[derive(Clone)]
pub struct ReportDirectory {
    dir: PathBuf,
    llm: Arc<dyn JsonCompletion>,
    max_chars: usize,
}

impl ReportDirectory {
    pub fn new(dir: impl Into<PathBuf>, llm: Arc<dyn JsonCompletion>) -> Self {
        Self {
            dir: dir.into(),
            llm,
            max_chars: DEFAULT_MAX_REPORT_CHARS,
        }
    }

    /// Limit how much report text is sent to the model
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn report_path(&self, entity_id: &OrgNumber) -> PathBuf {
        self.dir.join(format!("{}.txt", entity_id.digits()))
    }

    async fn read_report(&self, entity_id: &OrgNumber) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.report_path(entity_id)).await {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentSource for ReportDirectory {
    async fn portfolio_document(&self, entity_id: &OrgNumber) -> Result<Option<PortfolioDocument>> {
        let Some(report) = self.read_report(entity_id).await? else {
            debug!(entity_id = %entity_id, "No report on file");
            return Ok(None);
        };

        let excerpt: String = report.chars().take(self.max_chars).collect();
        let user = format!("Organization number: {}\n\nReport:\n{}", entity_id, excerpt);
        let answer: HoldingsAnswer =
            serde_json::from_value(self.llm.complete_json_value(HOLDINGS_SYSTEM, &user).await?)?;

        let candidates: Vec<HoldingCandidate> = answer
            .holdings
            .into_iter()
            .filter_map(|holding| {
                let name = holding.company_name?.trim().to_string();
                (!name.is_empty()).then(|| {
                    HoldingCandidate::new(name, parse_percentage(&holding.ownership_percentage))
                })
            })
            .collect();

        info!(entity_id = %entity_id, holdings = candidates.len(), "Report read");
        Ok(Some(PortfolioDocument {
            candidates,
            attributes: answer.attributes.into_bag(),
            report_text: Some(excerpt),
        }))
    }
}
