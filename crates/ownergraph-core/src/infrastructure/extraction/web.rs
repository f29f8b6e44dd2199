//! Web intelligence over a search backend and a JSON-answering model

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::ownership::{
    AttributeBag, InvestorCandidate, OrgNumber, WebIntelligence, extract_identifier_from_text,
};
use crate::error::{Error, Result};
use crate::infrastructure::search::{SearchDepth, SearchHit, WebSearch};
use crate::llm::JsonCompletion;

use super::{ExtractedAttributes, parse_percentage};

const IDENTIFIER_SYSTEM: &str = "You find Swedish organization numbers (organisationsnummer) in \
search results. An organization number has ten digits, usually written NNNNNN-NNNN. Answer with \
a JSON object {\"organization_number\": string or null}. Use null when no result states the \
number of exactly this company. Never guess.";

const ATTRIBUTES_SYSTEM: &str = "You extract facts about a company from the sources given. \
Answer with one JSON object with the keys description, mission, sectors (list of strings), \
website, num_employees (integer), year_founded (integer), key_people (list of names with role), \
aliases (other names the company trades under) and investment_thesis (only for investment \
firms). Use null or an empty list for anything the sources do not state.";

const INVESTORS_SYSTEM: &str = "You identify the owners and investors of a company from the \
sources given. Answer with a JSON object {\"investors\": [{\"investor_name\": string, \
\"ownership_percentage\": number or null, \"organization_id\": string or null}]}. Only list \
investors the sources name explicitly; an empty list is a valid answer. Never guess \
percentages or organization numbers.";

/// Search results kept per attribute prompt
const ATTRIBUTE_CONTEXTS: usize = 5;
const ATTRIBUTE_CONTEXT_CHARS: usize = 2_000;

/// Search results kept per investor prompt
const INVESTOR_CONTEXTS: usize = 10;
const INVESTOR_CONTEXT_CHARS: usize = 3_000;

/// Report text passed alongside web results
const REPORT_CONTEXT_CHARS: usize = 8_000;

/// Sources listed first in the investor prompt
const AUTHORITATIVE_DOMAINS: [&str; 5] = [
    "fi.se",
    "bolagsverket",
    "stockholmsborsen",
    "di.se",
    "svd.se",
];

#[derive(Debug, Deserialize)]
struct IdentifierAnswer {
    #[serde(default)]
    organization_number: Value,
}

#[derive(Debug, Deserialize)]
struct InvestorsAnswer {
    #[serde(default)]
    investors: Vec<InvestorAnswer>,
}

#[derive(Debug, Deserialize)]
struct InvestorAnswer {
    #[serde(alias = "name")]
    investor_name: Option<String>,
    #[serde(default)]
    ownership_percentage: Value,
    #[serde(default, alias = "org_id")]
    organization_id: Option<String>,
}

/// [`WebIntelligence`] that reads search results with a language model
#[derive(Clone)]
pub struct LlmWebIntelligence {
    search: Arc<dyn WebSearch>,
    llm: Arc<dyn JsonCompletion>,
}

impl LlmWebIntelligence {
    pub fn new(search: Arc<dyn WebSearch>, llm: Arc<dyn JsonCompletion>) -> Self {
        Self { search, llm }
    }

    fn investor_queries(name: &str, entity_id: &OrgNumber) -> Vec<String> {
        vec![
            format!("{} {} ägare investerare VC", name, entity_id),
            format!("{} {} site:allabolag.se", name, entity_id),
            format!("{} venture capital VC investor funding", name),
            format!("{} största ägare aktieägare", name),
        ]
    }

    /// Run every query, tolerating individual failures
    async fn gather(&self, queries: &[String], depth: SearchDepth) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for query in queries {
            match self.search.search(query, depth).await {
                Ok(results) => {
                    succeeded += 1;
                    for hit in results {
                        if !hits.iter().any(|h| h.url == hit.url) {
                            hits.push(hit);
                        }
                    }
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search query failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(hits),
        }
    }
}

fn is_authoritative(url: &str) -> bool {
    AUTHORITATIVE_DOMAINS.iter().any(|domain| url.contains(domain))
}

/// Authoritative sources first, otherwise in search order
fn rank_hits(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by_key(|hit| !is_authoritative(&hit.url));
    hits
}

fn render_contexts(hits: &[SearchHit], limit: usize, max_chars: usize) -> String {
    hits.iter()
        .take(limit)
        .map(|hit| hit.as_context(max_chars))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Validate a model-supplied id, falling back to a number written next to the investor's name
fn investor_identifier(
    claimed: Option<&str>,
    name: &str,
    target: &OrgNumber,
    contexts: &[SearchHit],
) -> Option<String> {
    if let Some(id) = claimed.and_then(|id| OrgNumber::parse(id).ok()) {
        return (id != *target).then(|| id.into());
    }

    // Only a number written right after the investor's name belongs to it
    let pattern = format!(
        r"(?i){}[\s,:(]*(?:org(?:anisations)?\.?\s*(?:nr|nummer)\.?[\s:]*)?(\d{{6}}-?\d{{4}})\b",
        regex::escape(name.trim())
    );
    let adjacent = Regex::new(&pattern).ok()?;
    contexts
        .iter()
        .flat_map(|hit| adjacent.captures_iter(&hit.content))
        .filter_map(|caps| OrgNumber::parse(caps.get(1)?.as_str()).ok())
        .find(|id| id != target)
        .map(String::from)
}

#[async_trait]
impl WebIntelligence for LlmWebIntelligence {
    async fn find_identifier(&self, name: &str) -> Result<Option<OrgNumber>> {
        let hits = self
            .search
            .search(&format!("{} organisationsnummer", name), SearchDepth::Basic)
            .await?;
        if hits.is_empty() {
            return Ok(None);
        }

        let context = render_contexts(&hits, ATTRIBUTE_CONTEXTS, ATTRIBUTE_CONTEXT_CHARS);
        let user = format!("Company: {}\n\nSearch results:\n{}", name, context);
        let answer: IdentifierAnswer =
            serde_json::from_value(self.llm.complete_json_value(IDENTIFIER_SYSTEM, &user).await?)?;

        let id = value_text(&answer.organization_number)
            .and_then(|text| extract_identifier_from_text(&text));
        debug!(name, found = id.is_some(), "Identifier lookup");
        Ok(id)
    }

    async fn extract_attributes(
        &self,
        name: &str,
        entity_id: &OrgNumber,
        context: Option<&str>,
    ) -> Result<Option<AttributeBag>> {
        let hits = match self
            .search
            .search(&format!("{} {} Sweden", name, entity_id), SearchDepth::Basic)
            .await
        {
            Ok(hits) => hits,
            Err(e) if context.is_some() => {
                warn!(name, error = %e, "Attribute search failed, using report only");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if hits.is_empty() && context.is_none() {
            return Ok(None);
        }

        let mut user = format!("Company: {} ({})\n", name, entity_id);
        if let Some(report) = context {
            let report: String = report.chars().take(REPORT_CONTEXT_CHARS).collect();
            user.push_str("\nAnnual report excerpt:\n");
            user.push_str(&report);
            user.push('\n');
        }
        if !hits.is_empty() {
            user.push_str("\nSearch results:\n");
            user.push_str(&render_contexts(
                &hits,
                ATTRIBUTE_CONTEXTS,
                ATTRIBUTE_CONTEXT_CHARS,
            ));
        }

        let extracted: ExtractedAttributes =
            serde_json::from_value(self.llm.complete_json_value(ATTRIBUTES_SYSTEM, &user).await?)?;
        let bag = extracted.into_bag();
        Ok((!bag.is_empty()).then_some(bag))
    }

    async fn find_investors(
        &self,
        name: &str,
        entity_id: &OrgNumber,
    ) -> Result<Vec<InvestorCandidate>> {
        let queries = Self::investor_queries(name, entity_id);
        let hits = rank_hits(self.gather(&queries, SearchDepth::Advanced).await?);
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let contexts: Vec<SearchHit> = hits.into_iter().take(INVESTOR_CONTEXTS).collect();
        let user = format!(
            "Company: {} ({})\n\nSources:\n{}",
            name,
            entity_id,
            render_contexts(&contexts, INVESTOR_CONTEXTS, INVESTOR_CONTEXT_CHARS)
        );
        let answer: InvestorsAnswer =
            serde_json::from_value(self.llm.complete_json_value(INVESTORS_SYSTEM, &user).await?)
                .map_err(|e| Error::LLMError(format!("Unexpected investor answer: {}", e)))?;

        let investors: Vec<InvestorCandidate> = answer
            .investors
            .into_iter()
            .filter_map(|raw| {
                let investor_name = raw.investor_name?.trim().to_string();
                if investor_name.is_empty() {
                    return None;
                }
                let entity_id =
                    investor_identifier(
                    raw.organization_id.as_deref(),
                    &investor_name,
                    entity_id,
                    &contexts,
                );
                let mut candidate =
                    InvestorCandidate::new(investor_name, parse_percentage(&raw.ownership_percentage));
                candidate.entity_id = entity_id;
                Some(candidate)
            })
            .collect();

        info!(name, investors = investors.len(), "Investor lookup");
        Ok(investors)
    }
}
