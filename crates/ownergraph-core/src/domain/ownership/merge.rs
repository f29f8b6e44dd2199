//! Attribute bags and the field-level merge law
//!
//! Extraction passes (annual reports, web search) each produce an
//! [`AttributeBag`]. Bags are combined with [`merge`], which is total over
//! every field and deterministic:
//!
//! - text fields: the incoming value wins when the existing one is absent or
//!   empty, or when the incoming one is non-empty and strictly longer
//! - set fields: union
//! - scalar fields: the incoming value only fills a gap
//!
//! Identifier and display name never live in a bag; callers set them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::entity::EntityRole;

/// Descriptive attributes of an entity, as extracted from one or more sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeBag {
    pub description: Option<String>,
    pub mission: Option<String>,
    pub website: Option<String>,
    /// Only persisted for funds
    pub investment_thesis: Option<String>,
    pub sectors: BTreeSet<String>,
    pub key_people: BTreeSet<String>,
    pub aliases: BTreeSet<String>,
    pub employee_count: Option<u32>,
    pub founded_year: Option<i32>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mission(mut self, mission: impl Into<String>) -> Self {
        self.mission = Some(mission.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_investment_thesis(mut self, thesis: impl Into<String>) -> Self {
        self.investment_thesis = Some(thesis.into());
        self
    }

    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors.extend(sectors.into_iter().map(Into::into));
        self
    }

    pub fn with_key_people<I, S>(mut self, people: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_people.extend(people.into_iter().map(Into::into));
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn with_employee_count(mut self, count: u32) -> Self {
        self.employee_count = Some(count);
        self
    }

    pub fn with_founded_year(mut self, year: i32) -> Self {
        self.founded_year = Some(year);
        self
    }

    /// True when no field carries information
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Trim text, drop empty values and canonicalize the website URL
    pub fn normalized(self) -> Self {
        Self {
            description: clean_text(self.description),
            mission: clean_text(self.mission),
            website: clean_text(self.website).map(|w| normalize_website(&w)),
            investment_thesis: clean_text(self.investment_thesis),
            sectors: clean_set(self.sectors),
            key_people: clean_set(self.key_people),
            aliases: clean_set(self.aliases),
            employee_count: self.employee_count,
            founded_year: self.founded_year,
        }
    }

    /// Restrict the bag to the fields the given role may store
    pub fn shaped_for(mut self, role: EntityRole) -> Self {
        if role == EntityRole::Company {
            self.investment_thesis = None;
        }
        self
    }
}

/// Merge `incoming` into `existing`
pub fn merge(existing: &AttributeBag, incoming: &AttributeBag) -> AttributeBag {
    AttributeBag {
        description: merge_text(&existing.description, &incoming.description),
        mission: merge_text(&existing.mission, &incoming.mission),
        website: merge_text(&existing.website, &incoming.website),
        investment_thesis: merge_text(&existing.investment_thesis, &incoming.investment_thesis),
        sectors: merge_set(&existing.sectors, &incoming.sectors),
        key_people: merge_set(&existing.key_people, &incoming.key_people),
        aliases: merge_set(&existing.aliases, &incoming.aliases),
        employee_count: existing.employee_count.or(incoming.employee_count),
        founded_year: existing.founded_year.or(incoming.founded_year),
    }
}

/// Combine independently extracted bags, earliest source first
pub fn combine<'a, I>(bags: I) -> AttributeBag
where
    I: IntoIterator<Item = &'a AttributeBag>,
{
    bags.into_iter()
        .fold(AttributeBag::default(), |acc, bag| merge(&acc, bag))
}

fn merge_text(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
    match (existing, incoming) {
        (None, incoming) => incoming.clone(),
        (existing, None) => existing.clone(),
        (Some(e), Some(i)) if e.is_empty() => Some(i.clone()),
        (Some(e), Some(i)) if i.chars().count() > e.chars().count() => Some(i.clone()),
        (existing, _) => existing.clone(),
    }
}

fn merge_set(existing: &BTreeSet<String>, incoming: &BTreeSet<String>) -> BTreeSet<String> {
    existing.union(incoming).cloned().collect()
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_set(values: BTreeSet<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Add a scheme (and `www.` for bare domains) to a website
pub fn normalize_website(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with("www.") {
        format!("https://{}", url)
    } else {
        format!("https://www.{}", url)
    }
}
