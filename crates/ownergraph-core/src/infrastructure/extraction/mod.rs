//! Collaborators backed by web search and a language model
//!
//! - [`LlmWebIntelligence`] answers identifier, attribute and investor
//!   questions from search results
//! - [`ReportDirectory`] reads annual reports from disk and asks the model
//!   for the holdings listed in them
//! - [`NoDocuments`] and [`UnavailableWeb`] stand in when either side is not
//!   configured
//!
//! Model answers are loosely typed; the helpers here turn them into domain
//! values and drop anything that doesn't fit.

mod offline;
mod reports;
mod web;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::ownership::AttributeBag;

pub use offline::{NoDocuments, UnavailableWeb};
pub use reports::{DEFAULT_MAX_REPORT_CHARS, ReportDirectory};
pub use web::LlmWebIntelligence;

/// Read a percentage from a number or a string such as `"22,5 %"`
pub(crate) fn parse_percentage(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .replace(',', ".")
            .parse()
            .ok(),
        _ => None,
    }
}

/// Read a non-negative integer from a number or a numeric string
fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Attribute fields as the model returns them
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ExtractedAttributes {
    description: Option<String>,
    mission: Option<String>,
    website: Option<String>,
    investment_thesis: Option<String>,
    sectors: Value,
    key_people: Value,
    aliases: Value,
    #[serde(alias = "employee_count")]
    num_employees: Value,
    #[serde(alias = "founded_year")]
    year_founded: Value,
}

impl ExtractedAttributes {
    pub(crate) fn into_bag(self) -> AttributeBag {
        let mut bag = AttributeBag {
            description: self.description,
            mission: self.mission,
            website: self.website,
            investment_thesis: self.investment_thesis,
            sectors: string_list(&self.sectors).into_iter().collect(),
            key_people: string_list(&self.key_people).into_iter().collect(),
            aliases: string_list(&self.aliases).into_iter().collect(),
            employee_count: None,
            founded_year: None,
        };
        bag.employee_count = parse_count(&self.num_employees).and_then(|c| u32::try_from(c).ok());
        bag.founded_year = parse_count(&self.year_founded)
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| (1600..=2100).contains(y));
        bag.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage(&json!(22.5)), Some(22.5));
        assert_eq!(parse_percentage(&json!("22,5 %")), Some(22.5));
        assert_eq!(parse_percentage(&json!("100%")), Some(100.0));
        assert_eq!(parse_percentage(&json!(null)), None);
        assert_eq!(parse_percentage(&json!("majority")), None);
    }

    #[test]
    fn test_extracted_attributes_lenient() {
        let extracted: ExtractedAttributes = serde_json::from_value(json!({
            "description": "  Industrial holding company ",
            "sectors": ["Industrials", ""],
            "key_people": "Jane Doe, John Roe",
            "website": "investorab.com",
            "num_employees": "about 1 200",
            "year_founded": "1916",
            "aliases": null
        }))
        .unwrap();
        let bag = extracted.into_bag();

        assert_eq!(bag.description.as_deref(), Some("Industrial holding company"));
        assert_eq!(bag.sectors.len(), 1);
        assert!(bag.key_people.contains("John Roe"));
        assert_eq!(bag.website.as_deref(), Some("https://www.investorab.com"));
        assert_eq!(bag.employee_count, Some(1200));
        assert_eq!(bag.founded_year, Some(1916));
        assert!(bag.aliases.is_empty());
    }

    #[test]
    fn test_implausible_year_dropped() {
        let extracted: ExtractedAttributes =
            serde_json::from_value(json!({"year_founded": 12})).unwrap();
        assert_eq!(extracted.into_bag().founded_year, None);
    }
}
