//! Organization number validation
//!
//! The canonical entity identifier is a Swedish-style organization number:
//! ten decimal digits, conventionally written `NNNNNN-NNNN`. Input may carry
//! dashes or whitespace anywhere; both are ignored when validating.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ten digits, optionally split 6-4 by a dash
static IDENTIFIER_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6}-?\d{4})\b").expect("identifier pattern compiles"));

fn digits_only(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Check whether `s` is a valid organization number
pub fn is_valid_identifier(s: &str) -> bool {
    let digits = digits_only(s);
    digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Format a valid organization number as `NNNNNN-NNNN`
pub fn normalize_identifier(s: &str) -> Result<String> {
    if !is_valid_identifier(s) {
        return Err(Error::InvalidIdentifier(s.to_string()));
    }
    let digits = digits_only(s);
    Ok(format!("{}-{}", &digits[..6], &digits[6..]))
}

/// Find the first organization number mentioned in free text
pub fn extract_identifier_from_text(text: &str) -> Option<OrgNumber> {
    IDENTIFIER_IN_TEXT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| OrgNumber::parse(m.as_str()).ok())
}

/// A validated, normalized organization number
///
/// Holding an `OrgNumber` is proof that the identifier passed validation;
/// entity creation only accepts this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrgNumber(String);

impl OrgNumber {
    /// Validate and normalize
    pub fn parse(s: &str) -> Result<Self> {
        normalize_identifier(s).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ten digits without separator
    pub fn digits(&self) -> String {
        digits_only(&self.0)
    }
}

impl fmt::Display for OrgNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrgNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrgNumber {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<OrgNumber> for String {
    fn from(id: OrgNumber) -> Self {
        id.0
    }
}

impl AsRef<str> for OrgNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("556043-4200"));
        assert!(is_valid_identifier("5560434200"));
        assert!(is_valid_identifier(" 556043 4200 "));
        assert!(is_valid_identifier("55-60-43-42-00"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("556043-420"));
        assert!(!is_valid_identifier("556043-42001"));
        assert!(!is_valid_identifier("55604A-4200"));
        assert!(!is_valid_identifier("556043_4200"));
        assert!(!is_valid_identifier("１２３４５６７８９０"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_identifier("5560434200").unwrap(), "556043-4200");
        assert_eq!(normalize_identifier("556043 - 4200").unwrap(), "556043-4200");
        assert!(matches!(
            normalize_identifier("nope"),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_org_number_serde() {
        let id: OrgNumber = serde_json::from_str("\"5560434200\"").unwrap();
        assert_eq!(id.as_str(), "556043-4200");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"556043-4200\"");
        assert!(serde_json::from_str::<OrgNumber>("\"123\"").is_err());
    }

    #[test]
    fn test_org_number_digits() {
        let id: OrgNumber = "556043-4200".parse().unwrap();
        assert_eq!(id.digits(), "5560434200");
        assert_eq!(id.to_string(), "556043-4200");
    }

    #[test]
    fn test_extract_from_text() {
        let text = "Investor AB (org.nr 556013-8298) är ett investmentbolag.";
        assert_eq!(
            extract_identifier_from_text(text).map(String::from),
            Some("556013-8298".to_string())
        );
        assert_eq!(
            extract_identifier_from_text("id: 5560138298.").map(String::from),
            Some("556013-8298".to_string())
        );
        assert!(extract_identifier_from_text("phone 070-1234567").is_none());
        assert!(extract_identifier_from_text("").is_none());
    }
}
