//! Tavily search API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{Error, Result};

use super::{SearchDepth, SearchHit, WebSearch};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Web search over the Tavily REST API
#[derive(Clone)]
pub struct TavilySearch {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
    max_results: usize,
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl TavilySearch {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey(config.api_key_env.clone()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: config.max_results.max(1),
        })
    }

    /// Create a client with the key read from `config.api_key_env`
    pub fn from_env(config: &SearchConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or_else(|| Error::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, depth: SearchDepth) -> Result<Vec<SearchHit>> {
        debug!(query, depth = depth.as_str(), "Web search");

        let response = self
            .http_client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                search_depth: depth.as_str(),
                max_results: self.max_results,
            })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::RateLimited(60));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CollaboratorUnavailable {
                service: "tavily".to_string(),
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = SearchRequest {
            api_key: "tvly-key",
            query: "Investor AB organisationsnummer",
            search_depth: SearchDepth::Basic.as_str(),
            max_results: 5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["search_depth"], "basic");
        assert_eq!(json["max_results"], 5);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "query": "q",
            "results": [
                {"title": "Investor AB", "url": "https://www.allabolag.se/5560434200", "content": "Org.nr 556043-4200", "score": 0.9}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].url, "https://www.allabolag.se/5560434200");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }

    #[test]
    fn test_requires_key() {
        let config = SearchConfig::default();
        assert!(matches!(
            TavilySearch::new(&config, ""),
            Err(Error::MissingApiKey(ref var)) if var == "TAVILY_API_KEY"
        ));
        let client = TavilySearch::new(&config, "tvly-secret").unwrap();
        assert!(!format!("{:?}", client).contains("tvly-secret"));
    }
}
