//! Web search backends

mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use tavily::TavilySearch;

/// How hard the backend should look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SearchHit {
    /// Render as prompt context, cutting the content to `max_chars`
    pub fn as_context(&self, max_chars: usize) -> String {
        let content: String = self.content.chars().take(max_chars).collect();
        if self.title.is_empty() {
            format!("Source: {}\nContent: {}", self.url, content)
        } else {
            format!("Source: {} ({})\nContent: {}", self.title, self.url, content)
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, depth: SearchDepth) -> Result<Vec<SearchHit>>;
}
