//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ownership::{DEFAULT_COUNTRY_CODE, DEFAULT_MAX_CANDIDATES, IngestionSettings};
use crate::storage::database::{DEFAULT_MAX_CONNECTIONS, default_database_path};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "OWNERGRAPH_CONFIG_DIR";

/// Ownergraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub documents: DocumentsConfig,
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Rejected by `validate`; keys come from `api_key_env`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: "openrouter".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout_secs: 60,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.tavily.com".to_string(),
            max_results: 5,
            timeout_secs: 30,
            api_key_env: "TAVILY_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Directory of `<digits>.txt` annual reports
    pub reports_dir: Option<PathBuf>,
    /// Report text sent to the model is cut to this many characters
    pub max_report_chars: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            reports_dir: None,
            max_report_chars: 24_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub collaborator_timeout_secs: u64,
    pub max_candidates: usize,
    pub default_country_code: String,
    pub max_concurrent_runs: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_secs: 60,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            max_concurrent_runs: 4,
        }
    }
}

impl IngestionConfig {
    pub fn settings(&self) -> IngestionSettings {
        IngestionSettings {
            country_code: self.default_country_code.clone(),
            max_candidates: self.max_candidates,
            collaborator_timeout: Duration::from_secs(self.collaborator_timeout_secs),
        }
    }
}

fn key_from_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn redact(key: &str) -> String {
    if key.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", &key[key.len() - 4..])
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(key_from_env(&self.api_key_env))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via the {} environment variable, not stored in configuration",
                self.api_key_env
            ));
        }
        Ok(())
    }
}

impl SearchConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(key_from_env(&self.api_key_env))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Search API keys must be provided via the {} environment variable, not stored in configuration",
                self.api_key_env
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("ownergraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        fs::write(&path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        self.search.enforce_env_only()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be between 0.0 and 2.0"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        if self.ingestion.collaborator_timeout_secs == 0 {
            return Err(anyhow!("ingestion.collaborator_timeout_secs must be at least 1"));
        }
        if self.ingestion.max_concurrent_runs == 0 {
            return Err(anyhow!("ingestion.max_concurrent_runs must be at least 1"));
        }
        let country = &self.ingestion.default_country_code;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(anyhow!(
                "ingestion.default_country_code must be a two-letter upper-case code, got {:?}",
                country
            ));
        }
        Ok(())
    }

    /// Key/value listing for display, with API keys redacted
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let key_status = |key: Option<String>, var: &str| match key {
            Some(key) => redact(&key),
            None => format!("(not set - use the {} env var)", var),
        };

        Ok(vec![
            ("database.path".into(), self.database.path.display().to_string()),
            ("database.max_connections".into(), self.database.max_connections.to_string()),
            ("llm.provider".into(), self.llm.provider.clone()),
            ("llm.model".into(), self.llm.model.clone()),
            ("llm.base_url".into(), self.llm.base_url.clone()),
            ("llm.max_tokens".into(), self.llm.max_tokens.to_string()),
            ("llm.temperature".into(), self.llm.temperature.to_string()),
            ("llm.timeout_secs".into(), self.llm.timeout_secs.to_string()),
            (
                "llm.api_key".into(),
                key_status(self.llm.resolved_api_key()?, &self.llm.api_key_env),
            ),
            ("search.base_url".into(), self.search.base_url.clone()),
            ("search.max_results".into(), self.search.max_results.to_string()),
            ("search.timeout_secs".into(), self.search.timeout_secs.to_string()),
            (
                "search.api_key".into(),
                key_status(self.search.resolved_api_key()?, &self.search.api_key_env),
            ),
            (
                "documents.reports_dir".into(),
                self.documents
                    .reports_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string()),
            ),
            ("documents.max_report_chars".into(), self.documents.max_report_chars.to_string()),
            (
                "ingestion.collaborator_timeout_secs".into(),
                self.ingestion.collaborator_timeout_secs.to_string(),
            ),
            ("ingestion.max_candidates".into(), self.ingestion.max_candidates.to_string()),
            (
                "ingestion.default_country_code".into(),
                self.ingestion.default_country_code.clone(),
            ),
            (
                "ingestion.max_concurrent_runs".into(),
                self.ingestion.max_concurrent_runs.to_string(),
            ),
        ])
    }
}
