//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::types::StrideError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub marathon: MarathonConfig,
    pub tournament: TournamentConfig,
    pub market: MarketConfig,
    pub reasoning: ReasoningConfig,
    pub sources: SourcesConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub goal: String,
    pub region: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarathonConfig {
    pub duration_hours: u64,
    pub cycle_interval_secs: u64,
    /// |listing delta| above which a market shift is declared.
    pub drift_threshold: i64,
    pub error_backoff_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TournamentConfig {
    pub agent_count: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    /// Regions analysed in a multi-market pass, in order.
    pub regions: Vec<RegionConfig>,
    /// Currency code -> USD conversion multiplier.
    pub currency_rates: HashMap<String, f64>,
    /// Keyword vocabulary for skill-value arbitrage.
    pub skill_keywords: Vec<String>,
    /// Minimum region avg salary (USD) to qualify as an opportunity.
    pub arbitrage_threshold_usd: f64,
    pub max_concurrent_sources: usize,
    pub source_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    /// Fallback model used when the primary model fails.
    #[serde(default)]
    pub fallback_model: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub remotive: RemotiveConfig,
    pub adzuna: AdzunaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemotiveConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdzunaConfig {
    pub enabled: bool,
    pub app_id_env: String,
    pub app_key_env: String,
    pub country: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub checkpoint_path: String,
    pub progress_path: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| StrideError::Config(format!("failed to read config file {path}: {e}")))?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| StrideError::Config(format!("failed to parse config file {path}: {e}")))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name).map_err(|_| {
            StrideError::Config(format!("environment variable not set: {env_name}")).into()
        })
    }
}
