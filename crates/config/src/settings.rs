//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use parts_search_core::{BreakerConfig, RankWeights};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Ranking experiment group, selecting one of the named weight profiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentGroup {
    #[default]
    Control,
    RelevanceHeavy,
    QualityHeavy,
    EngagementHeavy,
}

impl ExperimentGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentGroup::Control => "control",
            ExperimentGroup::RelevanceHeavy => "relevance_heavy",
            ExperimentGroup::QualityHeavy => "quality_heavy",
            ExperimentGroup::EngagementHeavy => "engagement_heavy",
        }
    }

    /// The weight vector this group starts from. Each profile sums to 1.
    pub fn weights(&self) -> RankWeights {
        match self {
            ExperimentGroup::Control => RankWeights::default(),
            ExperimentGroup::RelevanceHeavy => RankWeights {
                es_score: 0.35,
                part_number_match: 0.20,
                category_match: 0.12,
                brand_match: 0.08,
                vehicle_fitment: 0.10,
                data_completeness: 0.05,
                has_image: 0.02,
                has_stock: 0.03,
                click_rate: 0.03,
                purchase_rate: 0.01,
                freshness: 0.01,
            },
            ExperimentGroup::QualityHeavy => RankWeights {
                es_score: 0.18,
                part_number_match: 0.10,
                category_match: 0.10,
                brand_match: 0.08,
                vehicle_fitment: 0.10,
                data_completeness: 0.18,
                has_image: 0.08,
                has_stock: 0.10,
                click_rate: 0.04,
                purchase_rate: 0.02,
                freshness: 0.02,
            },
            ExperimentGroup::EngagementHeavy => RankWeights {
                es_score: 0.18,
                part_number_match: 0.10,
                category_match: 0.08,
                brand_match: 0.06,
                vehicle_fitment: 0.08,
                data_completeness: 0.05,
                has_image: 0.02,
                has_stock: 0.08,
                click_rate: 0.20,
                purchase_rate: 0.12,
                freshness: 0.03,
            },
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Per-stage toggle and advisory timeout
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 1_000,
        }
    }
}

impl StageSettings {
    fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            enabled: true,
            timeout_ms,
        }
    }
}

/// The five pipeline stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesSettings {
    pub understanding: StageSettings,
    pub retrieval: StageSettings,
    pub filtering: StageSettings,
    pub ranking: StageSettings,
    pub explanation: StageSettings,
}

impl Default for StagesSettings {
    fn default() -> Self {
        Self {
            understanding: StageSettings::with_timeout(3_000),
            retrieval: StageSettings::with_timeout(5_000),
            filtering: StageSettings::with_timeout(1_000),
            ranking: StageSettings::with_timeout(1_000),
            explanation: StageSettings::with_timeout(1_000),
        }
    }
}

/// Caching behavior
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingSettings {
    pub enabled: bool,
    /// TTL for full search responses, seconds
    pub search_results_ttl: u64,
}

impl Default for CachingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            search_results_ttl: crate::constants::cache::RESPONSE_TTL_SECS,
        }
    }
}

/// Result-set limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSettings {
    /// Hard cap on candidates leaving the filter stage
    pub max_results: usize,
    /// Default page size
    pub page_size: usize,
    /// Place in-stock candidates before out-of-stock ones in the business sort
    pub stock_priority: bool,
}

impl Default for LimitsSettings {
    fn default() -> Self {
        Self {
            max_results: crate::constants::filtering::MAX_RESULTS,
            page_size: crate::constants::pagination::DEFAULT_LIMIT,
            stock_priority: true,
        }
    }
}

/// One circuit breaker's tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub threshold: u32,
    pub timeout_ms: u64,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout_ms: 20_000,
            success_threshold: 2,
        }
    }
}

impl From<BreakerSettings> for BreakerConfig {
    fn from(s: BreakerSettings) -> Self {
        BreakerConfig {
            threshold: s.threshold,
            timeout: Duration::from_millis(s.timeout_ms),
            success_threshold: s.success_threshold,
        }
    }
}

/// The three protected dependencies
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakersSettings {
    pub llm: BreakerSettings,
    pub index: BreakerSettings,
    pub db: BreakerSettings,
}

impl Default for BreakersSettings {
    fn default() -> Self {
        Self {
            llm: BreakerSettings {
                threshold: 3,
                timeout_ms: 30_000,
                success_threshold: 2,
            },
            index: BreakerSettings {
                threshold: 5,
                timeout_ms: 20_000,
                success_threshold: 2,
            },
            db: BreakerSettings {
                threshold: 5,
                timeout_ms: 15_000,
                success_threshold: 2,
            },
        }
    }
}

/// LLM adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_ms: u64,
    /// Token-parser confidence above which the LLM is skipped
    pub threshold: f64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            timeout_ms: 3_000,
            threshold: crate::constants::understanding::LLM_SKIP_THRESHOLD,
            api_key_env: "PARTS_SEARCH_LLM_API_KEY".to_string(),
        }
    }
}

/// Text-index adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub base_url: String,
    pub index_name: String,
    pub timeout_ms: u64,
    pub max_candidates: usize,
    pub min_score: f64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            index_name: "parts".to_string(),
            timeout_ms: crate::constants::retrieval::ENGINE_TIMEOUT_MS,
            max_candidates: crate::constants::retrieval::MAX_CANDIDATES,
            min_score: crate::constants::retrieval::MIN_SCORE,
        }
    }
}

/// Optional distributed cache tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub enabled: bool,
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub stages: StagesSettings,
    pub caching: CachingSettings,
    pub limits: LimitsSettings,
    pub ranking_experiment_group: ExperimentGroup,
    pub circuit_breakers: BreakersSettings,
    pub llm: LlmSettings,
    pub index: IndexSettings,
    pub redis: RedisSettings,
    /// End-to-end deadline for one request
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            stages: StagesSettings::default(),
            caching: CachingSettings::default(),
            limits: LimitsSettings::default(),
            ranking_experiment_group: ExperimentGroup::default(),
            circuit_breakers: BreakersSettings::default(),
            llm: LlmSettings::default(),
            index: IndexSettings::default(),
            redis: RedisSettings::default(),
            request_timeout_ms: 15_000,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.page_size == 0 || self.limits.page_size > crate::constants::pagination::MAX_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "limits.page_size".to_string(),
                message: format!(
                    "must be in 1..={}, got {}",
                    crate::constants::pagination::MAX_LIMIT,
                    self.limits.page_size
                ),
            });
        }

        if self.limits.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_results".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("must be between 0.0 and 1.0, got {}", self.llm.temperature),
            });
        }

        if !(0.0..=1.0).contains(&self.llm.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "llm.threshold".to_string(),
                message: format!("must be between 0.0 and 1.0, got {}", self.llm.threshold),
            });
        }

        for (name, breaker) in [
            ("llm", self.circuit_breakers.llm),
            ("index", self.circuit_breakers.index),
            ("db", self.circuit_breakers.db),
        ] {
            if breaker.threshold == 0 || breaker.success_threshold == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("circuit_breakers.{name}"),
                    message: "thresholds must be at least 1".to_string(),
                });
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from config files and environment
///
/// Layers, later wins: `config/default.toml`, `config/{env}.toml`,
/// `PARTS_SEARCH__`-prefixed environment variables
/// (e.g. `PARTS_SEARCH__SERVER__PORT=9090`).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if Path::new("config/default.toml").exists() {
        builder = builder.add_source(File::with_name("config/default"));
    }

    if let Some(env) = env {
        let path = format!("config/{env}");
        if Path::new(&format!("{path}.toml")).exists() {
            builder = builder.add_source(File::with_name(&path));
        } else {
            tracing::warn!(env, "no config file for environment, using defaults");
        }
    }

    builder = builder.add_source(Environment::with_prefix("PARTS_SEARCH").separator("__"));

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
