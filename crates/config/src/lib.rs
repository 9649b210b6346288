//! Configuration for the parts search pipeline
//!
//! Settings are layered: `config/default.toml`, then `config/{env}.toml`,
//! then `PARTS_SEARCH__`-prefixed environment variables. Tuning values that
//! are not deployment-dependent (boost factors, score weights, cache bounds)
//! live in [`constants`].

pub mod constants;
mod settings;

pub use settings::{
    load_settings, BreakerSettings, BreakersSettings, CachingSettings, ConfigError,
    ExperimentGroup, IndexSettings, LimitsSettings, LlmSettings, RedisSettings, ServerSettings,
    Settings, StageSettings, StagesSettings,
};
