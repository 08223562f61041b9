use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{FernError, Result};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_MODEL_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Top-level config: `fern.toml` plus `FERN_*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FernConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    #[serde(default)]
    pub subagent: SubagentConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    /// Shared-secret for `X-Fern-Secret`. Auth is disabled when unset.
    pub api_secret: Option<String>,

    /// Public base URL used to verify inbound webhook signatures. Signature
    /// verification is skipped when unset.
    pub webhook_url: Option<String>,
}

impl Default for FernConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            model: ModelConfig::default(),
            storage_path: default_storage_path(),
            subagent: SubagentConfig::default(),
            scheduler: SchedulerConfig::default(),
            memory: MemoryConfig::default(),
            api_secret: None,
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_subagent_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_subagent_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: default_subagent_max_concurrent(),
            timeout_ms: default_subagent_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_scheduler_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_scheduler_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: default_scheduler_max_concurrent(),
            tick_interval_ms: default_scheduler_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub path: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_model_provider() -> String {
    DEFAULT_MODEL_PROVIDER.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_subagent_max_concurrent() -> usize {
    3
}
fn default_subagent_timeout_ms() -> u64 {
    480_000
}
fn default_scheduler_max_concurrent() -> usize {
    2
}
fn default_scheduler_tick_interval_ms() -> u64 {
    30_000
}
fn default_storage_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.fern/sessions", home)
}

impl FernConfig {
    /// Load config from an optional TOML file with `FERN_*` env overrides.
    /// Falls back to `~/.fern/fern.toml` when no path is given, and to
    /// built-in defaults when no file is present at all.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FernConfig = Figment::from(figment::providers::Serialized::defaults(
            FernConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("FERN_").split("_"))
        .extract()
        .map_err(|e| FernError::validation(e.to_string()))?;

        Ok(config)
    }

    pub fn db_path(&self) -> String {
        format!("{}/fern.db", self.storage_path)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.fern/fern.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = FernConfig::default();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.model.provider, "openai");
        assert_eq!(cfg.subagent.max_concurrent, 3);
        assert_eq!(cfg.scheduler.max_concurrent, 2);
        assert!(cfg.api_secret.is_none());
    }

    #[test]
    fn db_path_joins_storage_path() {
        let mut cfg = FernConfig::default();
        cfg.storage_path = "/tmp/fern".to_string();
        assert_eq!(cfg.db_path(), "/tmp/fern/fern.db");
    }
}
