//! Configuration management for AnySound Deck
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every field has a default so an empty (or absent) file is a valid setup.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub buttons: ButtonConfig,
    #[serde(default)]
    pub plugin: PluginConfig,
}

/// Automation service connection
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries for read-only calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Retries for set/toggle calls (a retried toggle may apply twice)
    #[serde(default)]
    pub mutation_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

/// Background polling intervals
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
    /// Reload device lists every N status polls (0 disables)
    #[serde(default = "default_device_refresh_every")]
    pub device_refresh_every: u32,
    #[serde(default = "default_cpu_interval")]
    pub cpu_interval_ms: u64,
    #[serde(default = "default_llm_interval")]
    pub llm_interval_ms: u64,
    #[serde(default = "default_llm_max_polls")]
    pub llm_max_polls: u32,
    #[serde(default = "default_llm_startup_delay")]
    pub llm_startup_delay_ms: u64,
}

/// Click guard settle delays
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ButtonConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_modal_settle_ms")]
    pub modal_settle_ms: u64,
    #[serde(default = "default_llm_settle_ms")]
    pub llm_settle_ms: u64,
}

/// Deck plugin identity
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PluginConfig {
    /// Plugin UUID; action UUIDs are `{uuid}.{kind}`
    #[serde(default = "default_plugin_uuid")]
    pub uuid: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            mutation_retries: 0,
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval(),
            device_refresh_every: default_device_refresh_every(),
            cpu_interval_ms: default_cpu_interval(),
            llm_interval_ms: default_llm_interval(),
            llm_max_polls: default_llm_max_polls(),
            llm_startup_delay_ms: default_llm_startup_delay(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            modal_settle_ms: default_modal_settle_ms(),
            llm_settle_ms: default_llm_settle_ms(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            uuid: default_plugin_uuid(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url '{}' is not a valid URL", self.api.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("api.base_url must use http or https (got '{}')", url.scheme());
        }
        if self.api.timeout_ms == 0 {
            anyhow::bail!("api.timeout_ms must be greater than 0");
        }
        if self.api.backoff_base_ms == 0 {
            anyhow::bail!("api.backoff_base_ms must be greater than 0");
        }

        let intervals = [
            ("polling.status_interval_ms", self.polling.status_interval_ms),
            ("polling.cpu_interval_ms", self.polling.cpu_interval_ms),
            ("polling.llm_interval_ms", self.polling.llm_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }
        if self.polling.llm_max_polls == 0 {
            anyhow::bail!("polling.llm_max_polls must be greater than 0");
        }

        if self.plugin.uuid.trim().is_empty() {
            anyhow::bail!("plugin.uuid cannot be empty");
        }

        Ok(())
    }
}

// Default value functions
fn default_base_url() -> String { "http://127.0.0.1:8765".to_string() }
fn default_timeout_ms() -> u64 { 5000 }
fn default_max_retries() -> u32 { 2 }
fn default_backoff_base_ms() -> u64 { 500 }
fn default_status_interval() -> u64 { 3000 }
fn default_device_refresh_every() -> u32 { 10 }
fn default_cpu_interval() -> u64 { 15_000 }
fn default_llm_interval() -> u64 { 5000 }
fn default_llm_max_polls() -> u32 { 60 }
fn default_llm_startup_delay() -> u64 { 1500 }
fn default_settle_ms() -> u64 { 300 }
fn default_modal_settle_ms() -> u64 { 500 }
fn default_llm_settle_ms() -> u64 { 1000 }
fn default_plugin_uuid() -> String { "com.moraes.anysound".to_string() }
