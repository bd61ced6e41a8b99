//! Configuration management for Rove
//!
//! Settings are layered, later layers winning:
//! 1. Built-in defaults
//! 2. `.rove/config.toml` in the target repository (optional)
//! 3. Environment variables (`LLM_ENDPOINT`, `API_TIMEOUT`, `MAX_RETRY_ATTEMPTS`, ...)
//!
//! Configuration is read once at startup and never changes during a run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::Backoff;
use crate::{Result, RoveError};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoveConfig {
    /// Chat endpoint selection
    #[serde(default)]
    pub llm: LlmConfig,

    /// Timeouts for external operations
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Backoff schedule shared by all retried calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Chat endpoint selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (never written back to disk)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Azure-style API version; switches to `api-key` header auth when set
    #[serde(default)]
    pub api_version: Option<String>,

    /// Model used for the agent loop and text synthesis
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for image analysis (falls back to `model`)
    #[serde(default)]
    pub vision_model: Option<String>,
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Transport timeout for LLM requests
    #[serde(default = "default_api_timeout")]
    pub api_ms: u64,

    /// Per-attempt timeout for web fetches
    #[serde(default = "default_web_timeout")]
    pub web_ms: u64,

    /// Wall-clock limit for shell commands
    #[serde(default = "default_command_timeout")]
    pub command_ms: u64,

    /// Per-attempt timeout for image fetches and reachability checks
    #[serde(default = "default_image_timeout")]
    pub image_ms: u64,
}

/// Retry schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

/// Agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Turn budget for one task
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Optional file overriding the built-in system prompt
    #[serde(default = "default_system_prompt_path")]
    pub system_prompt_path: PathBuf,
}

// Default value providers
fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_timeout() -> u64 {
    60_000
}

fn default_web_timeout() -> u64 {
    30_000
}

fn default_command_timeout() -> u64 {
    120_000
}

fn default_image_timeout() -> u64 {
    90_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_turns() -> usize {
    50
}

fn default_system_prompt_path() -> PathBuf {
    PathBuf::from("system_prompt.txt")
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_version: None,
            model: default_model(),
            vision_model: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            api_ms: default_api_timeout(),
            web_ms: default_web_timeout(),
            command_ms: default_command_timeout(),
            image_ms: default_image_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system_prompt_path: default_system_prompt_path(),
        }
    }
}

impl LlmConfig {
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }
}

impl TimeoutConfig {
    pub fn api(&self) -> Duration {
        Duration::from_millis(self.api_ms)
    }

    pub fn web(&self) -> Duration {
        Duration::from_millis(self.web_ms)
    }

    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    pub fn image(&self) -> Duration {
        Duration::from_millis(self.image_ms)
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

impl RoveConfig {
    /// Load `.rove/config.toml` from the repository (if present), then apply
    /// environment overrides.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let mut config = Self::load_file_or_default(repo_root)?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load `.rove/config.toml` or use defaults
    pub fn load_file_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".rove/config.toml");

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                RoveError::Config(format!(
                    "Failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(key) = get("LLM_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(version) = get("LLM_API_VERSION") {
            self.llm.api_version = Some(version);
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = get("LLM_VISION_MODEL") {
            self.llm.vision_model = Some(model);
        }

        override_parsed(&get, "API_TIMEOUT", &mut self.timeouts.api_ms)?;
        override_parsed(&get, "WEB_TIMEOUT", &mut self.timeouts.web_ms)?;
        override_parsed(&get, "COMMAND_TIMEOUT", &mut self.timeouts.command_ms)?;
        override_parsed(&get, "IMAGE_TIMEOUT", &mut self.timeouts.image_ms)?;

        override_parsed(&get, "MAX_RETRY_ATTEMPTS", &mut self.retry.max_attempts)?;
        override_parsed(&get, "RETRY_BASE_DELAY", &mut self.retry.base_delay_ms)?;
        override_parsed(&get, "RETRY_MAX_DELAY", &mut self.retry.max_delay_ms)?;
        override_parsed(
            &get,
            "RETRY_BACKOFF_MULTIPLIER",
            &mut self.retry.backoff_multiplier,
        )?;

        override_parsed(&get, "MAX_TURNS", &mut self.agent.max_turns)?;
        if let Some(path) = get("SYSTEM_PROMPT_PATH") {
            self.agent.system_prompt_path = PathBuf::from(path);
        }

        Ok(())
    }
}

fn override_parsed<T, G>(get: &G, key: &str, slot: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| RoveError::Config(format!("Invalid value for {}: {:?} ({})", key, raw, e)))?;
    }
    Ok(())
}
