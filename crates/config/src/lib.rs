//! Configuration loading, validation, and management for rpgforge.
//!
//! Loads configuration from `~/.rpgforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rpgforge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion backend (Azure OpenAI) settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document and artifact storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Context window budgeting
    #[serde(default)]
    pub context: ContextConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// e.g. `https://my-resource.openai.azure.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_deployment")]
    pub deployment: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Tokens reserved for the model's answer
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_api_version() -> String {
    "2024-02-01".into()
}
fn default_deployment() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_response_tokens() -> u32 {
    4000
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            api_version: default_api_version(),
            deployment: default_deployment(),
            temperature: default_temperature(),
            max_response_tokens: default_max_response_tokens(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .field("temperature", &self.temperature)
            .field("max_response_tokens", &self.max_response_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root. Defaults to `~/.rpgforge/storage`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Artifacts older than this are swept. 0 keeps them forever.
    #[serde(default = "default_retention_days")]
    pub artifact_retention_days: u32,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_retention_days() -> u32 {
    30
}
fn default_sweep_interval_secs() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_upload_bytes: default_max_upload_bytes(),
            artifact_retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StorageConfig {
    /// Resolved storage root directory.
    pub fn root_dir(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("storage"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context ceiling of the deployed model
    #[serde(default = "default_ceiling_tokens")]
    pub ceiling_tokens: usize,

    /// Parts that cannot keep at least this many tokens are dropped instead of truncated
    #[serde(default = "default_min_part_tokens")]
    pub min_part_tokens: usize,

    /// Upper bound on reference sections offered to the budgeter per call
    #[serde(default = "default_max_reference_sections")]
    pub max_reference_sections: usize,
}

fn default_ceiling_tokens() -> usize {
    128_000
}
fn default_min_part_tokens() -> usize {
    256
}
fn default_max_reference_sections() -> usize {
    12
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ceiling_tokens: default_ceiling_tokens(),
            min_part_tokens: default_min_part_tokens(),
            max_reference_sections: default_max_reference_sections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub allow_public_bind: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allow_public_bind: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rpgforge/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the environment.
    ///
    /// - `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT`
    /// - `AZURE_OPENAI_API_VERSION`, `AZURE_OPENAI_DEPLOYMENT_NAME`
    /// - `RPGFORGE_STORAGE_DIR`, `RPGFORGE_PORT`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("AZURE_OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT").filter(|v| !v.is_empty()) {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION").filter(|v| !v.is_empty()) {
            self.llm.api_version = version;
        }
        if let Some(deployment) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME").filter(|v| !v.is_empty()) {
            self.llm.deployment = deployment;
        }
        if let Some(dir) = lookup("RPGFORGE_STORAGE_DIR").filter(|v| !v.is_empty()) {
            self.storage.root = Some(PathBuf::from(dir));
        }
        if let Some(port) = lookup("RPGFORGE_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rpgforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_attempts must be at least 1".into(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.llm.base_delay_ms > self.llm.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "llm.base_delay_ms must not exceed llm.max_delay_ms".into(),
            ));
        }

        let reserved = self.llm.max_response_tokens as usize + self.context.min_part_tokens;
        if self.context.ceiling_tokens <= reserved {
            return Err(ConfigError::ValidationError(format!(
                "context.ceiling_tokens ({}) must exceed llm.max_response_tokens + context.min_part_tokens ({reserved})",
                self.context.ceiling_tokens
            )));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_upload_bytes must be greater than 0".into(),
            ));
        }

        if self.gateway.host == "0.0.0.0" && !self.gateway.allow_public_bind {
            return Err(ConfigError::ValidationError(
                "gateway.host 0.0.0.0 requires gateway.allow_public_bind = true".into(),
            ));
        }

        Ok(())
    }

    /// Whether the completion backend can be reached at all.
    pub fn has_llm_credentials(&self) -> bool {
        self.llm.api_key.is_some() && self.llm.endpoint.is_some()
    }

    /// Tokens available for the prompt once the answer is reserved.
    pub fn prompt_budget_tokens(&self) -> usize {
        self.context
            .ceiling_tokens
            .saturating_sub(self.llm.max_response_tokens as usize)
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
