//! Configuration loading, validation, and management for chatrelay.
//!
//! Loads configuration from a TOML file (`--config`, `CHATRELAY_CONFIG`, or
//! `./chatrelay.toml`) and applies environment variable overrides on top.
//! Validates all settings at startup.

use chatrelay_core::provider::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the provider API key (required to serve).
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable pointing at the config file.
pub const CONFIG_ENV: &str = "CHATRELAY_CONFIG";
/// Config file picked up from the working directory when nothing else is set.
pub const DEFAULT_CONFIG_FILE: &str = "chatrelay.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote completion API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Per-session history window and session map bounds
    #[serde(default)]
    pub session: SessionConfig,

    /// Static knowledge corpus
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Persona (system instructions)
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key. Normally supplied through `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    600
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS origins. Empty = any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turns retained per session (K)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Sessions retained before least-recently-used eviction
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle seconds after which a session is pruned. 0 = never.
    #[serde(default)]
    pub idle_ttl_secs: u64,
}

fn default_max_turns() -> usize {
    20
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_sessions: default_max_sessions(),
            idle_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Corpus file: `.json` records or plain text. Unset = no knowledge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Characters per fragment when slicing plain text
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fragments injected per request
    #[serde(default = "default_match_limit")]
    pub match_limit: usize,

    /// Line placed above the injected fragments
    #[serde(default = "default_knowledge_header")]
    pub header: String,
}

fn default_chunk_size() -> usize {
    500
}
fn default_match_limit() -> usize {
    3
}
fn default_knowledge_header() -> String {
    "Relevant reference material:".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: None,
            chunk_size: default_chunk_size(),
            match_limit: default_match_limit(),
            header: default_knowledge_header(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Persona file (markdown or text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Inline persona text; wins over `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Load configuration and apply process environment overrides.
    ///
    /// File resolution order: `explicit` → `CHATRELAY_CONFIG` →
    /// `./chatrelay.toml` (only if it exists) → built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));

        let mut config = match named {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::ReadError {
                        reason: "file does not exist".into(),
                        path,
                    });
                }
                Self::load_from(&path)?
            }
            None => Self::load_from(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        config.apply_env(env)?;
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
        tracing::debug!(file = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// - `OPENAI_API_KEY` → `provider.api_key`
    /// - `PORT` → `gateway.port`
    /// - `CHATRELAY_HOST`, `CHATRELAY_MODEL`, `CHATRELAY_BASE_URL`
    /// - `CHATRELAY_PERSONA` → `persona.path`
    /// - `CHATRELAY_KNOWLEDGE` → `knowledge.path`
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.provider.api_key = Some(key);
        }

        if let Some(port) = non_empty(PORT_ENV) {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{PORT_ENV} must be a port number, got '{port}'"))
            })?;
        }

        if let Some(host) = non_empty("CHATRELAY_HOST") {
            self.gateway.host = host;
        }
        if let Some(model) = non_empty("CHATRELAY_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = non_empty("CHATRELAY_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(path) = non_empty("CHATRELAY_PERSONA") {
            self.persona.path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("CHATRELAY_KNOWLEDGE") {
            self.knowledge.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.provider.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_tokens must be > 0".into(),
            ));
        }
        if self.session.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_turns must be > 0".into(),
            ));
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_sessions must be > 0".into(),
            ));
        }
        if self.knowledge.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// The API key, or the startup error the binary exits with.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Model parameters for completion calls.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.provider.model.clone(),
            max_tokens: self.provider.max_tokens,
            temperature: self.provider.temperature,
        }
    }

    /// Socket address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Set OPENAI_API_KEY in the environment or .env")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.session.max_turns, 20);
        assert_eq!(config.knowledge.chunk_size, 500);
        assert_eq!(config.provider.model, "gpt-4o-mini");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.provider.max_tokens, config.provider.max_tokens);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_turn_window_rejected() {
        let mut config = AppConfig::default();
        config.session.max_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/chatrelay.toml")).unwrap();
        assert_eq!(config.gateway.port, 3000);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = AppConfig::load_with_env(Some(Path::new("/nonexistent/x.toml")), env_from(&[]));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[provider]
model = "gpt-3.5-turbo"
temperature = 0.7

[gateway]
port = 8080
"#
        )
        .unwrap();

        let config = AppConfig::load_with_env(
            Some(file.path()),
            env_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("PORT", "4000"),
                ("CHATRELAY_KNOWLEDGE", "corpus.json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.gateway.port, 4000);
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.knowledge.path, Some(PathBuf::from("corpus.json")));
        assert!((config.provider.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn config_env_var_selects_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[session]\nmax_turns = 6\n").unwrap();
        let path = file.path().display().to_string();

        let config =
            AppConfig::load_with_env(None, env_from(&[(CONFIG_ENV, path.as_str())])).unwrap();
        assert_eq!(config.session.max_turns, 6);
    }

    #[test]
    fn bad_port_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(env_from(&[("PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_api_key_reported() {
        let config = AppConfig::default();
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret-value".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret-value"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("3000"));
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn model_config_mirrors_provider_section() {
        let config = AppConfig::default();
        let model = config.model_config();
        assert_eq!(model.model, "gpt-4o-mini");
        assert_eq!(model.max_tokens, 600);
    }
}
