//! TinyNote client
//!
//! Client side of the TinyNote note-taking service:
//! - Session Guard: authenticated requests with one classification point and
//!   idempotent teardown on credential expiry
//! - Periodic credential revalidation
//! - Incremental SSE decoder for streamed AI chat

pub mod api;
pub mod chat;
pub mod events;
pub mod session;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use api::envelope::AUTH_EXPIRED_CODE;
use chat::Framing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub api: ApiYamlConfig,
    pub session: SessionYamlConfig,
    pub chat: ChatYamlConfig,
}

/// Backend endpoint section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiYamlConfig {
    pub base_url: String,
    pub chat_url: String,
    pub timeout_secs: u64,
    pub validate_path: String,
    /// Business code reserved for "credential expired"
    pub auth_expired_code: i64,
}

impl Default for ApiYamlConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".into(),
            chat_url: "http://localhost:8080/api/ai/chat".into(),
            timeout_secs: 10,
            validate_path: "/user/validate".into(),
            auth_expired_code: AUTH_EXPIRED_CODE,
        }
    }
}

/// Session persistence section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionYamlConfig {
    /// Defaults to `<data_dir>/tinynote/session.json`
    pub state_path: Option<PathBuf>,
    pub revalidate_secs: u64,
    /// Persist the password alongside the remembered username
    pub remember_password: bool,
}

impl Default for SessionYamlConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            revalidate_secs: 300,
            remember_password: false,
        }
    }
}

/// Chat stream section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChatYamlConfig {
    pub sse_framing: Framing,
}

// ============================================================================
// Runtime config (what the client actually uses)
// ============================================================================

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub chat_url: String,
    pub request_timeout: Duration,
    pub revalidate_interval: Duration,
    pub validate_path: String,
    pub auth_expired_code: i64,
    pub sse_framing: Framing,
    pub state_path: PathBuf,
    pub remember_password: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

impl ClientConfig {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "tinynote.yaml" in CWD. A missing file
    /// falls back to env vars / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let base = Self::from_yaml(Self::load_yaml(yaml_path));

        let sse_framing = match std::env::var("TINYNOTE_SSE_FRAMING") {
            Ok(raw) => raw
                .parse::<Framing>()
                .map_err(anyhow::Error::msg)
                .context("invalid TINYNOTE_SSE_FRAMING")?,
            Err(_) => base.sse_framing,
        };

        Ok(Self {
            api_base_url: std::env::var("TINYNOTE_API_URL").unwrap_or(base.api_base_url),
            chat_url: std::env::var("TINYNOTE_CHAT_URL").unwrap_or(base.chat_url),
            request_timeout: env_secs("TINYNOTE_TIMEOUT_SECS").unwrap_or(base.request_timeout),
            revalidate_interval: env_secs("TINYNOTE_REVALIDATE_SECS")
                .unwrap_or(base.revalidate_interval),
            validate_path: std::env::var("TINYNOTE_VALIDATE_PATH").unwrap_or(base.validate_path),
            auth_expired_code: base.auth_expired_code,
            sse_framing,
            state_path: std::env::var("TINYNOTE_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(base.state_path),
            remember_password: std::env::var("TINYNOTE_REMEMBER_PASSWORD")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(base.remember_password),
        })
    }

    /// Point every endpoint at another backend. The chat URL follows the
    /// API base as `<base>/ai/chat`.
    pub fn with_server(mut self, api_base_url: &str) -> Self {
        let base = api_base_url.trim_end_matches('/');
        self.chat_url = format!("{}/ai/chat", base);
        self.api_base_url = base.to_string();
        self
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            api_base_url: yaml.api.base_url,
            chat_url: yaml.api.chat_url,
            request_timeout: Duration::from_secs(yaml.api.timeout_secs.max(1)),
            revalidate_interval: Duration::from_secs(yaml.session.revalidate_secs.max(1)),
            validate_path: yaml.api.validate_path,
            auth_expired_code: yaml.api.auth_expired_code,
            sse_framing: yaml.chat.sse_framing,
            state_path: yaml.session.state_path.unwrap_or_else(default_state_path),
            remember_password: yaml.session.remember_password,
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("tinynote.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// `<data_dir>/tinynote/session.json`, or `./session.json` without a data dir
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tinynote"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("session.json")
}

fn env_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
