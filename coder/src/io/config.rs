//! Coder configuration stored under `<ROOT>/.coder/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// What happens when a tool fails after it was decoded successfully.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolErrorPolicy {
    /// Propagate the error and end the run.
    #[default]
    Fail,
    /// Hand the error text to the model as the tool result and keep going.
    Report,
}

/// Coder configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoderConfig {
    pub model: String,

    /// Full URL of an OpenAI-compatible chat completions endpoint.
    pub endpoint: String,

    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the file.
    pub api_key_env: String,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Per-request timeout. Unset waits indefinitely.
    pub request_timeout_secs: Option<u64>,

    /// Extra ignore patterns added to the defaults.
    pub ignore: Vec<String>,

    pub tool_errors: ToolErrorPolicy,

    /// Consecutive tool rounds allowed inside a single user turn.
    pub max_tool_rounds: u32,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout_secs: None,
            ignore: Vec::new(),
            tool_errors: ToolErrorPolicy::default(),
            max_tool_rounds: 50,
        }
    }
}

impl CoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(anyhow!("endpoint must be an http(s) URL"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("api_key_env must be non-empty"));
        }
        if self
            .temperature
            .is_some_and(|temperature| !(0.0..=2.0).contains(&temperature))
        {
            return Err(anyhow!("temperature must be within 0.0..=2.0"));
        }
        if self.max_tokens == Some(0) {
            return Err(anyhow!("max_tokens must be > 0"));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.max_tool_rounds == 0 {
            return Err(anyhow!("max_tool_rounds must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CoderConfig::default()`.
pub fn load_config(path: &Path) -> Result<CoderConfig> {
    if !path.exists() {
        return Ok(CoderConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CoderConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
