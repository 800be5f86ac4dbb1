use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::prompt::Variant;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatConfig {
    #[serde(default)]
    pub variant: Variant,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_base_url")]
    pub base_url: String,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_retrieval_base_url(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

fn default_retrieval_base_url() -> String {
    "https://api.cloud.llamaindex.ai".to_string()
}
fn default_retrieval_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_model(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_model() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_idle_secs: default_session_idle_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}
fn default_reap_interval_secs() -> u64 {
    60
}

impl Config {
    /// Built-in defaults, used when no config file exists at the default path.
    pub fn minimal() -> Self {
        Self {
            chat: ChatConfig::default(),
            retrieval: RetrievalConfig::default(),
            completion: CompletionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Process-wide secrets, read once at startup.
///
/// `app_password` is the shared string for the session visibility gate
/// (see [`crate::gate`]). It is not a credential in any meaningful sense.
#[derive(Clone)]
pub struct Secrets {
    pub retrieval_api_key: String,
    pub completion_api_key: String,
    pub pipeline_id: String,
    pub app_password: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("retrieval_api_key", &"<redacted>")
            .field("completion_api_key", &"<redacted>")
            .field("pipeline_id", &self.pipeline_id)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub const RETRIEVAL_API_KEY_VAR: &str = "LLAMACLOUD_API_KEY";
pub const COMPLETION_API_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const PIPELINE_ID_VAR: &str = "PIPELINE_ID";
pub const APP_PASSWORD_VAR: &str = "APP_PASSWORD";

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through an arbitrary lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("{} environment variable not set", name))
        };

        Ok(Self {
            retrieval_api_key: require(RETRIEVAL_API_KEY_VAR)?,
            completion_api_key: require(COMPLETION_API_KEY_VAR)?,
            pipeline_id: require(PIPELINE_ID_VAR)?,
            app_password: get(APP_PASSWORD_VAR),
        })
    }
}

/// Load and validate the config file.
///
/// When `allow_missing` is set and the file does not exist, the built-in
/// defaults are returned instead.
pub fn load_config(path: &Path, allow_missing: bool) -> Result<Config> {
    if allow_missing && !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// 30 days.
pub const MAX_SESSION_IDLE_SECS: u64 = 30 * 24 * 60 * 60;
/// 1 day.
pub const MAX_REAP_INTERVAL_SECS: u64 = 24 * 60 * 60;

fn validate(config: &Config) -> Result<()> {
    for (key, url) in [
        ("retrieval.base_url", &config.retrieval.base_url),
        ("completion.base_url", &config.completion.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("{} must start with http:// or https://, got '{}'", key, url);
        }
    }

    if config.retrieval.timeout_secs == 0 {
        bail!("retrieval.timeout_secs must be > 0");
    }
    if config.completion.timeout_secs == 0 {
        bail!("completion.timeout_secs must be > 0");
    }
    if config.completion.model.trim().is_empty() {
        bail!("completion.model must not be empty");
    }
    if !(1..=MAX_SESSION_IDLE_SECS).contains(&config.server.session_idle_secs) {
        bail!(
            "server.session_idle_secs must be in [1, {}]",
            MAX_SESSION_IDLE_SECS
        );
    }
    if !(1..=MAX_REAP_INTERVAL_SECS).contains(&config.server.reap_interval_secs) {
        bail!(
            "server.reap_interval_secs must be in [1, {}]",
            MAX_REAP_INTERVAL_SECS
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.chat.variant, Variant::Strict);
        assert_eq!(cfg.completion.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(cfg.completion.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.server.bind, "127.0.0.1:8501");
    }

    #[test]
    fn simple_variant_parses() {
        let cfg = parse("[chat]\nvariant = \"simple\"\n").unwrap();
        assert_eq!(cfg.chat.variant, Variant::Simple);
    }

    #[test]
    fn unknown_variant_rejected() {
        assert!(parse("[chat]\nvariant = \"loose\"\n").is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = parse("[completion]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("completion.timeout_secs"));
    }

    #[test]
    fn bad_base_url_rejected() {
        let err = parse("[retrieval]\nbase_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(err.to_string().contains("retrieval.base_url"));
    }

    #[test]
    fn blank_model_rejected() {
        assert!(parse("[completion]\nmodel = \"  \"\n").is_err());
    }

    #[test]
    fn session_idle_secs_capped() {
        assert!(parse("[server]\nsession_idle_secs = 2592000\n").is_ok());
        let err = parse("[server]\nsession_idle_secs = 2592001\n").unwrap_err();
        assert!(err.to_string().contains("server.session_idle_secs"));
        assert!(parse("[server]\nsession_idle_secs = 1000000000000000\n").is_err());
        assert!(parse("[server]\nsession_idle_secs = 0\n").is_err());
    }

    #[test]
    fn reap_interval_capped() {
        assert!(parse("[server]\nreap_interval_secs = 86400\n").is_ok());
        let err = parse("[server]\nreap_interval_secs = 86401\n").unwrap_err();
        assert!(err.to_string().contains("server.reap_interval_secs"));
    }

    #[test]
    fn missing_default_file_falls_back() {
        let cfg = load_config(Path::new("/nonexistent/aa-chat.toml"), true).unwrap();
        assert_eq!(cfg.server.session_idle_secs, 3600);
    }

    #[test]
    fn missing_explicit_file_is_error() {
        assert!(load_config(Path::new("/nonexistent/aa-chat.toml"), false).is_err());
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn secrets_require_all_three() {
        let vars = env(&[
            (RETRIEVAL_API_KEY_VAR, "llx-key"),
            (COMPLETION_API_KEY_VAR, "sk-or-key"),
        ]);
        let err = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(PIPELINE_ID_VAR));
    }

    #[test]
    fn secrets_password_optional() {
        let vars = env(&[
            (RETRIEVAL_API_KEY_VAR, "llx-key"),
            (COMPLETION_API_KEY_VAR, "sk-or-key"),
            (PIPELINE_ID_VAR, "pipe-1"),
        ]);
        let secrets = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(secrets.pipeline_id, "pipe-1");
        assert!(secrets.app_password.is_none());
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let vars = env(&[
            (RETRIEVAL_API_KEY_VAR, "   "),
            (COMPLETION_API_KEY_VAR, "sk-or-key"),
            (PIPELINE_ID_VAR, "pipe-1"),
        ]);
        let err = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(RETRIEVAL_API_KEY_VAR));
    }

    #[test]
    fn secrets_debug_redacts_keys() {
        let vars = env(&[
            (RETRIEVAL_API_KEY_VAR, "llx-key"),
            (COMPLETION_API_KEY_VAR, "sk-or-key"),
            (PIPELINE_ID_VAR, "pipe-1"),
            (APP_PASSWORD_VAR, "hunter2"),
        ]);
        let secrets = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let dbg = format!("{:?}", secrets);
        assert!(!dbg.contains("llx-key"));
        assert!(!dbg.contains("sk-or-key"));
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("pipe-1"));
    }
}
