//! Notifier configuration.
//!
//! The webhook URL can be given directly or resolved from an environment
//! variable (`LARK_WEBHOOK_URL` by default), so deployments can keep the
//! secret URL out of config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level notifier configuration: which backend, and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Backend name ("lark" is the only backend today)
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub lark: LarkConfig,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            lark: LarkConfig::default(),
        }
    }
}

fn default_backend() -> String {
    "lark".to_string()
}

/// Settings for the Lark webhook backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LarkConfig {
    /// Explicit webhook URL; takes precedence over the env var
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Environment variable consulted when `webhook_url` is absent
    #[serde(default = "default_webhook_url_env")]
    pub webhook_url_env: String,

    /// HTTP client timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LarkConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_url_env: default_webhook_url_env(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_webhook_url_env() -> String {
    "LARK_WEBHOOK_URL".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl LarkConfig {
    /// Resolve the webhook URL from config or environment.
    pub fn resolve_webhook_url(&self) -> Result<String> {
        if let Some(url) = self.webhook_url.as_deref().filter(|s| !s.is_empty()) {
            return Ok(url.to_string());
        }
        std::env::var(&self.webhook_url_env).with_context(|| {
            format!(
                "Lark notifier requires {} environment variable to be set",
                self.webhook_url_env
            )
        })
    }

    /// Timeout with a lower bound applied.
    pub fn effective_timeout_seconds(&self) -> u64 {
        const MIN_TIMEOUT_SECONDS: u64 = 1;
        if self.timeout_seconds < MIN_TIMEOUT_SECONDS {
            warn!(
                "Configured timeout_seconds={} is too low; using minimum of {} seconds",
                self.timeout_seconds, MIN_TIMEOUT_SECONDS
            );
            MIN_TIMEOUT_SECONDS
        } else {
            self.timeout_seconds
        }
    }
}
