//! Environment-driven configuration

use crate::system_prompt::build_system_prompt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Process-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AetherConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub gateway: Option<String>,
    /// `None` disables the per-exchange timeout
    pub exchange_timeout: Option<Duration>,
}

impl AetherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let exchange_timeout = match var("AETHER_EXCHANGE_TIMEOUT_SECS") {
            None => Some(DEFAULT_EXCHANGE_TIMEOUT),
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidTimeout {
                    var: "AETHER_EXCHANGE_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        Ok(Self {
            api_key: var("GEMINI_API_KEY").or_else(|| var("API_KEY")),
            model: var("AETHER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gateway: var("LLM_GATEWAY"),
            exchange_timeout,
        })
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            exchange_timeout: self.exchange_timeout,
            ..SessionConfig::default()
        }
    }
}

/// What a session needs to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub system_instruction: String,
    pub exchange_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_instruction: build_system_prompt(),
            exchange_timeout: Some(DEFAULT_EXCHANGE_TIMEOUT),
        }
    }
}
