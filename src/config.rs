//! Configuration loaded from the environment.
//!
//! - `LLM_API_KEY` - Required. API key for the OpenAI-compatible endpoint.
//! - `LLM_MODEL` - Optional. Model name. Defaults to `gpt-4`.
//! - `LLM_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `BRAVE_API_KEY` - Required. Brave Search subscription token.
//!
//! The binary seeds the environment from a local `.env` file before calling
//! [`Settings::from_env`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::agent::AgentDependencies;

pub const DEFAULT_LLM_MODEL: &str = "gpt-4";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),
}

#[derive(Clone)]
pub struct Settings {
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
    pub brave_api_key: String,
}

/// LLM configuration that is safe to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub llm_model: String,
    pub llm_base_url: String,
}

impl Settings {
    /// Load settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LLM_API_KEY` or `BRAVE_API_KEY` is unset
    /// or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let llm_api_key = required(&lookup, "LLM_API_KEY")?;
        let llm_model = optional(&lookup, "LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into());
        let llm_base_url =
            optional(&lookup, "LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.into());
        let brave_api_key = required(&lookup, "BRAVE_API_KEY")?;

        Ok(Self {
            llm_api_key,
            llm_model,
            llm_base_url,
            brave_api_key,
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            llm_model: self.llm_model.clone(),
            llm_base_url: self.llm_base_url.clone(),
        }
    }

    /// Build the per-run dependency bag for the research agent.
    pub fn dependencies(&self, session_id: Option<String>) -> AgentDependencies {
        AgentDependencies {
            api_key: self.brave_api_key.clone(),
            session_id,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("llm_api_key", &"<redacted>")
            .field("llm_model", &self.llm_model)
            .field("llm_base_url", &self.llm_base_url)
            .field("brave_api_key", &"<redacted>")
            .finish()
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or(ConfigError::MissingEnvVar(key))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key));
    }
    Ok(value.to_string())
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
