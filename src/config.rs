//! Configuration for completion endpoints and retry behavior

use serde::{Deserialize, Serialize};
use log::{debug, error};

use crate::error::Error;
use crate::retry::RetryPolicy;

/// Identifying string sent as `user-agent` on the prompt endpoint
pub const DEFAULT_USER_AGENT: &str
  = concat!("textcomp/", env!("CARGO_PKG_VERSION"));

/// Generation parameters applied to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults
{   /// Max tokens to generate
    pub max_tokens: u32
  , /// Temperature for sampling
    pub temperature: f64
  , /// Number of samples
    pub n: u32
  , /// Optional stop sequence
    #[serde(default)]
    pub stop: Option<String>
}

impl Default for GenerationDefaults
{   fn default() -> Self
    {   GenerationDefaults
        {   max_tokens: 1000
          , temperature: 0.3
          , n: 1
          , stop: None
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig
{   /// Chat-style endpoint URI
    #[serde(default)]
    pub chat_uri: Option<String>
  , /// Single-prompt endpoint URI
    #[serde(default)]
    pub prompt_uri: Option<String>
  , /// Key sent as `api-key` on the prompt endpoint
    #[serde(default)]
    pub api_key: Option<String>
  , #[serde(default = "default_user_agent")]
    pub user_agent: String
  , /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>
  , #[serde(default)]
    pub retry: RetryPolicy
  , #[serde(default)]
    pub defaults: GenerationDefaults
}

fn default_user_agent() -> String
{   DEFAULT_USER_AGENT.to_string()
}

impl Default for ClientConfig
{   fn default() -> Self
    {   ClientConfig
        {   chat_uri: None
          , prompt_uri: None
          , api_key: None
          , user_agent: default_user_agent()
          , timeout_secs: None
          , retry: RetryPolicy::default()
          , defaults: GenerationDefaults::default()
        }
    }
}

impl ClientConfig
{   /// Load configuration from a JSON file
    pub fn from_json_file(
      path: impl AsRef<std::path::Path>
    ) -> Result<Self, Error>
    {   let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
          error!("Failed to read config: {}", e);
          Error::InvalidConfiguration(
            format!("{}: {}", path.display(), e)
          )
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(raw: &str) -> Result<Self, Error>
    {   let config: ClientConfig
          = serde_json::from_str(raw).map_err(|e| {
            error!("Config parse error: {}", e);
            Error::InvalidConfiguration(e.to_string())
          })?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `TEXTCOMP_*` environment variables
    pub fn from_env() -> Result<Self, Error>
    {   let mut config = ClientConfig::default();
        config.chat_uri = std::env::var("TEXTCOMP_CHAT_URI").ok();
        config.prompt_uri
          = std::env::var("TEXTCOMP_PROMPT_URI").ok();
        config.api_key = std::env::var("TEXTCOMP_API_KEY").ok();
        if let Ok(agent) = std::env::var("TEXTCOMP_USER_AGENT")
        {   config.user_agent = agent;
        }
        if let Ok(raw) = std::env::var("TEXTCOMP_TIMEOUT_SECS")
        {   let secs = raw.trim().parse::<u64>().map_err(|_| {
              Error::InvalidConfiguration(format!(
                "TEXTCOMP_TIMEOUT_SECS is not a number: {}", raw
              ))
            })?;
            config.timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values no request can be built from
    pub fn validate(&self) -> Result<(), Error>
    {   let d = &self.defaults;
        if d.max_tokens == 0
        {   return Err(Error::InvalidConfiguration(
              "max_tokens must be positive".to_string()
            ));
        }
        if !d.temperature.is_finite() || d.temperature < 0.0
        {   return Err(Error::InvalidConfiguration(format!(
              "temperature must be non-negative, got {}",
              d.temperature
            )));
        }
        if d.n == 0
        {   return Err(Error::InvalidConfiguration(
              "n must be positive".to_string()
            ));
        }
        if self.retry.max_attempts == 0
        {   return Err(Error::InvalidConfiguration(
              "max_attempts must be positive".to_string()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn defaults_match_call_contract()
    {   let config = ClientConfig::default();
        assert_eq!(config.defaults.max_tokens, 1000);
        assert_eq!(config.defaults.temperature, 0.3);
        assert_eq!(config.defaults.n, 1);
        assert!(config.defaults.stop.is_none());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.default_delay_secs, 2);
        assert_ok!(config.validate());
    }

    #[test]
    fn json_fills_missing_fields()
    {   let config = assert_ok!(ClientConfig::from_json_str(
          r#"{"prompt_uri": "http://localhost/v1/completions",
              "api_key": "k"}"#
        ));
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn zero_max_tokens_rejected()
    {   let err = ClientConfig::from_json_str(
          r#"{"defaults": {"max_tokens": 0, "temperature": 0.3,
              "n": 1}}"#
        ).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn negative_temperature_rejected()
    {   let mut config = ClientConfig::default();
        config.defaults.temperature = -0.1;
        assert_err!(config.validate());
    }

    #[test]
    fn zero_attempts_rejected()
    {   let mut config = ClientConfig::default();
        config.retry.max_attempts = 0;
        assert_err!(config.validate());
    }
}
