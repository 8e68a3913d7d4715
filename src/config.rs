//! Client configuration for the inference server

use serde::{Deserialize, Serialize};
use log::debug;

/// Ollama generate endpoint on the local machine
pub const DEFAULT_ENDPOINT: &str
  = "http://localhost:11434/api/generate";

/// Model requested when none is given
pub const DEFAULT_MODEL: &str = "llama3.2:8b";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig
{   /// Full URL of the generate endpoint
    pub endpoint: String
  , /// Model name sent with every request
    pub model: String
  , /// Request timeout in seconds, `None` waits forever
    pub timeout_secs: Option<u64>
  , /// Log request and response bodies at debug level
    pub verbose: bool
}

impl Default for ClientConfig
{   fn default() -> Self
    {   ClientConfig
        {   endpoint: DEFAULT_ENDPOINT.to_string()
          , model: DEFAULT_MODEL.to_string()
          , timeout_secs: None
          , verbose: false
        }
    }
}

impl ClientConfig
{   /// Default configuration pointed at another endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self
    {   ClientConfig
        {   endpoint: endpoint.into()
          , ..ClientConfig::default()
        }
    }

    /// Check the configuration before building a client
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   debug!("Validating config for endpoint: {}", self.endpoint);

        let url = reqwest::Url::parse(&self.endpoint)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("endpoint '{}': {}", self.endpoint, e)
            )
          })?;

        if url.scheme() != "http" && url.scheme() != "https"
        {   return Err(crate::error::Error::InvalidConfiguration(
              format!("unsupported scheme: {}", url.scheme())
            ));
        }

        if self.model.trim().is_empty()
        {   return Err(crate::error::Error::InvalidConfiguration(
              "model name is empty".to_string()
            ));
        }

        if self.timeout_secs == Some(0)
        {   return Err(crate::error::Error::InvalidConfiguration(
              "timeout must be greater than zero".to_string()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::error::Error;

    #[test]
    fn default_points_at_local_ollama()
    {   let config = ClientConfig::default();
        assert_eq!(config.endpoint, "http://localhost:11434/api/generate");
        assert_eq!(config.model, "llama3.2:8b");
        assert_eq!(config.timeout_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_relative_endpoint()
    {   let config = ClientConfig::with_endpoint("/api/generate");
        assert!(matches!(
          config.validate(),
          Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_non_http_scheme()
    {   let config = ClientConfig::with_endpoint("ftp://localhost/x");
        assert!(matches!(
          config.validate(),
          Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_blank_model_and_zero_timeout()
    {   let blank = ClientConfig
        {   model: "  ".to_string()
          , ..ClientConfig::default()
        };
        assert!(blank.validate().is_err());

        let zero = ClientConfig
        {   timeout_secs: Some(0)
          , ..ClientConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults()
    {   let config: ClientConfig
          = serde_json::from_str(r#"{"model":"qwen2:7b"}"#).unwrap();
        assert_eq!(config.model, "qwen2:7b");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }
}
