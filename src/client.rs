use std::time::Duration;
use tokio::sync::mpsc;
use log::{debug, trace, error, info, warn};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::request::{
  compose_prompt, decode_chunk, GenerateRequest, LineBuffer, TokenData
};

/// HTTP client for the Ollama generate endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient
{   config: ClientConfig
  , http_client: reqwest::Client
}

impl OllamaClient
{   /// Validate the configuration and build the HTTP client
    pub fn new(config: ClientConfig) -> Result<Self, Error>
    {   config.validate()?;
        debug!(
          "Creating OllamaClient for {} (model {})",
          config.endpoint, config.model
        );

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs
        {   builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          Error::InvalidConfiguration(e.to_string())
        })?;

        Ok(OllamaClient
        {   config
          , http_client
        })
    }

    pub fn config(&self) -> &ClientConfig
    {   &self.config
    }

    /// Body logging enabled by `verbose`
    fn log_body(&self, kind: &str, body: &str)
    {   if self.config.verbose
        {   debug!("{} body: {}", kind, body);
        }
    }

    /// POST a request, turning non-success statuses into errors
    async fn post(
      &self
    , request: &GenerateRequest
    ) -> Result<reqwest::Response, Error>
    {   trace!("Generate request: {:?}", request);
        if self.config.verbose
        {   self.log_body("Request", &serde_json::to_string(request)?);
        }

        let response = self.http_client
          .post(&self.config.endpoint)
          .header("Content-Type", "application/json")
          .json(request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            Error::from(e)
          })?;

        let status = response.status();
        trace!("Generate response status: {}", status);

        if !status.is_success()
        {   let body = match response.text().await
            {   Ok(text) => text.trim().to_string()
              , Err(e) => {
                  warn!("Could not read error body: {}", e);
                  String::new()
                }
            };
            error!("Ollama error body: {}", body);
            return Err(Error::StatusError
            {   status: status.as_u16()
              , body
            });
        }

        Ok(response)
    }

    /// Send a prompt and return the decoded JSON response
    pub async fn send(&self, prompt: &str) -> Result<Value, Error>
    {   debug!("Sending prompt to model: {}", self.config.model);
        let request = GenerateRequest::new(
          self.config.model.as_str(),
          prompt
        );

        let response = self.post(&request).await?;
        let text = response.text().await.map_err(|e| {
          error!("Failed to read response body: {}", e);
          Error::from(e)
        })?;

        self.log_body("Response", &text);

        serde_json::from_str(&text).map_err(|e| {
          error!("Parse error: {}", e);
          Error::ParseError(e.to_string())
        })
    }

    /// Stream a generation, sending each token on `reply`.
    ///
    /// Returns the number of tokens delivered. Stops early, without
    /// error, if the receiver goes away.
    pub async fn generate_stream(
      &self
    , prompt: &str
    , reply: mpsc::UnboundedSender<TokenData>
    ) -> Result<usize, Error>
    {   debug!("Streaming prompt to model: {}", self.config.model);
        let request = GenerateRequest::streaming(
          self.config.model.as_str(),
          prompt
        );

        let mut response = self.post(&request).await?;
        let mut buffer = LineBuffer::new();
        let mut delivered = 0usize;

        loop
        {   let bytes = response.chunk().await.map_err(|e| {
              error!("Stream read error: {}", e);
              Error::from(e)
            })?;

            let (lines, at_end) = match bytes
            {   Some(bytes) => (buffer.push(&bytes), false)
              , None => (buffer.finish().into_iter().collect(), true)
            };

            for line in lines
            {   let chunk = decode_chunk(&line);
                if reply.send(TokenData::new(chunk.response)).is_err()
                {   info!("Token receiver dropped, stopping stream");
                    return Ok(delivered);
                }
                delivered += 1;

                if chunk.done
                {   debug!("Stream done after {} tokens", delivered);
                    return Ok(delivered);
                }
            }

            if at_end
            {   debug!("Stream body ended after {} tokens", delivered);
                return Ok(delivered);
            }
        }
    }

    /// Stream an answer to `prompt` in the context of earlier lines
    pub async fn ask(
      &self
    , prompt: &str
    , history: &[String]
    , reply: mpsc::UnboundedSender<TokenData>
    ) -> Result<usize, Error>
    {   debug!("ask with {} history lines", history.len());
        let full_prompt = compose_prompt(history, prompt);
        self.generate_stream(&full_prompt, reply).await
    }
}

/// Print the failure diagnostic shown to users
pub fn report_failure(err: &Error)
{   error!("Request failed: {}", err);
    println!("An error occurred: {}", err);
}

/// Text printed by the CLI for a successful response
pub fn render_response(value: &Value) -> Result<String, Error>
{   let pretty = serde_json::to_string_pretty(value)?;
    Ok(format!("Response from ollama:\n{}", pretty))
}

/// Send a prompt with `client`, returning `None` on any failure
pub async fn send_request_with(
  client: &OllamaClient
, prompt: &str
) -> Option<Value>
{   match client.send(prompt).await
    {   Ok(value) => Some(value)
      , Err(e) => {
          report_failure(&e);
          None
        }
    }
}

/// Send a prompt with the given configuration, `None` on failure
pub async fn send_request_with_config(
  config: ClientConfig
, prompt: &str
) -> Option<Value>
{   match OllamaClient::new(config)
    {   Ok(client) => send_request_with(&client, prompt).await
      , Err(e) => {
          report_failure(&e);
          None
        }
    }
}

/// Send a prompt to the local Ollama server with the default model
pub async fn send_request_to_ollama(prompt: &str) -> Option<Value>
{   send_request_with_config(ClientConfig::default(), prompt).await
}

/// Blocking variant of [`send_request_with_config`].
///
/// Runs on a private current-thread runtime, so it must not be
/// called from inside a tokio runtime.
pub fn send_request_blocking_with(
  config: ClientConfig
, prompt: &str
) -> Option<Value>
{   let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build();
    match runtime
    {   Ok(runtime) => runtime.block_on(
          send_request_with_config(config, prompt)
        )
      , Err(e) => {
          report_failure(&Error::Other(
            format!("failed to start runtime: {}", e)
          ));
          None
        }
    }
}

/// Blocking variant of [`send_request_to_ollama`]
pub fn send_request_blocking(prompt: &str) -> Option<Value>
{   send_request_blocking_with(ClientConfig::default(), prompt)
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct CaptureLogger;

    static RECORDS: Mutex<Vec<(log::Level, String)>> = Mutex::new(vec![]);
    static LOGGER: CaptureLogger = CaptureLogger;

    impl log::Log for CaptureLogger
    {   fn enabled(&self, _: &log::Metadata) -> bool
        {   true
        }

        fn log(&self, record: &log::Record)
        {   RECORDS.lock().unwrap().push(
              (record.level(), record.args().to_string())
            );
        }

        fn flush(&self) {}
    }

    #[tokio::test]
    async fn verbose_logs_bodies_at_debug()
    {   let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);

        let quiet = OllamaClient::new(ClientConfig::default()).unwrap();
        quiet.log_body("Response", "quiet-marker");

        let loud = OllamaClient::new(ClientConfig
        {   verbose: true
          , ..ClientConfig::default()
        }).unwrap();
        loud.log_body("Response", "loud-marker");

        let records = RECORDS.lock().unwrap();
        assert!(!records.iter().any(|(_, m)| m.contains("quiet-marker")));
        assert!(records.iter().any(|(level, m)| {
          *level == log::Level::Debug
            && m == "Response body: loud-marker"
        }));
    }

    #[test]
    fn render_response_pretty_prints_with_two_spaces()
    {   let value = json!({
          "context": [1, 2],
          "details": { "done": true },
          "model": "llama3.2:8b"
        });
        let expected = "Response from ollama:\n\
{\n  \"context\": [\n    1,\n    2\n  ],\n  \"details\": {\n    \"done\": true\n  },\n  \"model\": \"llama3.2:8b\"\n}";
        assert_eq!(render_response(&value).unwrap(), expected);
    }
}
