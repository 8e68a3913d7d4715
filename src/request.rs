//! Wire types for the generate endpoint

use serde::{Deserialize, Serialize};
use log::{trace, warn};
use std::time::{SystemTime, UNIX_EPOCH};

/// Body of a generate request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest
{   pub model: String
  , pub prompt: String
  , pub stream: bool
}

impl GenerateRequest
{   /// Single-shot request, the server answers with one JSON object
    pub fn new(
      model: impl Into<String>
    , prompt: impl Into<String>
    ) -> Self
    {   GenerateRequest
        {   model: model.into()
          , prompt: prompt.into()
          , stream: false
        }
    }

    /// Streamed request, the server answers with one JSON object per line
    pub fn streaming(
      model: impl Into<String>
    , prompt: impl Into<String>
    ) -> Self
    {   GenerateRequest
        {   stream: true
          , ..GenerateRequest::new(model, prompt)
        }
    }
}

/// One line of a streamed generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk
{   #[serde(default)]
    pub response: String
  , #[serde(default)]
    pub done: bool
}

/// A token received from a streamed generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData
{   pub token: String
  , /// Milliseconds since the Unix epoch when the token arrived
    pub timestamp_ms: u128
}

impl TokenData
{   pub fn new(token: impl Into<String>) -> Self
    {   let timestamp_ms = SystemTime::now()
          .duration_since(UNIX_EPOCH)
          .map(|d| d.as_millis())
          .unwrap_or(0);
        TokenData
        {   token: token.into()
          , timestamp_ms
        }
    }
}

impl std::fmt::Display for TokenData
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   write!(f, "[{}] {}", self.timestamp_ms, self.token)
    }
}

/// Build a conversation prompt from earlier lines and the new question
pub fn compose_prompt(history: &[String], prompt: &str) -> String
{   let mut full = String::new();
    for line in history
    {   full.push_str(line);
        full.push('\n');
    }
    full.push_str("You: ");
    full.push_str(prompt);
    full.push('\n');
    full
}

/// Decode one streamed line. A malformed line yields an empty chunk.
pub fn decode_chunk(line: &str) -> StreamChunk
{   match serde_json::from_str::<StreamChunk>(line)
    {   Ok(chunk) => {
          trace!("Decoded chunk, done = {}", chunk.done);
          chunk
        }
      , Err(e) => {
          warn!("Malformed stream chunk ({}): {}", e, line);
          StreamChunk::default()
        }
    }
}

/// Reassembles newline-delimited lines from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct LineBuffer
{   pending: Vec<u8>
}

impl LineBuffer
{   pub fn new() -> Self
    {   LineBuffer::default()
    }

    /// Feed bytes, returning every complete non-blank line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String>
    {   self.pending.extend_from_slice(bytes);
        let mut lines = vec![];
        while let Some(pos)
          = self.pending.iter().position(|b| *b == b'\n')
        {   let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty()
            {   lines.push(trimmed.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String>
    {   let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest);
        let trimmed = text.trim();
        if trimmed.is_empty()
        {   None
        } else
        {   Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn request_body_has_exact_shape()
    {   let request = GenerateRequest::new(
          "llama3.2:8b",
          "Hello, how are you?"
        );
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
          body,
          serde_json::json!({
            "model": "llama3.2:8b",
            "prompt": "Hello, how are you?",
            "stream": false
          })
        );
    }

    #[test]
    fn streaming_request_sets_flag()
    {   let request = GenerateRequest::streaming("m", "p");
        assert!(request.stream);
        assert_eq!(request.prompt, "p");
    }

    #[test]
    fn compose_prompt_appends_history_then_question()
    {   let history = vec![
          "You: hi".to_string(),
          "Bot: hello".to_string(),
        ];
        assert_eq!(
          compose_prompt(&history, "how are you?"),
          "You: hi\nBot: hello\nYou: how are you?\n"
        );
        assert_eq!(compose_prompt(&[], "x"), "You: x\n");
    }

    #[test]
    fn malformed_chunk_becomes_empty_token()
    {   let chunk = decode_chunk("{not json");
        assert_eq!(chunk.response, "");
        assert!(!chunk.done);

        let chunk = decode_chunk(r#"{"response":"Hi","done":true}"#);
        assert_eq!(chunk.response, "Hi");
        assert!(chunk.done);
    }

    #[test]
    fn line_buffer_joins_split_lines()
    {   let mut buffer = LineBuffer::new();
        assert!(buffer.push(br#"{"response":"He"#).is_empty());
        let lines = buffer.push(b"llo\"}\n\n{\"response\":\" there\"}\n{\"do");
        assert_eq!(
          lines,
          vec![
            r#"{"response":"Hello"}"#.to_string(),
            r#"{"response":" there"}"#.to_string(),
          ]
        );
        assert_eq!(buffer.finish(), Some(r#"{"do"#.to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn token_display_has_timestamp_prefix()
    {   let token = TokenData
        {   token: "hi".to_string()
          , timestamp_ms: 42
        };
        assert_eq!(token.to_string(), "[42] hi");
    }
}
