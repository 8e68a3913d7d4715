pub mod error;
pub mod config;
pub mod request;
pub mod client;
pub mod session;

/*

ollama-send: send a prompt to a locally running Ollama server
and hand back the JSON it answers with.

ollama-send/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports
│   ├── main.rs         # CLI
│   ├── error.rs        # Error type
│   ├── config.rs       # Endpoint, model, timeout
│   ├── request.rs      # Wire types, prompt composition, stream lines
│   ├── client.rs       # HTTP client and the Option/blocking surface
│   └── session.rs      # Role-based chat sessions with history
└── tests/              # Integration tests against a mock server

*/

pub use client::{
  render_response
, report_failure
, send_request_blocking
, send_request_blocking_with
, send_request_to_ollama
, send_request_with
, send_request_with_config
, OllamaClient
};
pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::Error;
pub use request::{compose_prompt, GenerateRequest, TokenData};
pub use session::{ChatMessage, ChatSession};

/// Prompt sent by the CLI when none is given
pub const DEMO_PROMPT: &str = "Hello, how are you?";
