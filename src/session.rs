//! Stateful chat sessions on top of the streaming client

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use log::{debug, error};

use crate::client::OllamaClient;
use crate::error::Error;
use crate::request::TokenData;

const ASSISTANT_PROMPT: &str
  = "You are a NetLogo coding assistant. Translate user requests \
     into valid NetLogo code and explanations.";

const TURTLE_PROMPT: &str
  = "You are a turtle in a 2D world. Always role-play as a turtle. \
     Never break character. Only output what you would say to another \
     turtle. Never mention NetLogo, code, simulation, or AI. Never \
     explain your reasoning. Never use quotation marks. Keep replies \
     to 1-2 friendly sentences.";

/// Role used when none is given
pub const DEFAULT_ROLE: &str = "turtle";

/// One role-tagged entry of a session history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

impl ChatMessage
{   pub fn new(
      role: impl Into<String>
    , content: impl Into<String>
    ) -> Self
    {   ChatMessage
        {   role: role.into()
          , content: content.into()
        }
    }
}

/// System prompt for a role; anything but `assistant` is a turtle
pub fn default_system_prompt(role: &str) -> &'static str
{   if role == "assistant"
    {   ASSISTANT_PROMPT
    } else
    {   TURTLE_PROMPT
    }
}

/// Conversation with a role, a system prompt and its full history
#[derive(Debug, Clone)]
pub struct ChatSession
{   role: String
  , system_prompt: String
  , history: Vec<ChatMessage>
}

impl ChatSession
{   /// Session using the role's default system prompt
    pub fn new(role: impl Into<String>) -> Self
    {   let role = role.into();
        let system_prompt = default_system_prompt(&role);
        ChatSession::with_system_prompt(role, system_prompt)
    }

    pub fn with_system_prompt(
      role: impl Into<String>
    , system_prompt: impl Into<String>
    ) -> Self
    {   let role = role.into();
        let system_prompt = system_prompt.into();
        debug!("Creating ChatSession with role: {}", role);
        ChatSession
        {   history: vec![
              ChatMessage::new("system", system_prompt.as_str())
            ]
          , role
          , system_prompt
        }
    }

    pub fn role(&self) -> &str
    {   &self.role
    }

    pub fn system_prompt(&self) -> &str
    {   &self.system_prompt
    }

    pub fn history(&self) -> &[ChatMessage]
    {   &self.history
    }

    /// Ask the model and return its whole reply.
    ///
    /// The earlier history is sent as context. The question and the
    /// reply are only recorded once the reply has fully arrived.
    pub async fn ask(
      &mut self
    , client: &OllamaClient
    , prompt: &str
    ) -> Result<String, Error>
    {   debug!(
          "Session ask with {} history entries",
          self.history.len()
        );
        let context: Vec<String> = self.history
          .iter()
          .map(|m| m.content.clone())
          .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<TokenData>();
        client.ask(prompt, &context, tx).await.map_err(|e| {
          error!("Session ask failed: {}", e);
          e
        })?;

        let mut reply = String::new();
        while let Some(token) = rx.recv().await
        {   reply.push_str(&token.token);
        }

        self.history.push(ChatMessage::new(self.role.as_str(), prompt));
        self.history.push(ChatMessage::new("assistant", reply.as_str()));
        Ok(reply)
    }

    /// History as `role: content` lines
    pub fn dump(&self) -> String
    {   let mut out = String::new();
        for message in &self.history
        {   out.push_str(&message.role);
            out.push_str(": ");
            out.push_str(&message.content);
            out.push('\n');
        }
        out
    }
}

impl Default for ChatSession
{   fn default() -> Self
    {   ChatSession::new(DEFAULT_ROLE)
    }
}
