//! Request bodies for both completion endpoints

use serde::{Deserialize, Serialize};

use crate::config::GenerationDefaults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message
{   pub role: Role
  , pub content: String
}

impl Message
{   pub fn new(role: Role, content: impl Into<String>) -> Self
    {   Message
        {   role
          , content: content.into()
        }
    }

    pub fn system(content: impl Into<String>) -> Self
    {   Message::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self
    {   Message::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Message::new(Role::Assistant, content)
    }
}

/// Body for the chat-style endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt
{   pub messages: Vec<Message>
  , pub max_tokens: u32
  , pub temperature: f64
  , pub n: u32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>
}

impl ChatPrompt
{   /// Build the body from a conversation history.
    /// An empty history is passed through; the caller validates it.
    pub fn from_history(
      history: Vec<Message>
    , defaults: &GenerationDefaults
    ) -> Self
    {   ChatPrompt
        {   messages: history
          , max_tokens: defaults.max_tokens
          , temperature: defaults.temperature
          , n: defaults.n
          , stop: defaults.stop.clone()
        }
    }
}

/// Body for the single-prompt endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPrompt
{   pub prompt: String
  , pub max_tokens: u32
  , pub temperature: f64
  , pub n: u32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>
}

impl TextPrompt
{   pub fn from_text(
      prompt: impl Into<String>
    , defaults: &GenerationDefaults
    ) -> Self
    {   TextPrompt
        {   prompt: prompt.into()
          , max_tokens: defaults.max_tokens
          , temperature: defaults.temperature
          , n: defaults.n
          , stop: defaults.stop.clone()
        }
    }
}

/// Caller input, routed to the matching endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt
{   Conversation(Vec<Message>)
  , Text(String)
}

impl From<Vec<Message>> for Prompt
{   fn from(history: Vec<Message>) -> Self
    {   Prompt::Conversation(history)
    }
}

impl From<String> for Prompt
{   fn from(text: String) -> Self
    {   Prompt::Text(text)
    }
}

impl From<&str> for Prompt
{   fn from(text: &str) -> Self
    {   Prompt::Text(text.to_string())
    }
}
