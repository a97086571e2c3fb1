//! Endpoint shapes: the encode/decode pair the retry loop is generic over

use serde::Serialize;
use serde::de::DeserializeOwned;
use log::{debug, error};
use reqwest::header::{
  HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT
};

use crate::error::Error;
use crate::request::{ChatPrompt, TextPrompt};
use crate::response::{
  parse_outcome, ChatChoice, ChoiceContent, Outcome, TextChoice
};
use crate::retry::RetryPolicy;
use crate::transport::HttpRequest;

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Wire shape and resiliency policy of one completion endpoint
pub trait Endpoint: Send + Sync
{   type Body: Serialize + Send + Sync;
    type Choice: DeserializeOwned + ChoiceContent;

    /// Short label used in diagnostics
    fn name(&self) -> &'static str;
    fn uri(&self) -> &str;
    fn headers(&self) -> &HeaderMap;
    fn policy(&self) -> RetryPolicy;

    fn encode(&self, body: &Self::Body) -> Result<HttpRequest, Error>
    {   let bytes = serde_json::to_vec(body).map_err(|e| {
          error!("Failed to encode {} request: {}", self.name(), e);
          Error::Other(e.to_string())
        })?;
        debug!("Encoded {} request, {} bytes", self.name(), bytes.len());
        Ok(HttpRequest
        {   uri: self.uri().to_string()
          , headers: self.headers().clone()
          , body: bytes
        })
    }

    fn decode(&self, body: &[u8]) -> Result<Outcome, Error>
    {   parse_outcome::<Self::Choice>(body)
    }
}

/// Conversation endpoint. Sends once, never retries.
#[derive(Debug, Clone)]
pub struct ChatEndpoint
{   uri: String
  , headers: HeaderMap
}

impl ChatEndpoint
{   pub fn new(uri: impl Into<String>) -> Self
    {   let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        ChatEndpoint
        {   uri: uri.into()
          , headers
        }
    }
}

impl Endpoint for ChatEndpoint
{   type Body = ChatPrompt;
    type Choice = ChatChoice;

    fn name(&self) -> &'static str
    {   "chat"
    }

    fn uri(&self) -> &str
    {   &self.uri
    }

    fn headers(&self) -> &HeaderMap
    {   &self.headers
    }

    fn policy(&self) -> RetryPolicy
    {   RetryPolicy::single_attempt()
    }
}

/// Single-prompt endpoint with rate-limit backoff
#[derive(Debug, Clone)]
pub struct PromptEndpoint
{   uri: String
  , headers: HeaderMap
  , policy: RetryPolicy
}

impl PromptEndpoint
{   pub fn new(
      uri: impl Into<String>
    , api_key: &str
    , user_agent: &str
    , policy: RetryPolicy
    ) -> Result<Self, Error>
    {   let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        headers.insert(
          HeaderName::from_static("api-key"),
          header_value("api-key", api_key)?
        );
        headers.insert(USER_AGENT, header_value("user-agent", user_agent)?);
        Ok(PromptEndpoint
        {   uri: uri.into()
          , headers
          , policy
        })
    }
}

impl Endpoint for PromptEndpoint
{   type Body = TextPrompt;
    type Choice = TextChoice;

    fn name(&self) -> &'static str
    {   "prompt"
    }

    fn uri(&self) -> &str
    {   &self.uri
    }

    fn headers(&self) -> &HeaderMap
    {   &self.headers
    }

    fn policy(&self) -> RetryPolicy
    {   self.policy.clone()
    }
}

fn header_value(name: &str, value: &str)
  -> Result<HeaderValue, Error>
{   HeaderValue::from_str(value).map_err(|_| {
      Error::InvalidConfiguration(
        format!("{} is not a valid header value", name)
      )
    })
}
