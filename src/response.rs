//! Completion payloads and the parser that turns a success body into an
//! [`Outcome`].
//!
//! Both endpoints share one envelope; only the choice shape differs, so
//! [`Completion`] is generic over the choice type.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use log::{debug, error, trace};

use crate::error::Error;
use crate::request::Message;

/// Token accounting for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage
{   pub completion_tokens: u32
  , pub prompt_tokens: u32
  , pub total_tokens: u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion<C>
{   #[serde(default)]
    pub id: String
  , #[serde(default)]
    pub object: String
  , #[serde(default)]
    pub created: i64
  , #[serde(default)]
    pub model: String
  , pub choices: Vec<C>
  , pub usage: Usage
}

/// Choice returned by the chat-style endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice
{   pub index: u32
  , #[serde(default)]
    pub finish_reason: Option<String>
  , pub message: Message
}

/// Choice returned by the single-prompt endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChoice
{   pub index: u32
  , #[serde(default)]
    pub finish_reason: Option<String>
  , pub text: String
}

/// Generated content carried by a choice
pub trait ChoiceContent
{   fn content(self) -> String;
}

impl ChoiceContent for ChatChoice
{   fn content(self) -> String
    {   self.message.content
    }
}

impl ChoiceContent for TextChoice
{   fn content(self) -> String
    {   self.text
    }
}

/// What a successful call extracts from a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome
{   pub text: String
  , pub completion_tokens: u32
  , pub prompt_tokens: u32
}

impl<C: ChoiceContent> Completion<C>
{   /// Take choice 0 and the usage counters.
    /// Fails with `NoChoicesInResponse` on an empty choice list.
    pub fn into_outcome(self) -> Result<Outcome, Error>
    {   let usage = self.usage;
        let first = self.choices.into_iter().next()
          .ok_or(Error::NoChoicesInResponse)?;
        Ok(Outcome
        {   text: first.content()
          , completion_tokens: usage.completion_tokens
          , prompt_tokens: usage.prompt_tokens
        })
    }
}

/// Decode a success body into a completion with at least one choice
pub fn parse_completion<C>(body: &[u8])
  -> Result<Completion<C>, Error>
where C: DeserializeOwned
{   let completion: Completion<C>
      = serde_json::from_slice(body).map_err(|e| {
        error!("Parse error: {}", e);
        Error::Parse(e.to_string())
      })?;
    if completion.choices.is_empty()
    {   error!("No choices in response");
        return Err(Error::NoChoicesInResponse);
    }
    trace!(
      "Parsed completion {} with {} choices",
      completion.id, completion.choices.len()
    );
    Ok(completion)
}

/// Parse a body straight into the caller-facing outcome
pub fn parse_outcome<C>(body: &[u8]) -> Result<Outcome, Error>
where C: DeserializeOwned + ChoiceContent
{   let outcome = parse_completion::<C>(body)?.into_outcome()?;
    debug!(
      "Completion used {} prompt / {} completion tokens",
      outcome.prompt_tokens, outcome.completion_tokens
    );
    Ok(outcome)
}

/// Caller-facing result. `text == None` signals failure of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallResult
{   pub text: Option<String>
  , pub completion_tokens: u32
  , pub prompt_tokens: u32
}

impl CallResult
{   /// The absence sentinel
    pub fn failed() -> Self
    {   CallResult::default()
    }

    pub fn is_success(&self) -> bool
    {   self.text.is_some()
    }

    pub fn into_tuple(self) -> (Option<String>, u32, u32)
    {   (self.text, self.completion_tokens, self.prompt_tokens)
    }
}

impl From<Result<Outcome, Error>> for CallResult
{   fn from(result: Result<Outcome, Error>) -> Self
    {   match result
        {   Ok(outcome) => CallResult
            {   text: Some(outcome.text)
              , completion_tokens: outcome.completion_tokens
              , prompt_tokens: outcome.prompt_tokens
            }
          , Err(_) => CallResult::failed()
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::request::Role;

    const TEXT_BODY: &str = r#"{
      "id": "cmpl-1", "object": "text_completion",
      "created": 1690000000, "model": "davinci",
      "choices": [
        {"index": 0, "finish_reason": "stop", "text": "Hi there"},
        {"index": 1, "finish_reason": "length", "text": "Hey"}
      ],
      "usage": {"completion_tokens": 3, "prompt_tokens": 1,
                "total_tokens": 4}
    }"#;

    #[test]
    fn text_outcome_takes_first_choice()
    {   let outcome = parse_outcome::<TextChoice>(
          TEXT_BODY.as_bytes()
        ).unwrap();
        assert_eq!(outcome, Outcome
        {   text: "Hi there".to_string()
          , completion_tokens: 3
          , prompt_tokens: 1
        });
    }

    #[test]
    fn chat_completion_decodes_message()
    {   let body = r#"{
          "id": "chatcmpl-9", "object": "chat.completion",
          "created": 1, "model": "gpt-35-turbo",
          "choices": [{"index": 0, "finish_reason": "stop",
            "message": {"role": "assistant", "content": "Sure."}}],
          "usage": {"completion_tokens": 2, "prompt_tokens": 7,
                    "total_tokens": 9}
        }"#;
        let completion = parse_completion::<ChatChoice>(
          body.as_bytes()
        ).unwrap();
        assert_eq!(completion.model, "gpt-35-turbo");
        assert_eq!(completion.choices[0].message.role, Role::Assistant);
        assert_eq!(completion.usage.total_tokens, 9);
        let outcome = completion.into_outcome().unwrap();
        assert_eq!(outcome.text, "Sure.");
        assert_eq!(outcome.prompt_tokens, 7);
    }

    #[test]
    fn empty_choices_is_distinct_error()
    {   let body = r#"{"choices": [], "usage":
          {"completion_tokens": 0, "prompt_tokens": 0,
           "total_tokens": 0}}"#;
        let err = parse_completion::<TextChoice>(body.as_bytes())
          .unwrap_err();
        assert_eq!(err, Error::NoChoicesInResponse);
    }

    #[test]
    fn malformed_body_is_parse_error()
    {   let err = parse_outcome::<TextChoice>(b"<html>oops</html>")
          .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = parse_outcome::<TextChoice>(b"null").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn null_finish_reason_accepted()
    {   let body = r#"{"choices": [{"index": 0,
          "finish_reason": null, "text": "partial"}],
          "usage": {"completion_tokens": 1, "prompt_tokens": 1,
                    "total_tokens": 2}}"#;
        let completion = parse_completion::<TextChoice>(
          body.as_bytes()
        ).unwrap();
        assert!(completion.choices[0].finish_reason.is_none());
    }

    #[test]
    fn call_result_sentinel_on_error()
    {   let result = CallResult::from(
          Err::<Outcome, _>(Error::Cancelled)
        );
        assert_eq!(result.into_tuple(), (None, 0, 0));
    }
}
