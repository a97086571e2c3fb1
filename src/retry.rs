//! Retry loop shared by both endpoints.
//!
//! Policy per attempt:
//! - success status: decode once, a bad body is terminal
//! - 429: wait for `Retry-After` seconds (default 2s), then retry
//! - any other HTTP or transport failure: retry immediately
//!
//! All failure kinds draw from the same attempt budget.

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use log::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{CallFailure, Error};
use crate::report::{Diagnostic, DiagnosticKind, ErrorReporter};
use crate::response::Outcome;
use crate::transport::{retry_after, Transport, TransportOutcome};

/// Attempt ceiling and rate-limit fallback delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy
{   /// Total requests allowed per call, first one included
    pub max_attempts: u32
  , /// Wait used when a 429 carries no usable `Retry-After`
    pub default_delay_secs: u64
}

impl RetryPolicy
{   pub fn new(max_attempts: u32, default_delay_secs: u64) -> Self
    {   RetryPolicy
        {   max_attempts
          , default_delay_secs
        }
    }

    /// One request, no retry
    pub fn single_attempt() -> Self
    {   RetryPolicy
        {   max_attempts: 1
          , ..RetryPolicy::default()
        }
    }

    pub fn default_delay(&self) -> Duration
    {   Duration::from_secs(self.default_delay_secs)
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::new(5, 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState
{   Attempting(u32)
  , Succeeded
  , Failed(CallFailure)
}

/// Most recent failed attempt, captured before any branching
struct LastFailure
{   status: Option<u16>
  , reason: String
  , error: Error
}

pub struct RetryScheduler
{   policy: RetryPolicy
  , reporter: Arc<dyn ErrorReporter>
}

impl RetryScheduler
{   pub fn new(
      policy: RetryPolicy
    , reporter: Arc<dyn ErrorReporter>
    ) -> Self
    {   RetryScheduler
        {   policy
          , reporter
        }
    }

    pub fn policy(&self) -> &RetryPolicy
    {   &self.policy
    }

    /// Run one logical call: encode once, then send until success,
    /// a terminal failure, budget exhaustion or cancellation.
    pub async fn execute<E, T>(
      &self
    , endpoint: &E
    , transport: &T
    , body: &E::Body
    , cancel: &CancellationToken
    ) -> Result<Outcome, Error>
    where E: Endpoint
        , T: Transport
    {   let request = endpoint.encode(body)?;
        let name = endpoint.name();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop
        { trace!("[{}] {:?}", name, AttemptState::Attempting(attempt));

          let outcome = tokio::select!
          { biased;
            _ = cancel.cancelled() => {
              return Err(self.cancelled(name, attempt));
            }
          , outcome = transport.send(&request) => outcome
          };

          let rate_limited = outcome.is_rate_limited();
          let (last, kind, delay) = match outcome
          {   TransportOutcome::Success { body, .. } => {
                return match endpoint.decode(&body)
                {   Ok(outcome) => {
                      debug!(
                        "[{}] {:?} on attempt {}",
                        name, AttemptState::Succeeded, attempt
                      );
                      Ok(outcome)
                    }
                  , Err(e) => {
                      self.report(
                        name, attempt, DiagnosticKind::Parse
                      , None, e.to_string(), None
                      );
                      Err(self.failed(name, e))
                    }
                };
              }
            , TransportOutcome::HttpFailure { status, reason, headers }
                if rate_limited => {
                let server_delay = retry_after(&headers);
                let last = LastFailure
                {   status: Some(status.as_u16())
                  , reason
                  , error: Error::RateLimited
                    {   retry_after_secs: server_delay.map(|d| d.as_secs())
                    }
                };
                let delay = server_delay
                  .unwrap_or_else(|| self.policy.default_delay());
                (last, DiagnosticKind::RateLimited, Some(delay))
              }
            , TransportOutcome::HttpFailure { status, reason, .. } => {
                let last = LastFailure
                {   status: Some(status.as_u16())
                  , error: Error::Http
                    {   status: status.as_u16()
                      , reason: reason.clone()
                    }
                  , reason
                };
                (last, DiagnosticKind::Http, None)
              }
            , TransportOutcome::TransportError(cause) => {
                let last = LastFailure
                {   status: None
                  , error: Error::Transport(cause.clone())
                  , reason: cause
                };
                (last, DiagnosticKind::Transport, None)
              }
          };

          if attempt >= max_attempts || !last.error.is_retryable()
          {   return Err(self.give_up(name, attempt, last));
          }

          self.report(
            name, attempt, kind, last.status, last.reason, delay
          );

          if let Some(delay) = delay
          {   tokio::select!
              { biased;
                _ = cancel.cancelled() => {
                  return Err(self.cancelled(name, attempt));
                }
              , _ = tokio::time::sleep(delay) => {}
              }
          }

          attempt += 1;
        }
    }

    /// Terminal failure once the budget is spent. A one-attempt policy
    /// surfaces the underlying error instead of `Exhausted`.
    fn give_up(
      &self
    , name: &'static str
    , attempt: u32
    , last: LastFailure
    ) -> Error
    {   if self.policy.max_attempts <= 1
        {   self.report(
              name, attempt, DiagnosticKind::Rejected
            , last.status, last.reason, None
            );
            return self.failed(name, last.error);
        }

        self.report(
          name, attempt, DiagnosticKind::Exhausted
        , last.status, last.reason.clone(), None
        );
        self.failed(name, Error::Exhausted
        {   attempts: attempt
          , status: last.status
          , reason: last.reason
        })
    }

    fn cancelled(&self, name: &'static str, attempt: u32) -> Error
    {   self.report(
          name, attempt, DiagnosticKind::Cancelled
        , None, "cancelled".to_string(), None
        );
        self.failed(name, Error::Cancelled)
    }

    fn failed(&self, name: &'static str, error: Error) -> Error
    {   debug!(
          "[{}] {:?}",
          name, AttemptState::Failed(CallFailure::from_error(&error))
        );
        error
    }

    fn report(
      &self
    , endpoint: &'static str
    , attempt: u32
    , kind: DiagnosticKind
    , status: Option<u16>
    , reason: String
    , delay: Option<Duration>
    )
    {   let diagnostic = Diagnostic
        {   endpoint
          , attempt
          , kind
          , status
          , reason
          , delay
        };
        trace!("Reporting {:?} for attempt {}", kind, attempt);
        self.reporter.report(&diagnostic);
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::StatusCode;

    use crate::config::GenerationDefaults;
    use crate::endpoint::PromptEndpoint;
    use crate::report::ChannelReporter;
    use crate::request::TextPrompt;
    use crate::transport::HttpRequest;

    struct Scripted
    {   outcomes: Mutex<VecDeque<TransportOutcome>>
      , calls: Mutex<u32>
    }

    impl Scripted
    {   fn new(outcomes: Vec<TransportOutcome>) -> Self
        {   Scripted
            {   outcomes: Mutex::new(outcomes.into())
              , calls: Mutex::new(0)
            }
        }

        fn calls(&self) -> u32
        {   *self.calls.lock().unwrap()
        }
    }

    impl Transport for Scripted
    {   async fn send(&self, _request: &HttpRequest) -> TransportOutcome
        {   *self.calls.lock().unwrap() += 1;
            self.outcomes.lock().unwrap().pop_front()
              .unwrap_or_else(|| {
                TransportOutcome::TransportError("script ended".into())
              })
        }
    }

    fn ok_body() -> TransportOutcome
    {   TransportOutcome::Success
        {   status: StatusCode::OK
          , body: br#"{"choices":[{"index":0,"finish_reason":"stop",
              "text":"ok"}],"usage":{"completion_tokens":1,
              "prompt_tokens":2,"total_tokens":3}}"#.to_vec()
        }
    }

    fn too_many(secs: &'static str) -> TransportOutcome
    {   let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(secs));
        TransportOutcome::HttpFailure
        {   status: StatusCode::TOO_MANY_REQUESTS
          , reason: "Too Many Requests".into()
          , headers
        }
    }

    fn endpoint() -> PromptEndpoint
    {   PromptEndpoint::new(
          "http://localhost/completions", "k", "ua"
        , RetryPolicy::default()
        ).unwrap()
    }

    fn body() -> TextPrompt
    {   TextPrompt::from_text("Hello", &GenerationDefaults::default())
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_share_budget_with_429()
    {   let transport = Scripted::new(vec![
          TransportOutcome::TransportError("reset".into())
        , too_many("1")
        , TransportOutcome::TransportError("reset".into())
        , too_many("1")
        , TransportOutcome::TransportError("refused".into())
        , ok_body()
        ]);
        let (reporter, mut rx) = ChannelReporter::channel();
        let scheduler = RetryScheduler::new(
          RetryPolicy::default(), Arc::new(reporter)
        );
        let err = scheduler.execute(
          &endpoint(), &transport, &body(), &CancellationToken::new()
        ).await.unwrap_err();

        assert_eq!(transport.calls(), 5);
        assert_eq!(err, Error::Exhausted
        {   attempts: 5
          , status: None
          , reason: "refused".into()
        });
        let mut kinds = Vec::new();
        while let Ok(d) = rx.try_recv()
        {   kinds.push(d.kind);
        }
        assert_eq!(kinds.last(), Some(&DiagnosticKind::Exhausted));
        assert_eq!(kinds.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_default_delay()
    {   let no_header = TransportOutcome::HttpFailure
        {   status: StatusCode::TOO_MANY_REQUESTS
          , reason: "Too Many Requests".into()
          , headers: HeaderMap::new()
        };
        let transport = Scripted::new(vec![no_header, ok_body()]);
        let (reporter, mut rx) = ChannelReporter::channel();
        let scheduler = RetryScheduler::new(
          RetryPolicy::new(5, 7), Arc::new(reporter)
        );
        let start = tokio::time::Instant::now();
        let outcome = scheduler.execute(
          &endpoint(), &transport, &body(), &CancellationToken::new()
        ).await.unwrap();

        assert_eq!(outcome.text, "ok");
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert!(start.elapsed() < Duration::from_secs(8));
        assert_eq!(
          rx.try_recv().unwrap().delay,
          Some(Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn already_cancelled_sends_nothing()
    {   let transport = Scripted::new(vec![ok_body()]);
        let (reporter, _rx) = ChannelReporter::channel();
        let scheduler = RetryScheduler::new(
          RetryPolicy::default(), Arc::new(reporter)
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scheduler.execute(
          &endpoint(), &transport, &body(), &cancel
        ).await.unwrap_err();
        assert_eq!(err, Error::Cancelled);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_surfaces_underlying_error()
    {   let transport = Scripted::new(vec![too_many("4"), ok_body()]);
        let (reporter, mut rx) = ChannelReporter::channel();
        let scheduler = RetryScheduler::new(
          RetryPolicy::single_attempt(), Arc::new(reporter)
        );
        let start = tokio::time::Instant::now();
        let err = scheduler.execute(
          &endpoint(), &transport, &body(), &CancellationToken::new()
        ).await.unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(err, Error::RateLimited { retry_after_secs: Some(4) });
        assert_eq!(CallFailure::from_error(&err), CallFailure::Rejected);
        let d = rx.try_recv().unwrap();
        assert_eq!(d.kind, DiagnosticKind::Rejected);
        assert_eq!(d.status, Some(429));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn single_attempt_policy()
    {   let policy = RetryPolicy::single_attempt();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.default_delay(), Duration::from_secs(2));
    }
}
