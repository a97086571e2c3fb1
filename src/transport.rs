//! One HTTP exchange per call, no retry

use std::future::Future;
use std::time::Duration;
use log::{debug, error, trace};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Fully encoded request, built once and reused for every attempt
#[derive(Debug, Clone)]
pub struct HttpRequest
{   pub uri: String
  , pub headers: HeaderMap
  , pub body: Vec<u8>
}

/// Tri-state result of a single exchange
#[derive(Debug, Clone)]
pub enum TransportOutcome
{   Success
    {   status: StatusCode
      , body: Vec<u8>
    }
  , HttpFailure
    {   status: StatusCode
      , reason: String
      , headers: HeaderMap
    }
  , /// No HTTP status was received
    TransportError(String)
}

impl TransportOutcome
{   pub fn is_rate_limited(&self) -> bool
    {   matches!(
          self,
          TransportOutcome::HttpFailure { status, .. }
            if *status == StatusCode::TOO_MANY_REQUESTS
        )
    }
}

/// Performs one POST. Implementations must not retry.
pub trait Transport: Send + Sync
{   fn send(&self, request: &HttpRequest)
      -> impl Future<Output = TransportOutcome> + Send;
}

/// `reqwest` transport; clones share one connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport
{   http_client: reqwest::Client
  , timeout: Option<Duration>
}

impl HttpTransport
{   pub fn new(timeout: Option<Duration>) -> Self
    {   Self::with_client(reqwest::Client::new(), timeout)
    }

    pub fn with_client(
      http_client: reqwest::Client
    , timeout: Option<Duration>
    ) -> Self
    {   debug!("Creating HttpTransport, timeout: {:?}", timeout);
        HttpTransport
        {   http_client
          , timeout
        }
    }
}

impl Transport for HttpTransport
{   async fn send(&self, request: &HttpRequest) -> TransportOutcome
    {   let mut builder = self.http_client
          .post(&request.uri)
          .headers(request.headers.clone())
          .body(request.body.clone());
        if let Some(timeout) = self.timeout
        {   builder = builder.timeout(timeout);
        }

        let response = match builder.send().await
        {   Ok(response) => response
          , Err(e) => {
              error!("HTTP error: {}", e);
              return TransportOutcome::TransportError(e.to_string());
            }
        };

        let status = response.status();
        trace!("Response status: {}", status);

        if !status.is_success()
        {   let reason = status.canonical_reason()
              .unwrap_or("Unknown")
              .to_string();
            return TransportOutcome::HttpFailure
            {   status
              , reason
              , headers: response.headers().clone()
            };
        }

        match response.bytes().await
        {   Ok(body) => TransportOutcome::Success
            {   status
              , body: body.to_vec()
            }
          , Err(e) => {
              error!("Failed to read response body: {}", e);
              TransportOutcome::TransportError(e.to_string())
            }
        }
    }
}

/// Server-requested delay from a delta-seconds `Retry-After` header.
/// HTTP-date and malformed values count as absent.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration>
{   headers.get(RETRY_AFTER)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.trim().parse::<u64>().ok())
      .map(Duration::from_secs)
}
