use std::fmt;

/// Custom error type for textcomp operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Connection-level failure, no HTTP status was received
    Transport(String)
  , /// Service answered with a non-success status
    Http
    {   status: u16
      , reason: String
    }
  , /// Service signaled rate limiting
    RateLimited
    {   retry_after_secs: Option<u64>
    }
  , /// Failed to decode a completion from a success body
    Parse(String)
  , /// Completion decoded but carried no choices
    NoChoicesInResponse
  , /// Every attempt in the budget was consumed
    Exhausted
    {   attempts: u32
      , status: Option<u16>
      , reason: String
    }
  , /// Call aborted through its cancellation token
    Cancelled
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// API key is missing for an endpoint
    MissingApiKey(String)
  , /// Generic error
    Other(String)
}

impl Error
{   /// Whether the retry loop may issue another attempt after this error
    pub fn is_retryable(&self) -> bool
    {   matches!(
          self,
          Error::Transport(_)
            | Error::Http { .. }
            | Error::RateLimited { .. }
        )
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::Transport(msg) => {
              write!(f, "Transport error: {}", msg)
            }
          , Error::Http { status, reason } => {
              write!(f, "HTTP error: {} {}", status, reason)
            }
          , Error::RateLimited { retry_after_secs: Some(secs) } => {
              write!(f, "Rate limited, retry after {}s", secs)
            }
          , Error::RateLimited { retry_after_secs: None } => {
              write!(f, "Rate limited")
            }
          , Error::Parse(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::Exhausted { attempts, status, reason } => {
              match status
              {   Some(code) => write!(f,
                    "Failed after {} attempts. Error: {} {}",
                    attempts, code, reason
                  )
                , None => write!(f,
                    "Failed after {} attempts. Error: {}",
                    attempts, reason
                  )
              }
            }
          , Error::Cancelled => {
              write!(f, "Request cancelled")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::MissingApiKey(endpoint) => {
              write!(f, "Missing API key for: {}", endpoint)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

/// Terminal failure category of one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFailure
{   /// Success status with an unusable body, never retried
    ParseFailure
  , /// Attempt ceiling reached
    Exhausted
  , /// Cancellation token fired
    Cancelled
  , /// Single-attempt endpoint got a failure and gave up
    Rejected
}

impl CallFailure
{   /// Classify the error that ended a call
    pub fn from_error(error: &Error) -> Self
    {   match error
        {   Error::Parse(_) | Error::NoChoicesInResponse => {
              CallFailure::ParseFailure
            }
          , Error::Exhausted { .. } => CallFailure::Exhausted
          , Error::Cancelled => CallFailure::Cancelled
          , _ => CallFailure::Rejected
        }
    }
}
