//! Diagnostic records for failure paths.
//!
//! Reporters only observe: nothing they do feeds back into the retry loop.

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use log::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind
{   /// Connection-level failure, retried immediately
    Transport
  , /// 429, retried after `delay`
    RateLimited
  , /// Other HTTP failure, retried immediately
    Http
  , /// Unusable success body, terminal
    Parse
  , /// Attempt ceiling reached, terminal
    Exhausted
  , /// Cancellation token fired, terminal
    Cancelled
  , /// Failure on a single-attempt endpoint, terminal
    Rejected
}

impl DiagnosticKind
{   pub fn is_terminal(&self) -> bool
    {   !matches!(
          self,
          DiagnosticKind::Transport
            | DiagnosticKind::RateLimited
            | DiagnosticKind::Http
        )
    }
}

/// One failure observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic
{   pub endpoint: &'static str
  , /// 1-based attempt that produced the failure
    pub attempt: u32
  , pub kind: DiagnosticKind
  , pub status: Option<u16>
  , pub reason: String
  , /// Wait chosen before the next attempt, rate limiting only
    pub delay: Option<Duration>
}

impl fmt::Display for Diagnostic
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   write!(f, "[{}] attempt {}: ", self.endpoint, self.attempt)?;
        match self.kind
        {   DiagnosticKind::RateLimited => write!(f,
              "Server requesting a {}s delay to try again",
              self.delay.map(|d| d.as_secs()).unwrap_or(0)
            )
          , DiagnosticKind::Exhausted => match self.status
            {   Some(status) => write!(f,
                  "Failed after {} attempts. Error: {} {}",
                  self.attempt, status, self.reason
                )
              , None => write!(f,
                  "Failed after {} attempts. Error: {}",
                  self.attempt, self.reason
                )
            }
          , _ => match self.status
            {   Some(status) => write!(f,
                  "Error: {} {}", status, self.reason
                )
              , None => write!(f, "Error: {}", self.reason)
            }
        }
    }
}

/// Sink for diagnostics
pub trait ErrorReporter: Send + Sync
{   fn report(&self, diagnostic: &Diagnostic);
}

impl<F> ErrorReporter for F
where F: Fn(&Diagnostic) + Send + Sync
{   fn report(&self, diagnostic: &Diagnostic)
    {   self(diagnostic)
    }
}

/// Writes diagnostics through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter
{   fn report(&self, diagnostic: &Diagnostic)
    {   if diagnostic.kind.is_terminal()
        {   error!("{}", diagnostic);
        } else
        {   warn!("{}", diagnostic);
        }
    }
}

/// Forwards diagnostics into a channel.
/// A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelReporter
{   tx: mpsc::UnboundedSender<Diagnostic>
}

impl ChannelReporter
{   pub fn new(tx: mpsc::UnboundedSender<Diagnostic>) -> Self
    {   ChannelReporter { tx }
    }

    pub fn channel()
      -> (Self, mpsc::UnboundedReceiver<Diagnostic>)
    {   let (tx, rx) = mpsc::unbounded_channel();
        (ChannelReporter::new(tx), rx)
    }
}

impl ErrorReporter for ChannelReporter
{   fn report(&self, diagnostic: &Diagnostic)
    {   let _ = self.tx.send(diagnostic.clone());
    }
}
