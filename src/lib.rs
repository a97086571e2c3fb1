//! textcomp: async client for a remote text-completion service.
//!
//! Two call sites with deliberately different resiliency:
//!
//! - chat-style (`messages` in, `message` choices out): one request,
//!   any failure ends the call
//! - single-prompt (`prompt` in, `text` choices out): up to five
//!   attempts, waiting on rate limits and retrying other failures at once
//!
//! Every call returns a [`CallResult`]: generated text plus completion
//! and prompt token counts. `text == None` is the one failure signal;
//! use the `try_*` methods on [`CompletionClient`] to see the [`Error`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), textcomp::Error> {
//! let config = textcomp::ClientConfig::from_env()?;
//! let client = textcomp::CompletionClient::new(config)?;
//! let (text, completion_tokens, prompt_tokens)
//!   = client.get_prompt_completion("Hello").await.into_tuple();
//! # Ok(()) }
//! ```

pub mod error;
pub mod config;
pub mod request;
pub mod response;
pub mod transport;
pub mod endpoint;
pub mod retry;
pub mod report;
pub mod client;
pub mod plan;

pub use client::CompletionClient;
pub use config::{ClientConfig, GenerationDefaults};
pub use endpoint::{ChatEndpoint, Endpoint, PromptEndpoint};
pub use error::{CallFailure, Error};
pub use plan::Plan;
pub use report::{
  ChannelReporter, Diagnostic, DiagnosticKind, ErrorReporter, LogReporter
};
pub use request::{ChatPrompt, Message, Prompt, Role, TextPrompt};
pub use response::{
  CallResult, ChatChoice, Completion, Outcome, TextChoice, Usage
};
pub use retry::{AttemptState, RetryPolicy, RetryScheduler};
pub use transport::{HttpRequest, HttpTransport, Transport, TransportOutcome};

/// Cancellation signal accepted by the `*_with_cancel` calls
pub use tokio_util::sync::CancellationToken;
