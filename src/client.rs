use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use log::{debug, error, info};

use crate::config::ClientConfig;
use crate::endpoint::{ChatEndpoint, Endpoint, PromptEndpoint};
use crate::error::Error;
use crate::report::{ErrorReporter, LogReporter};
use crate::request::{ChatPrompt, Message, Prompt, TextPrompt};
use crate::response::{CallResult, Outcome};
use crate::retry::RetryScheduler;
use crate::transport::{HttpTransport, Transport};

struct ClientInner<T>
{   config: ClientConfig
  , transport: T
  , chat: Option<ChatEndpoint>
  , prompt: Option<PromptEndpoint>
  , reporter: Arc<dyn ErrorReporter>
}

/// Completion client. Clones share the transport and its
/// connection pool, so independent calls can run concurrently.
pub struct CompletionClient<T = HttpTransport>
{   inner: Arc<ClientInner<T>>
}

impl<T> Clone for CompletionClient<T>
{   fn clone(&self) -> Self
    {   CompletionClient
        {   inner: Arc::clone(&self.inner)
        }
    }
}

impl CompletionClient<HttpTransport>
{   /// Create a client over `reqwest`
    pub fn new(config: ClientConfig) -> Result<Self, Error>
    {   let transport = HttpTransport::new(
          config.timeout_secs.map(Duration::from_secs)
        );
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> CompletionClient<T>
{   pub fn with_transport(
      config: ClientConfig
    , transport: T
    ) -> Result<Self, Error>
    {   config.validate()?;
        debug!(
          "Creating CompletionClient, chat: {:?}, prompt: {:?}",
          config.chat_uri, config.prompt_uri
        );

        let chat = config.chat_uri.as_deref().map(ChatEndpoint::new);

        let prompt = match config.prompt_uri.as_deref()
        {   Some(uri) => {
              let api_key = config.api_key.as_deref()
                .ok_or_else(|| {
                  error!("No API key for prompt endpoint");
                  Error::MissingApiKey(uri.to_string())
                })?;
              Some(PromptEndpoint::new(
                uri
              , api_key
              , &config.user_agent
              , config.retry.clone()
              )?)
            }
          , None => None
        };

        Ok(CompletionClient
        {   inner: Arc::new(ClientInner
            {   config
              , transport
              , chat
              , prompt
              , reporter: Arc::new(LogReporter)
            })
        })
    }

    /// Replace the diagnostic sink. Call before cloning.
    pub fn with_reporter(
      self
    , reporter: Arc<dyn ErrorReporter>
    ) -> Result<Self, Error>
    {   let mut inner = Arc::try_unwrap(self.inner).map_err(|_| {
          Error::Other(
            "reporter must be set before the client is shared"
              .to_string()
          )
        })?;
        inner.reporter = reporter;
        Ok(CompletionClient
        {   inner: Arc::new(inner)
        })
    }

    pub fn config(&self) -> &ClientConfig
    {   &self.inner.config
    }

    pub fn transport(&self) -> &T
    {   &self.inner.transport
    }

    // ===== Chat endpoint: single attempt =====

    pub async fn get_chat_completion(
      &self
    , history: Vec<Message>
    ) -> CallResult
    {   self.try_chat_completion(history).await.into()
    }

    pub async fn get_chat_completion_with_cancel(
      &self
    , history: Vec<Message>
    , cancel: &CancellationToken
    ) -> CallResult
    {   self.try_chat_completion_with_cancel(history, cancel)
          .await
          .into()
    }

    pub async fn try_chat_completion(
      &self
    , history: Vec<Message>
    ) -> Result<Outcome, Error>
    {   self.try_chat_completion_with_cancel(
          history, &CancellationToken::new()
        ).await
    }

    pub async fn try_chat_completion_with_cancel(
      &self
    , history: Vec<Message>
    , cancel: &CancellationToken
    ) -> Result<Outcome, Error>
    {   let endpoint = self.inner.chat.as_ref().ok_or_else(|| {
          Error::InvalidConfiguration("chat_uri not set".to_string())
        })?;
        debug!("Chat completion with {} messages", history.len());
        let body = ChatPrompt::from_history(
          history, &self.inner.config.defaults
        );
        self.run(endpoint, &body, cancel).await
    }

    // ===== Prompt endpoint: retry with backoff =====

    pub async fn get_prompt_completion(
      &self
    , prompt: impl Into<String>
    ) -> CallResult
    {   self.try_prompt_completion(prompt).await.into()
    }

    pub async fn get_prompt_completion_with_cancel(
      &self
    , prompt: impl Into<String>
    , cancel: &CancellationToken
    ) -> CallResult
    {   self.try_prompt_completion_with_cancel(prompt, cancel)
          .await
          .into()
    }

    pub async fn try_prompt_completion(
      &self
    , prompt: impl Into<String>
    ) -> Result<Outcome, Error>
    {   self.try_prompt_completion_with_cancel(
          prompt, &CancellationToken::new()
        ).await
    }

    pub async fn try_prompt_completion_with_cancel(
      &self
    , prompt: impl Into<String>
    , cancel: &CancellationToken
    ) -> Result<Outcome, Error>
    {   let endpoint = self.inner.prompt.as_ref().ok_or_else(|| {
          Error::InvalidConfiguration("prompt_uri not set".to_string())
        })?;
        let body = TextPrompt::from_text(
          prompt, &self.inner.config.defaults
        );
        self.run(endpoint, &body, cancel).await
    }

    // ===== Either endpoint =====

    /// Route a prompt to the endpoint matching its kind
    pub async fn complete(&self, prompt: impl Into<Prompt>) -> CallResult
    {   self.complete_with_cancel(prompt, &CancellationToken::new()).await
    }

    pub async fn complete_with_cancel(
      &self
    , prompt: impl Into<Prompt>
    , cancel: &CancellationToken
    ) -> CallResult
    {   match prompt.into()
        {   Prompt::Conversation(history) => {
              self.get_chat_completion_with_cancel(history, cancel).await
            }
          , Prompt::Text(text) => {
              self.get_prompt_completion_with_cancel(text, cancel).await
            }
        }
    }

    async fn run<E: Endpoint>(
      &self
    , endpoint: &E
    , body: &E::Body
    , cancel: &CancellationToken
    ) -> Result<Outcome, Error>
    {   let scheduler = RetryScheduler::new(
          endpoint.policy(), Arc::clone(&self.inner.reporter)
        );
        scheduler.execute(endpoint, &self.inner.transport, body, cancel)
          .await
    }
}

impl<T: Transport + 'static> CompletionClient<T>
{   /// Run a completion on its own task - returns immediately.
    /// The reply channel yields exactly one result.
    pub fn spawn_completion(
      &self
    , prompt: impl Into<Prompt>
    , cancel: CancellationToken
    ) -> mpsc::UnboundedReceiver<CallResult>
    {   let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let client = self.clone();
        let prompt = prompt.into();
        tokio::spawn(async move {
          let result = client.complete_with_cancel(prompt, &cancel).await;
          if reply_tx.send(result).is_err()
          {   info!("Completion finished after receiver dropped");
          }
        });
        reply_rx
    }
}
