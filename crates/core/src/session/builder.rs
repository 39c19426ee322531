use std::sync::Arc;
use std::time::Duration;

use jungle_quest_model::ModelProvider;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::Session;
use super::state::{SessionState, Stage, run_session};
use crate::model_client::{DeltaFn, ModelClient};
use crate::retry::RetryPolicy;
use crate::transcript::Transcript;

/// [`Session`] builder.
pub struct SessionBuilder {
    model_client: ModelClient,
    system_prompt: String,
    welcome_message: String,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
    on_delta: Option<DeltaFn>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: String::new(),
            welcome_message: String::new(),
            retry_policy: RetryPolicy::default(),
            timeout: None,
            on_delta: None,
        }
    }

    /// Sets the game rules sent as the system turn.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the first guide message the player sees.
    #[inline]
    pub fn with_welcome_message<S: Into<String>>(mut self, message: S) -> Self {
        self.welcome_message = message.into();
        self
    }

    /// Sets how failed model requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Fails a turn if the model has not fully answered within `timeout`,
    /// retries included.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a callback to be invoked as reply text streams in.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_delta = Some(Arc::new(on_delta));
        self
    }

    /// Starts the session.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Session {
        let state = SessionState {
            model_client: self.model_client,
            retry_policy: self.retry_policy,
            timeout: self.timeout,
            on_delta: self.on_delta,
            transcript: Transcript::new(
                self.system_prompt,
                self.welcome_message,
            ),
            stage: Stage::AwaitingInput,
        };
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(
            run_session(state, cmd_tx.downgrade(), cmd_rx)
                .instrument(debug_span!("session")),
        );
        Session { cmd_tx }
    }
}
