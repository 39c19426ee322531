//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use jungle_quest_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        let Some(sleep) = &mut this.sleep else {
            if this.event_idx > this.events.len() {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
            this.sleep = Some(Box::pin(sleep(this.delay)));
            return Pin::new(this).poll_next_event(cx);
        };
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        let event_idx = this.event_idx;
        this.event_idx += 1;
        match this.events.get(event_idx) {
            Some(PresetEvent::MessageDelta(msg)) => {
                Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                    msg.clone(),
                ))))
            }
            Some(PresetEvent::Interrupt) => {
                this.event_idx = this.events.len() + 1;
                Poll::Ready(Err(Error {
                    message: "stream interrupted",
                    kind: ErrorKind::Other,
                }))
            }
            None => Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            )))),
        }
    }
}

#[derive(Default)]
struct RequestLog {
    requests: Mutex<Vec<ModelRequest>>,
    attempts: Mutex<HashMap<usize, u64>>,
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the responses, which is how
/// the model should reply to the player. A response is selected by the
/// number of user messages in the request: the first user turn gets the
/// first response, and so on. If there are no enough responses, an error
/// will be returned.
///
/// Clones share the same request log, so a test can keep one clone and
/// hand another to the code under test.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    responses: Vec<PresetResponse>,
    delay: Option<Duration>,
    log: Arc<RequestLog>,
}

impl TestModelProvider {
    /// Appends the response for the next user turn.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.responses.push(preset);
    }

    /// Sets the delay before each event is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed ones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.log.requests).clone()
    }

    fn select_response(&self, req: &ModelRequest) -> Result<PresetEvents, Error> {
        let user_turns = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::User(_)))
            .count();
        let Some(step_idx) = user_turns.checked_sub(1) else {
            return Err(Error {
                message: "request has no user input",
                kind: ErrorKind::Other,
            });
        };
        let Some(preset) = self.responses.get(step_idx) else {
            return Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            });
        };

        let mut attempts = lock(&self.log.attempts);
        let attempt = attempts.entry(step_idx).or_default();
        *attempt += 1;
        match preset.failures {
            Some(0) => Err(Error {
                message: "request always fails",
                kind: ErrorKind::RateLimitExceeded,
            }),
            Some(failures) if *attempt <= failures => Err(Error {
                message: "request fails this time",
                kind: ErrorKind::RateLimitExceeded,
            }),
            _ => Ok(preset.events.clone()),
        }
    }
}

type PresetEvents = Vec<PresetEvent>;

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        lock(&self.log.requests).push(req.clone());
        let resp = self.select_response(req).map(|events| TestModelResponse {
            events,
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        });
        std::future::ready(resp)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> Result<String, Error> {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            match event {
                ModelResponseEvent::Completed(_) => {}
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
            }
        }
        Ok(msg)
    }

    fn request(inputs: &[&str]) -> ModelRequest {
        let mut messages = vec![
            ModelMessage::System("Guide the player.".to_owned()),
            ModelMessage::Assistant("Welcome!".to_owned()),
        ];
        for input in inputs {
            messages.push(ModelMessage::User((*input).to_owned()));
            messages.push(ModelMessage::Assistant("...".to_owned()));
        }
        messages.pop();
        ModelRequest { messages }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("Hello, world!"));
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a ".to_owned()),
            PresetEvent::MessageDelta("look.".to_owned()),
        ]));

        let resp = provider.send_request(&request(&["Hi"])).await.unwrap();
        assert_eq!(collect_response(resp).await.unwrap(), "Hello, world!");

        let resp = provider
            .send_request(&request(&["Hi", "Look around"]))
            .await
            .unwrap();
        assert_eq!(
            collect_response(resp).await.unwrap(),
            "Sure, let me take a look."
        );

        assert_eq!(provider.requests().len(), 2);
        let err = provider
            .send_request(&request(&["Hi", "Look around", "Again"]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.message(), "no enough responses");
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("Ok").with_failures(2));
        let req = request(&["Hi"]);

        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await.unwrap(), "Ok");
        assert_eq!(provider.clone().requests().len(), 3);
    }

    #[tokio::test]
    async fn test_interrupt() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("The bridge ".to_owned()),
            PresetEvent::Interrupt,
        ]));
        let resp = provider.send_request(&request(&["Cross"])).await.unwrap();
        let err = collect_response(resp).await.unwrap_err();
        assert_eq!(err.message(), "stream interrupted");
    }
}
