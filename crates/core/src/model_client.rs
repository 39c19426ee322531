use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use jungle_quest_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

/// Receives reply text as it streams in.
pub(crate) type DeltaFn = Arc<dyn Fn(&str) + Send + Sync>;

pub(crate) type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Option<DeltaFn>) -> BoxedSendRequestFuture
        + Send + Sync
>;

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since the session doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending {} messages", req.messages.len());
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the complete response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: Option<DeltaFn>,
    ) -> SendRequestResult {
        (self.handler_fn)(req, on_delta).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    pub text: String,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: Option<DeltaFn>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                if let Some(on_delta) = &on_delta {
                    on_delta(&delta);
                }
                text.push_str(&delta);
            }
            ModelResponseEvent::Completed(reason) => {
                if reason != ModelFinishReason::Stop {
                    warn!("reply was cut short: {reason:?}");
                }
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse { text })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use jungle_quest_model::{ErrorKind, ModelMessage};
    use jungle_quest_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![
                ModelMessage::System("Guide the player.".to_owned()),
                ModelMessage::User("Hi".to_owned()),
            ],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_text("How are you?"));

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let deltas = Arc::new(Mutex::new(Vec::new()));
            let on_delta: DeltaFn = {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |delta: &str| {
                    deltas.lock().unwrap().push(delta.to_owned());
                })
            };
            let resp = model_client
                .send_request(request(), Some(on_delta))
                .await
                .unwrap();
            assert_eq!(resp.text, "How are you?");
            assert_eq!(*deltas.lock().unwrap(), ["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(request(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
