use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use stepwise_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, TokenUsage,
    ToolCallRequest,
};
use tracing::Instrument;

pub(crate) type TranscriptFn = Arc<dyn Fn(&str) + Send + Sync>;
type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, TranscriptFn) -> BoxedSendRequestFuture
        + Send + Sync
>;

/// How requests failing with a transient error are retried.
///
/// Delays grow exponentially from `initial_interval` up to
/// `max_interval`. Retrying stops once `max_elapsed` has passed since
/// the first attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of a single delay.
    pub max_interval: Duration,
    /// Total time budget for retries.
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    ///
    /// Any policy with a zero `max_elapsed` behaves the same.
    pub const NEVER: RetryPolicy = RetryPolicy {
        initial_interval: Duration::ZERO,
        max_interval: Duration::ZERO,
        max_elapsed: Duration::ZERO,
    };

    fn backoff(&self) -> impl Backoff + Send {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

/// A wrapper around a model provider that erases its type and retries
/// transient failures.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Sends a request and returns the fully received response.
    ///
    /// Message deltas are forwarded to `on_transcript` as they arrive.
    /// Transient failures are retried according to the retry policy.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: TranscriptFn,
    ) -> SendRequestResult {
        if self.retry_policy.max_elapsed.is_zero() {
            return (self.handler_fn)(req, on_transcript).await;
        }
        backoff::future::retry(self.retry_policy.backoff(), || {
            let fut = (self.handler_fn)(req.clone(), Arc::clone(&on_transcript));
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() {
                        warn!("transient model error, will retry: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    pub transcript: String,
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Sum of all usage reports in the response.
    pub usage: Option<TokenUsage>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: TranscriptFn,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut usage: Option<TokenUsage> = None;
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            // The request has been handled gracefully without errors,
            // now try getting the opaque message for this response.
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                on_transcript(&msg);
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Usage(reported) => {
                *usage.get_or_insert_default() += reported;
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        usage,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use stepwise_model::{ErrorKind, ModelMessage};
    use stepwise_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn hi_request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        }
    }

    fn fast_retries() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(
            PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ])
            .with_usage(10, 3),
        );

        let model_client = ModelClient::new(model_provider);
        let deltas = Arc::new(Mutex::new(Vec::<String>::new()));
        let resp = model_client
            .send_request(hi_request(), {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |delta: &str| {
                    deltas.lock().unwrap().push(delta.to_owned());
                })
            })
            .await
            .unwrap();

        assert_eq!(resp.transcript, "How are you?");
        assert_eq!(deltas.lock().unwrap().len(), 3);
        assert!(resp.opaque_msg.is_some());
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.usage, Some(TokenUsage::new(10, 3)));
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider.clone());
        let err = model_client
            .send_request(hi_request(), Arc::new(|_: &str| {}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        // Permanent errors are not retried.
        assert_eq!(model_provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_transient_errors() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::text("ok").with_failures(2));

        let mut model_client = ModelClient::new(model_provider.clone());
        model_client.set_retry_policy(fast_retries());
        let resp = model_client
            .send_request(hi_request(), Arc::new(|_: &str| {}))
            .await
            .unwrap();
        assert_eq!(resp.transcript, "ok");
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::text("ok").with_failures(0));

        let mut model_client = ModelClient::new(model_provider.clone());
        model_client.set_retry_policy(fast_retries());
        let err = model_client
            .send_request(hi_request(), Arc::new(|_: &str| {}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert!(model_provider.requests().len() > 1);

        model_client.set_retry_policy(RetryPolicy::NEVER);
        let before = model_provider.requests().len();
        model_client
            .send_request(hi_request(), Arc::new(|_: &str| {}))
            .await
            .unwrap_err();
        assert_eq!(model_provider.requests().len(), before + 1);
    }
}
