//! A scripted fake model for tests.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use stepwise_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
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

#[derive(Default)]
struct Script {
    responses: Vec<PresetResponse>,
    cursor: usize,
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Responses are served in the order they were added, one per successful
/// request. Requests after the script is exhausted fail with
/// [`ErrorKind::Other`]. Clones share the same script, so a test can keep
/// a clone around to inspect [`requests`](Self::requests) after handing
/// the provider to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push(preset);
    }

    /// Sets the delay between two events.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many scripted responses have been served.
    pub fn served(&self) -> usize {
        self.lock().cursor
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(preset) = script.responses.get(script.cursor).cloned() else {
            return ready(Err(Error {
                message: "script exhausted",
                kind: ErrorKind::Other,
            }));
        };

        if let Some(failures) = preset.failures {
            script.failed_attempts += 1;
            if failures == 0 || script.failed_attempts <= failures {
                return ready(Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::RateLimitExceeded,
                }));
            }
        }

        let index = script.cursor;
        script.cursor += 1;
        script.failed_attempts = 0;

        ready(Ok(TestModelResponse {
            index,
            preset,
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        }))
    }
}

pub struct TestModelResponse {
    index: usize,
    preset: PresetResponse,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn event_at(&self, idx: usize) -> Option<ModelResponseEvent> {
        let events = &self.preset.events;
        if let Some(event) = events.get(idx) {
            return Some(match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
            });
        }
        // Trailing events: usage (if any), then completion.
        let mut trailing = idx - events.len();
        if let Some(usage) = self.preset.usage {
            if trailing == 0 {
                return Some(ModelResponseEvent::Usage(usage));
            }
            trailing -= 1;
        }
        if trailing == 0 {
            return Some(ModelResponseEvent::Completed(
                if self.preset.has_tool_call() {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                },
            ));
        }
        None
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        let event = this.event_at(this.event_idx);
        if event.is_some() {
            this.event_idx += 1;
        }
        Poll::Ready(Ok(event))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        let id = format!("msg:{}", self.index);
        Some(OpaqueMessage::new(id, self.preset.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use stepwise_model::{ModelMessage, TokenUsage, ToolCallRequest};

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Vec<ModelResponseEvent>, OpaqueMessage) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut others = vec![];
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            match event {
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                event => others.push(event),
            }
        }
        (msg, others, resp.make_opaque_message().unwrap())
    }

    fn user_request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_serves_script_in_order() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.add_response(
            PresetResponse::with_events([PresetEvent::ToolCall(
                ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "lookup_orders".to_owned(),
                    arguments: json!({ "table_id": "T5" }),
                },
            )])
            .with_usage(40, 8),
        );

        let resp = provider.send_request(&user_request("Hi")).await.unwrap();
        let (msg, others, opaque) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert_eq!(
            others,
            vec![ModelResponseEvent::Completed(ModelFinishReason::Stop)]
        );
        assert_eq!(opaque.id(), "msg:0");

        let resp = provider
            .send_request(&user_request("Orders for T5?"))
            .await
            .unwrap();
        let (msg, others, _) = collect_response(resp).await;
        assert!(msg.is_empty());
        assert_eq!(others.len(), 3);
        assert!(matches!(others[0], ModelResponseEvent::ToolCall(_)));
        assert_eq!(
            others[1],
            ModelResponseEvent::Usage(TokenUsage::new(40, 8))
        );
        assert_eq!(
            others[2],
            ModelResponseEvent::Completed(ModelFinishReason::ToolCalls)
        );

        assert_eq!(provider.served(), 2);
        assert_eq!(provider.requests().len(), 2);
        let err = provider
            .send_request(&user_request("More?"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("ok").with_failures(2));

        for _ in 0..2 {
            let err = provider
                .send_request(&user_request("Hi"))
                .await
                .err()
                .unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        assert!(provider.send_request(&user_request("Hi")).await.is_ok());
        assert_eq!(provider.requests().len(), 3);
    }
}
