use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use stepwise_model::{
    EmbeddingProvider, ErrorKind, ModelFinishReason, ModelMessage,
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, TokenUsage,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeError(ErrorKind);

impl Display for FakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeError {}

impl ModelProviderError for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message word by word, then reports usage.
struct EchoResponse {
    words: VecDeque<String>,
    usage: Option<TokenUsage>,
    finished: bool,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for EchoResponse {
    type Error = FakeError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep(Duration::from_millis(1))));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        if let Some(mut word) = this.words.pop_front() {
            if !this.words.is_empty() {
                word.push(' ');
            }
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                word,
            ))));
        }
        if let Some(usage) = this.usage.take() {
            return Poll::Ready(Ok(Some(ModelResponseEvent::Usage(usage))));
        }
        if !this.finished {
            this.finished = true;
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ))));
        }
        Poll::Ready(Ok(None))
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = FakeError;
    type Response = EchoResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let result = match last_user {
            Some(text) => Ok(EchoResponse {
                words: format!("You said {text}")
                    .split(' ')
                    .map(ToOwned::to_owned)
                    .collect(),
                usage: Some(TokenUsage::new(
                    text.split(' ').count() as u64,
                    text.split(' ').count() as u64 + 2,
                )),
                finished: false,
                sleep: None,
            }),
            None => Err(FakeError(ErrorKind::Other)),
        };
        ready(result)
    }
}

struct LengthEmbedder;

impl EmbeddingProvider for LengthEmbedder {
    type Error = FakeError;

    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send + 'static
    {
        let vectors = inputs
            .iter()
            .map(|input| vec![input.len() as f32, 1.0])
            .collect();
        ready(Ok(vectors))
    }
}

#[tokio::test]
async fn test_streamed_completion_with_usage() {
    let req = ModelRequest {
        messages: vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("Good morning".to_owned()),
        ],
        tools: vec![],
    };
    let mut resp = EchoProvider.send_request(&req).await.unwrap();

    let mut text = String::new();
    let mut usage = None;
    let mut finish_reason = None;
    while let Some(event) =
        poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::Usage(u) => usage = Some(u),
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason)
            }
            ModelResponseEvent::ToolCall(call) => {
                unreachable!("unexpected tool call: {call:?}")
            }
        }
    }

    assert_eq!(text, "You said Good morning");
    assert_eq!(usage.map(|u| u.total_tokens()), Some(6));
    assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
    assert!(resp.make_opaque_message().is_none());
}

#[tokio::test]
async fn test_request_without_user_message() {
    let req = ModelRequest::default();
    let err = EchoProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!err.kind().is_transient());
}

#[tokio::test]
async fn test_embedding_order() {
    let inputs = vec!["a".to_owned(), "abc".to_owned()];
    let vectors = LengthEmbedder.embed(&inputs).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
}
