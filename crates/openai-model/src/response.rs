use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::Value;
use stepwise_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, TokenUsage, ToolCallRequest,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Message, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Tool call arguments arrive in fragments, so calls are only handed
    // out once the finish reason (or the end of stream) is seen. This is
    // the index of the next call to hand out.
    next_tool_call_idx: usize,
    finish_reason: Option<ModelFinishReason>,
    finish_reason_sent: bool,
    pending_usage: Option<TokenUsage>,
    finished: bool,
    stream_ended: bool,
}

impl PartialState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            next_tool_call_idx: 0,
            finish_reason: None,
            finish_reason_sent: false,
            pending_usage: None,
            finished: false,
            stream_ended: false,
        }
    }

    #[inline]
    fn finish(self) -> Option<(String, Message)> {
        Some((
            self.id?,
            Message::Assistant {
                content: Some(self.content),
                tool_calls: if self.tool_calls.is_empty() {
                    None
                } else {
                    Some(self.tool_calls)
                },
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    // Order matters: tool calls first, then the finish reason, then usage.
    fn take_pending_event(&mut self) -> Option<ModelResponseEvent> {
        if let Some(tool_call) = self.tool_calls.get(self.next_tool_call_idx) {
            self.next_tool_call_idx += 1;
            return Some(ModelResponseEvent::ToolCall(to_request(tool_call)));
        }
        if !self.finish_reason_sent {
            if let Some(reason) = self.finish_reason {
                self.finish_reason_sent = true;
                return Some(ModelResponseEvent::Completed(reason));
            }
        }
        self.pending_usage.take().map(ModelResponseEvent::Usage)
    }

    /// Merges a chunk into the state and returns its text delta, if any.
    fn apply_chunk(
        &mut self,
        mut chunk: ChatCompletionChunk,
    ) -> Result<Option<String>, Error> {
        if self.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }
        if let Some(usage) = chunk.usage {
            self.pending_usage = Some(usage.into());
        }
        let Some(choice) = chunk.choices.pop() else {
            return Ok(None);
        };

        let mut message_delta = None;
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                self.content.push_str(&content);
                message_delta = Some(content);
            }
        }
        if let Some(reasoning_content) = &choice.delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(reasoning_content);
        }
        for tool_call in choice.delta.tool_calls.into_iter().flatten() {
            self.merge_tool_call(tool_call);
        }
        if let Some(finish_reason) = choice.finish_reason {
            self.finish_reason = Some(if finish_reason == "tool_calls" {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            });
            self.finished = true;
        }
        Ok(message_delta)
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let Some(partial) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.tool_calls.push(tool_call);
            return;
        };
        if let Some(id) = tool_call.id {
            partial.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial.r#type.get_or_insert_default().push_str(&ty);
        }
        let Some(function) = tool_call.function else {
            return;
        };
        match partial.function {
            Some(ref mut partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial.function = Some(function),
        }
    }
}

fn to_request(tool_call: &ToolCall) -> ToolCallRequest {
    let function = tool_call.function.as_ref();
    let arguments = function
        .and_then(|f| f.arguments.as_deref())
        .filter(|args| !args.trim().is_empty())
        .map(|args| {
            serde_json::from_str::<Value>(args).unwrap_or_else(|err| {
                warn!("malformed tool call arguments ({err}): {args}");
                Value::String(args.to_owned())
            })
        })
        .unwrap_or_else(|| Value::Object(Default::default()));
    ToolCallRequest {
        id: tool_call.id.clone().unwrap_or_default(),
        name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
        arguments,
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut state: PartialState) -> NextEvent {
    loop {
        if state.finished {
            if let Some(event) = state.take_pending_event() {
                return Ok((Some(event), state));
            }
            if state.stream_ended {
                return Ok((None, state));
            }
        }

        let sse_event = match state.sse.next_event().await {
            Ok(Some(event)) if event != "[DONE]" => event,
            Ok(_) => {
                state.finished = true;
                state.stream_ended = true;
                continue;
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if let Some(delta) = state.apply_chunk(chunk)? {
            return Ok((Some(ModelResponseEvent::MessageDelta(delta)), state));
        }
    }
}
