//! Conversation-related types.

use stepwise_model::{ModelMessage, OpaqueMessage, ToolCallResult};

/// Who produced a conversation item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// A task or follow-up from the user.
    User,
    /// Model output.
    Assistant,
    /// The output of a tool call.
    Tool,
}

/// The messages exchanged with the model, in order.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Item>,
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
    pub(crate) source: TranscriptSource,
    pub(crate) transcript: String,
}

impl Item {
    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns who produced this item.
    #[inline]
    pub fn source(&self) -> TranscriptSource {
        self.source
    }
}

impl Conversation {
    /// Returns the items in order.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push_user(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.items.push(Item {
            msg: ModelMessage::User(text.clone()),
            source: TranscriptSource::User,
            transcript: text,
        });
    }

    /// Records a model turn. Without an opaque message the turn is
    /// downgraded to plain assistant text.
    pub(crate) fn push_assistant(
        &mut self,
        opaque_msg: Option<OpaqueMessage>,
        transcript: String,
    ) {
        let msg = match opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            None => ModelMessage::Assistant(transcript.clone()),
        };
        self.items.push(Item {
            msg,
            source: TranscriptSource::Assistant,
            transcript,
        });
    }

    pub(crate) fn push_tool_result(&mut self, id: String, content: String) {
        self.items.push(Item {
            msg: ModelMessage::Tool(ToolCallResult {
                id,
                content: content.clone(),
            }),
            source: TranscriptSource::Tool,
            transcript: content,
        });
    }

    pub(crate) fn messages(&self) -> impl Iterator<Item = &ModelMessage> {
        self.items.iter().map(|item| &item.msg)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}
