use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific history message the agent stores without
/// inspecting.
///
/// The plain [`ModelMessage`](crate::ModelMessage) variants can lose
/// details a provider needs on the next request, such as the exact tool
/// call structure of an assistant turn. Providers wrap their own message
/// type in an `OpaqueMessage`, the agent keeps it in the conversation,
/// and the provider unwraps it again when building the next payload.
///
/// Two opaque messages are equal when their ids are equal.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps a provider message. `id` must be unique within the
    /// conversation.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        let id: String = id.into();
        Self {
            id: id.into(),
            value: Arc::new(value),
        }
    }

    /// Returns the message id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Borrows the wrapped value if it has type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
