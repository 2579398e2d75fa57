use stepwise_model::{ErrorKind, ModelProviderError};

/// Errors that end an agent run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model request failed, after retries if the failure was
    /// transient.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The agent was turned into a managed agent without a name or a
    /// description.
    #[error("a managed agent needs both a name and a description")]
    MissingIdentity,
}

impl AgentError {
    /// Returns the provider error kind if the model request failed.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            AgentError::Model(err) => Some(err.kind()),
            AgentError::MissingIdentity => None,
        }
    }
}
