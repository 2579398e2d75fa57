use std::sync::Arc;

use stepwise_model::ModelProvider;

use super::{Agent, StepCallback};
use crate::memory::{ActionStep, AgentMemory};
use crate::model_client::{ModelClient, RetryPolicy, TranscriptFn};
use crate::tool::{AnyTool, Tool, ToolObject};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) tools: Vec<Box<dyn ToolObject>>,
    pub(crate) instructions: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) max_steps: usize,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) step_callbacks: Vec<StepCallback>,
    pub(crate) on_transcript: Option<TranscriptFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tools: vec![],
            instructions: None,
            name: None,
            description: None,
            max_steps: 20,
            retry_policy: RetryPolicy::default(),
            step_callbacks: vec![],
            on_transcript: None,
        }
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool = Box::new(AnyTool(tool));
        self.tools.push(tool);
        self
    }

    /// Appends instructions to the system prompt.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets the name, used when the agent is managed by another agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description, used when the agent is managed by another
    /// agent.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets how many tool-calling steps a task may take. Defaults to 20;
    /// values below 1 are raised to 1.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Sets how rate-limited requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Attaches a callback to be invoked with every message delta from
    /// the model.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked after every action step, before
    /// the step is added to memory. Callbacks run in the order they were
    /// attached.
    #[inline]
    pub fn on_action_step(
        mut self,
        callback: impl Fn(&ActionStep, &AgentMemory) + Send + Sync + 'static,
    ) -> Self {
        self.step_callbacks.push(Box::new(callback));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
