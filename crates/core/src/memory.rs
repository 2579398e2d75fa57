//! What an agent remembers between steps and between tasks.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use stepwise_model::{ModelMessage, TokenUsage};

use crate::conversation::Conversation;

/// The memory of an agent: its system prompt, the conversation sent to
/// the model and a log of every step taken.
#[derive(Clone, Debug)]
pub struct AgentMemory {
    system_prompt: String,
    conversation: Conversation,
    steps: Vec<MemoryStep>,
}

/// One entry in the step log.
#[derive(Clone, Debug)]
pub enum MemoryStep {
    /// A task given to the agent.
    Task(TaskStep),
    /// A round trip to the model, with the tools it asked for.
    Action(ActionStep),
}

/// A task given to the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskStep {
    /// The task text.
    pub task: String,
}

/// A single model round trip.
#[derive(Clone, Debug, Serialize)]
pub struct ActionStep {
    /// Starts at 1 for every task.
    pub step_number: usize,
    /// Text produced by the model in this step.
    pub model_output: String,
    /// Tools the model asked for, in request order.
    pub tool_calls: Vec<ToolCall>,
    /// One observation per tool call, in the same order.
    pub observations: Vec<Observation>,
    /// Tokens consumed by this step, if the provider reported them.
    pub token_usage: Option<TokenUsage>,
    /// Whether this step produced the final answer.
    pub is_final_answer: bool,
    /// The final answer, set on the final answer step.
    pub final_answer: Option<String>,
    /// Wall time spent on this step, tools included.
    pub duration: Duration,
}

/// A tool call made during an action step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    /// The id the model assigned to the call.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The arguments the model passed.
    pub arguments: Value,
}

impl ToolCall {
    /// Renders the call as `name(<json arguments>)`.
    pub fn to_code(&self) -> String {
        format!("{}({})", self.name, self.arguments)
    }
}

/// The result of a tool call as it was reported back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// The id of the call this observes.
    pub tool_call_id: String,
    /// The tool name.
    pub tool_name: String,
    /// The tool output, or `Error: <reason>` when the call failed.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl AgentMemory {
    pub(crate) fn new(system_prompt: String) -> Self {
        Self {
            system_prompt,
            conversation: Conversation::default(),
            steps: vec![],
        }
    }

    /// Returns the system prompt.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns the conversation sent to the model.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the step log.
    #[inline]
    pub fn steps(&self) -> &[MemoryStep] {
        &self.steps
    }

    /// Iterates over the action steps in the log.
    pub fn action_steps(&self) -> impl Iterator<Item = &ActionStep> {
        self.steps.iter().filter_map(|step| match step {
            MemoryStep::Action(action) => Some(action),
            MemoryStep::Task(_) => None,
        })
    }

    /// Forgets every task, step and message. The system prompt stays.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.steps.clear();
    }

    /// Returns every tool call made so far, one per line, in execution
    /// order.
    pub fn full_code(&self) -> String {
        self.action_steps()
            .flat_map(|step| step.tool_calls.iter())
            .map(ToolCall::to_code)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sums the token usage of all action steps.
    pub fn total_token_usage(&self) -> TokenUsage {
        self.action_steps().filter_map(|step| step.token_usage).sum()
    }

    /// Returns the latest final answer.
    pub fn final_answer(&self) -> Option<&str> {
        self.action_steps()
            .filter_map(|step| step.final_answer.as_deref())
            .last()
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub(crate) fn push_task(&mut self, task: String) {
        self.conversation.push_user(task.clone());
        self.steps.push(MemoryStep::Task(TaskStep { task }));
    }

    pub(crate) fn push_action(&mut self, step: ActionStep) {
        self.steps.push(MemoryStep::Action(step));
    }

    /// Messages for the next request: the system prompt, then the
    /// conversation.
    pub(crate) fn model_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(self.conversation.items().len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(ModelMessage::System(self.system_prompt.clone()));
        }
        messages.extend(self.conversation.messages().cloned());
        messages
    }
}
