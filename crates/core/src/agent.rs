mod builder;
mod managed;

use std::sync::Arc;
use std::time::Instant;

use stepwise_model::ModelRequest;
use tracing::Instrument;

use crate::error::AgentError;
use crate::memory::{ActionStep, AgentMemory, Observation, ToolCall};
use crate::model_client::{ModelClient, ModelClientResponse, TranscriptFn};
use crate::tool::Executor as ToolExecutor;
pub use builder::AgentBuilder;
pub use managed::{ManagedAgent, ManagedAgentInput};

pub(crate) type StepCallback =
    Box<dyn Fn(&ActionStep, &AgentMemory) + Send + Sync>;

const FINAL_ANSWER_PROMPT: &str = "You have run out of steps. \
Using only what you have learned so far, write your final answer to the \
task now. Do not call any more tools.";

/// An agent that works on a task by calling the model and the tools it
/// asks for, step by step, until the model answers in plain text.
///
/// The agent keeps its [`AgentMemory`] between calls. [`run`](Self::run)
/// starts over with an empty memory, while
/// [`follow_up`](Self::follow_up) continues the conversation.
pub struct Agent {
    name: Option<String>,
    description: Option<String>,
    model_client: ModelClient,
    tool_executor: ToolExecutor,
    max_steps: usize,
    memory: AgentMemory,
    step_callbacks: Vec<StepCallback>,
    on_transcript: TranscriptFn,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            mut model_client,
            tools,
            instructions,
            name,
            description,
            max_steps,
            retry_policy,
            step_callbacks,
            on_transcript,
        } = builder;

        model_client.set_retry_policy(retry_policy);
        let mut system_prompt = include_str!("agent/system_prompt.md").to_owned();
        if let Some(instructions) = instructions {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(&instructions);
        }

        Self {
            name,
            description,
            model_client,
            tool_executor: ToolExecutor::with_tools(tools),
            max_steps,
            memory: AgentMemory::new(system_prompt),
            step_callbacks,
            on_transcript: on_transcript.unwrap_or_else(|| Arc::new(|_: &str| {})),
        }
    }

    /// Runs a new task with an empty memory and returns the final answer.
    pub async fn run<S: Into<String>>(
        &mut self,
        task: S,
    ) -> Result<String, AgentError> {
        self.memory.reset();
        self.run_task(task.into()).await
    }

    /// Runs a task on top of the current memory, so earlier tasks,
    /// answers and tool results stay visible to the model.
    pub async fn follow_up<S: Into<String>>(
        &mut self,
        task: S,
    ) -> Result<String, AgentError> {
        self.run_task(task.into()).await
    }

    /// Returns the memory of the agent.
    #[inline]
    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the description of the agent.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Wraps the agent as a tool another agent can call.
    ///
    /// Fails with [`AgentError::MissingIdentity`] unless the agent has
    /// both a name and a description.
    pub fn into_managed(self) -> Result<ManagedAgent, AgentError> {
        ManagedAgent::new(self)
    }

    async fn run_task(&mut self, task: String) -> Result<String, AgentError> {
        let span = info_span!(
            "agent run",
            agent = self.name.as_deref().unwrap_or("agent")
        );
        self.run_steps(task).instrument(span).await
    }

    async fn run_steps(&mut self, task: String) -> Result<String, AgentError> {
        info!("new task: {task}");
        self.memory.push_task(task);

        for step_number in 1..=self.max_steps {
            let step = self.run_step(step_number, true).await?;
            let answer = step.final_answer.clone();
            self.finish_step(step);
            if let Some(answer) = answer {
                return Ok(answer);
            }
        }

        warn!(
            "no final answer after {} steps, asking for one",
            self.max_steps
        );
        self.memory
            .conversation_mut()
            .push_user(FINAL_ANSWER_PROMPT);
        let step = self.run_step(self.max_steps + 1, false).await?;
        let answer = step.final_answer.clone().unwrap_or_default();
        self.finish_step(step);
        Ok(answer)
    }

    async fn run_step(
        &mut self,
        step_number: usize,
        allow_tools: bool,
    ) -> Result<ActionStep, AgentError> {
        let started_at = Instant::now();
        debug!("step {step_number} started");

        let tools = if allow_tools && !self.tool_executor.is_empty() {
            self.tool_executor.definitions()
        } else {
            vec![]
        };
        let req = ModelRequest {
            messages: self.memory.model_messages(),
            tools,
        };
        let ModelClientResponse {
            transcript,
            opaque_msg,
            tool_calls,
            usage,
            finish_reason,
        } = self
            .model_client
            .send_request(req, Arc::clone(&self.on_transcript))
            .await
            .map_err(AgentError::Model)?;
        trace!("model finished with {finish_reason:?}");

        let conversation = self.memory.conversation_mut();
        if tool_calls.is_empty() || !allow_tools {
            let opaque_msg = if tool_calls.is_empty() {
                opaque_msg
            } else {
                warn!("ignoring tool calls in the final answer step");
                None
            };
            conversation.push_assistant(opaque_msg, transcript.clone());
            return Ok(ActionStep {
                step_number,
                model_output: transcript.clone(),
                tool_calls: vec![],
                observations: vec![],
                token_usage: usage,
                is_final_answer: true,
                final_answer: Some(transcript),
                duration: started_at.elapsed(),
            });
        }

        conversation.push_assistant(opaque_msg, transcript.clone());
        let results = self.tool_executor.execute(&tool_calls).await;

        let conversation = self.memory.conversation_mut();
        let mut observations = Vec::with_capacity(results.len());
        for (req, result) in tool_calls.iter().zip(results) {
            let (content, is_error) = match result {
                Ok(output) => (output, false),
                Err(err) => {
                    debug!("tool {} ({}) failed: {err}", req.name, req.id);
                    (format!("Error: {}", err.reason()), true)
                }
            };
            conversation.push_tool_result(req.id.clone(), content.clone());
            observations.push(Observation {
                tool_call_id: req.id.clone(),
                tool_name: req.name.clone(),
                content,
                is_error,
            });
        }

        let tool_calls = tool_calls
            .into_iter()
            .map(|req| ToolCall {
                id: req.id,
                name: req.name,
                arguments: req.arguments,
            })
            .collect();
        Ok(ActionStep {
            step_number,
            model_output: transcript,
            tool_calls,
            observations,
            token_usage: usage,
            is_final_answer: false,
            final_answer: None,
            duration: started_at.elapsed(),
        })
    }

    /// Hands the step to the callbacks, then records it.
    fn finish_step(&mut self, step: ActionStep) {
        debug!(
            "step {} finished in {:?}",
            step.step_number, step.duration
        );
        for callback in &self.step_callbacks {
            callback(&step, &self.memory);
        }
        self.memory.push_action(step);
    }
}
