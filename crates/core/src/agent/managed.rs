use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use super::Agent;
use crate::error::AgentError;
use crate::tool::{Error, Tool, ToolResult};

/// An agent exposed as a tool, so a coordinating agent can hand it
/// subtasks.
///
/// The tool is named after the agent and described by the agent's
/// description. Each call runs the inner agent on a fresh memory.
pub struct ManagedAgent {
    name: String,
    description: String,
    parameter_schema: Value,
    agent: Arc<Mutex<Agent>>,
}

/// Arguments of a managed agent call.
#[derive(Debug, Deserialize)]
pub struct ManagedAgentInput {
    task: String,
    #[serde(default)]
    additional_args: Option<Map<String, Value>>,
}

impl ManagedAgent {
    pub(crate) fn new(agent: Agent) -> Result<Self, AgentError> {
        let (Some(name), Some(description)) =
            (agent.name.clone(), agent.description.clone())
        else {
            return Err(AgentError::MissingIdentity);
        };
        let parameter_schema = json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Long detailed description of the task.",
                },
                "additional_args": {
                    "type": "object",
                    "description": "Extra inputs for the task, such as data or constraints.",
                },
            },
            "required": ["task"],
        });
        Ok(Self {
            name,
            description,
            parameter_schema,
            agent: Arc::new(Mutex::new(agent)),
        })
    }
}

impl Tool for ManagedAgent {
    type Input = ManagedAgentInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let name = self.name.clone();
        let agent = Arc::clone(&self.agent);
        async move {
            let task = managed_task(&name, &input);
            let mut agent = agent.lock().await;
            match agent.run(task).await {
                Ok(answer) => Ok(format!(
                    "Here is the final answer from your managed agent '{name}':\n{answer}"
                )),
                Err(err) => {
                    Err(Error::execution_error().with_reason(err.to_string()))
                }
            }
        }
    }
}

fn managed_task(name: &str, input: &ManagedAgentInput) -> String {
    let mut task = format!(
        "You're a helpful agent named '{name}'.\n\
         Your manager has submitted this task to you.\n\
         ---\n\
         Task:\n{}\n\
         ---\n\
         Your manager is solving a wider task, so give as much detail as \
         you can rather than a one-line answer.",
        input.task
    );
    if let Some(args) = &input.additional_args {
        task.push_str("\n\nAdditional arguments:\n");
        task.push_str(&Value::Object(args.clone()).to_string());
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_task() {
        let input: ManagedAgentInput = serde_json::from_value(json!({
            "task": "Find admission rates for MIT.",
            "additional_args": { "year": 2024 },
        }))
        .unwrap();
        let task = managed_task("school_research_agent", &input);
        assert!(task.starts_with(
            "You're a helpful agent named 'school_research_agent'."
        ));
        assert!(task.contains("Task:\nFind admission rates for MIT.\n---"));
        assert!(task.ends_with("Additional arguments:\n{\"year\":2024}"));

        let input: ManagedAgentInput =
            serde_json::from_value(json!({ "task": "Draft an essay." }))
                .unwrap();
        assert!(!managed_task("essay_writing_agent", &input).contains("Additional"));
    }
}
