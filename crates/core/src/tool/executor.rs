use std::collections::HashMap;
use std::pin::Pin;

use futures_util::future::join_all;
use stepwise_model::{ModelTool, ToolCallRequest};

use crate::tool::{Error, ToolObject, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// An executor that handles tool call requests from the model.
pub struct Executor {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    /// Registers the tools by name. A later tool replaces an earlier one
    /// with the same name.
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            if tool_map.contains_key(name) {
                warn!("tool registered twice, keeping the last one: {name}");
            }
            tool_map.insert(name.to_owned(), tool);
        }
        let tools = tool_map;
        Self { tools }
    }

    /// Returns the tool definitions sorted by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> =
            self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the requested tools concurrently.
    ///
    /// The returned future doesn't borrow `self`. Results are in the order
    /// of `requests`.
    pub fn execute(
        &self,
        requests: &[ToolCallRequest],
    ) -> impl Future<Output = Vec<ToolResult>> + Send + 'static {
        let span = debug_span!("tool executor");
        let _enter = span.enter();

        let futures: Vec<_> = requests
            .iter()
            .map(|req| -> BoxedToolFuture {
                let Some(tool) = self.tools.get(&req.name) else {
                    warn!("tool not found: {}", req.name);
                    let err = Error::not_found()
                        .with_reason(format!("no tool named `{}`", req.name));
                    return Box::pin(std::future::ready(Err(err)));
                };
                trace!(
                    "spawning a tool ({}) with args: {:?}",
                    req.id, req.arguments
                );
                tool.execute(req.arguments.clone())
            })
            .collect();
        join_all(futures)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{AnyTool, ErrorKind, Tool};

    struct SleepyEcho {
        name: &'static str,
        schema: Value,
    }

    impl SleepyEcho {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                schema: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"],
                }),
            }
        }
    }

    #[derive(serde::Deserialize)]
    struct EchoInput {
        text: String,
        #[serde(default)]
        sleep_ms: u64,
    }

    impl Tool for SleepyEcho {
        type Input = EchoInput;

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echoes the text back after an optional delay"
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move {
                tokio::time::sleep(Duration::from_millis(input.sleep_ms)).await;
                Ok(input.text)
            }
        }
    }

    fn request(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn test_definitions_sorted() {
        let executor = Executor::with_tools(vec![
            Box::new(AnyTool(SleepyEcho::new("lookup_orders"))),
            Box::new(AnyTool(SleepyEcho::new("generate_order_id"))),
        ]);
        let names: Vec<_> = executor
            .definitions()
            .into_iter()
            .map(|def| def.name)
            .collect();
        assert_eq!(names, ["generate_order_id", "lookup_orders"]);
        assert!(!executor.is_empty());
        assert!(Executor::with_tools(vec![]).is_empty());
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let executor =
            Executor::with_tools(vec![Box::new(AnyTool(SleepyEcho::new("echo")))]);
        let results = executor
            .execute(&[
                request("1", "echo", json!({ "text": "slow", "sleep_ms": 30 })),
                request("2", "echo", json!({ "text": "fast" })),
            ])
            .await;
        assert_eq!(results, vec![Ok("slow".to_owned()), Ok("fast".to_owned())]);
    }

    #[tokio::test]
    async fn test_failed_requests() {
        let executor =
            Executor::with_tools(vec![Box::new(AnyTool(SleepyEcho::new("echo")))]);
        let results = executor
            .execute(&[
                request("1", "echo", json!({ "words": 3 })),
                request("2", "web_search", json!({ "query": "weather" })),
            ])
            .await;
        assert_eq!(results.len(), 2);
        let kinds: Vec<_> = results
            .iter()
            .map(|res| res.as_ref().unwrap_err().kind())
            .collect();
        assert_eq!(kinds, [ErrorKind::InvalidInput, ErrorKind::NotFound]);
        assert!(results[1].as_ref().unwrap_err().reason().contains("web_search"));
    }
}
