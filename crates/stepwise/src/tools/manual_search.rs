use std::sync::Arc;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Error as ToolError, Tool, ToolResult};

use crate::Error;
use crate::knowledge::VectorStore;

/// Returned by the appliance manual search when nothing matches.
pub const APPLIANCE_FALLBACK: &str = "No relevant manual sections found.";
/// Returned by the scouting report search when nothing matches.
pub const SCOUTING_FALLBACK: &str = "No relevant scouting report sections found.";

const DEFAULT_K: usize = 3;

/// Searches `store` and joins the `k` closest sections with a blank line.
///
/// Returns `fallback` when the joined text is empty.
pub async fn search_sections(
    store: &dyn VectorStore,
    query: &str,
    k: usize,
    fallback: &str,
) -> Result<String, Error> {
    let docs = store.similarity_search(query, k).await?;
    debug!("{} sections found for {query:?}", docs.len());
    let joined = docs
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if joined.is_empty() {
        Ok(fallback.to_owned())
    } else {
        Ok(joined)
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

/// A tool that searches a set of documents, such as appliance manuals or
/// scouting reports, held in a vector store.
pub struct ManualSearchTool {
    name: String,
    description: String,
    fallback: String,
    k: usize,
    store: Arc<dyn VectorStore>,
    parameter_schema: Value,
}

impl ManualSearchTool {
    /// Creates a search tool with its own name, description and fallback
    /// text. The description should tell the model what to ask.
    pub fn new(
        store: Arc<dyn VectorStore>,
        name: impl Into<String>,
        description: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fallback: fallback.into(),
            k: DEFAULT_K,
            store,
            parameter_schema: schema_for!(SearchParameters).to_value(),
        }
    }

    /// The `appliance_manual_search` tool.
    pub fn appliance(store: Arc<dyn VectorStore>) -> Self {
        Self::new(
            store,
            "appliance_manual_search",
            "Search appliance manuals for maintenance and usage information. \
             The query is a question about appliance operation.",
            APPLIANCE_FALLBACK,
        )
    }

    /// The `scouting_report_search` tool.
    pub fn scouting_reports(store: Arc<dyn VectorStore>) -> Self {
        Self::new(
            store,
            "scouting_report_search",
            "Search basketball scouting reports for player stats, scouting \
             insights and game strategies. The query is a question about a \
             player, a team or a game plan.",
            SCOUTING_FALLBACK,
        )
    }

    /// Sets how many sections a search returns. Defaults to 3.
    #[inline]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }
}

impl Tool for ManualSearchTool {
    type Input = SearchParameters;

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
        input: SearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let store = Arc::clone(&self.store);
        let k = self.k;
        let fallback = self.fallback.clone();
        async move {
            search_sections(store.as_ref(), &input.query, k, &fallback)
                .await
                .map_err(|err| {
                    ToolError::execution_error().with_reason(err.to_string())
                })
        }
    }
}
