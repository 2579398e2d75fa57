use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Error as ToolError, Tool, ToolResult};
use tokio::task::spawn_blocking;

use crate::Error;

#[derive(Deserialize)]
struct OrderRow {
    table_id: String,
    drink_name: String,
    size: String,
}

/// Reads an order table with a `table_id,drink_name,size` header and
/// returns the orders of one table as `"{drink_name} ({size})"`, in table
/// order.
///
/// Other columns are ignored. A missing column or a short row is an
/// error.
pub fn read_orders<R: Read>(
    reader: R,
    table_id: &str,
) -> Result<Vec<String>, Error> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut orders = vec![];
    for row in reader.deserialize::<OrderRow>() {
        let row = row?;
        if row.table_id == table_id {
            orders.push(format!("{} ({})", row.drink_name, row.size));
        }
    }
    Ok(orders)
}

/// Like [`read_orders`], reading the table from a file.
pub fn lookup_orders(
    path: impl AsRef<Path>,
    table_id: &str,
) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    read_orders(file, table_id)
}

#[derive(Deserialize, JsonSchema)]
pub struct OrderLookupParameters {
    #[schemars(description = "The table's identifier (e.g. \"T5\").")]
    table_id: String,
}

/// A tool that lists the current drink orders of a café table.
pub struct OrderLookupTool {
    path: PathBuf,
    parameter_schema: Value,
}

impl OrderLookupTool {
    /// Creates a tool reading the order table at `path`.
    ///
    /// The file is read on every call, so it may change between calls.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            parameter_schema: schema_for!(OrderLookupParameters).to_value(),
        }
    }
}

impl Tool for OrderLookupTool {
    type Input = OrderLookupParameters;

    fn name(&self) -> &str {
        "lookup_orders"
    }

    fn description(&self) -> &str {
        r#"
Retrieves the current drink orders for a café table.
Returns a JSON array of orders, each formatted like "Latte (Large)"."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: OrderLookupParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let path = self.path.clone();
        async move {
            let orders =
                spawn_blocking(move || lookup_orders(&path, &input.table_id))
                    .await
                    .map_err(|_| {
                        ToolError::execution_error()
                            .with_reason("Failed to read the order table")
                    })?
                    .map_err(|err| {
                        ToolError::execution_error().with_reason(err.to_string())
                    })?;
            serde_json::to_string(&orders).map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })
        }
    }
}
