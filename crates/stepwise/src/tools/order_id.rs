use chrono::{Local, NaiveDateTime};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Tool, ToolResult};

/// Formats an order id as `{table_id}_{drink_name}_{YYYYMMDD_HHMM}`.
pub fn format_order_id(
    table_id: &str,
    drink_name: &str,
    at: NaiveDateTime,
) -> String {
    format!("{table_id}_{drink_name}_{}", at.format("%Y%m%d_%H%M"))
}

/// Generates an order id stamped with the current local time.
#[inline]
pub fn generate_order_id(table_id: &str, drink_name: &str) -> String {
    format_order_id(table_id, drink_name, Local::now().naive_local())
}

#[derive(Deserialize, JsonSchema)]
pub struct OrderIdParameters {
    #[schemars(description = "The table's identifier (e.g. \"T5\").")]
    table_id: String,
    #[schemars(description = "Name of the drink (e.g. \"Latte\").")]
    drink_name: String,
}

/// A tool that generates a unique id for a café order.
pub struct OrderIdTool {
    parameter_schema: Value,
}

impl OrderIdTool {
    /// Creates a new order id tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            parameter_schema: schema_for!(OrderIdParameters).to_value(),
        }
    }
}

impl Default for OrderIdTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for OrderIdTool {
    type Input = OrderIdParameters;

    fn name(&self) -> &str {
        "generate_order_id"
    }

    fn description(&self) -> &str {
        r#"
Generates a unique order ID for a café order.
Returns a string in the format "{table_id}_{drink_name}_{YYYYMMDD_HHMM}"."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: OrderIdParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let order_id = generate_order_id(&input.table_id, &input.drink_name);
        debug!("generated order id {order_id}");
        std::future::ready(Ok(order_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_format_order_id() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|date| date.and_hms_opt(9, 5, 59))
            .unwrap();
        assert_eq!(format_order_id("T5", "Latte", at), "T5_Latte_20240307_0905");
    }

    #[test]
    fn test_stable_within_a_minute() {
        let minute = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|date| date.and_hms_opt(23, 59, 0))
            .unwrap();
        let later = minute + chrono::Duration::seconds(59);
        assert_eq!(
            format_order_id("T2", "Mocha", minute),
            format_order_id("T2", "Mocha", later)
        );
    }

    #[tokio::test]
    async fn test_tool() {
        let tool = OrderIdTool::new();
        assert_eq!(tool.parameter_schema()["required"].as_array().map(Vec::len), Some(2));

        let input = serde_json::from_value(serde_json::json!({
            "table_id": "T5",
            "drink_name": "Latte",
        }))
        .unwrap();
        let order_id = tool.execute(input).await.unwrap();
        let timestamp = order_id.strip_prefix("T5_Latte_").unwrap();
        assert_eq!(timestamp.len(), "YYYYMMDD_HHMM".len());
        assert!(NaiveDateTime::parse_from_str(timestamp, "%Y%m%d_%H%M").is_ok());
    }
}
