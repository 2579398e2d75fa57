use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use stepwise::knowledge::{Document, HashingEmbedder, InMemoryVectorStore};
use stepwise::scenarios::*;
use stepwise::tools::APPLIANCE_FALLBACK;
use stepwise_model::{ModelMessage, ToolCallRequest};
use stepwise_test_model::{PresetEvent, PresetResponse, TestModelProvider};

fn tool_call(id: &str, name: &str, arguments: Value) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.to_owned(),
        name: name.to_owned(),
        arguments,
    })
}

fn tool_results(messages: &[ModelMessage]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => Some(result.content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_cafe_orders() {
    let dir = tempfile::tempdir().unwrap();
    let orders = dir.path().join("orders.csv");
    std::fs::write(
        &orders,
        "table_id,drink_name,size\nT5,Latte,Large\nT2,Tea,Small\nT5,Mocha,Small\n",
    )
    .unwrap();

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "call_1",
        "lookup_orders",
        json!({ "table_id": "T5" }),
    )]));
    provider.add_response(PresetResponse::with_events([
        tool_call(
            "call_2",
            "generate_order_id",
            json!({ "table_id": "T5", "drink_name": "Latte" }),
        ),
        tool_call(
            "call_3",
            "generate_order_id",
            json!({ "table_id": "T5", "drink_name": "Mocha" }),
        ),
    ]));
    provider.add_response(PresetResponse::text("Two orders for T5."));

    let mut agent = cafe_agent(provider.clone(), &orders).build();
    let answer = agent.run(CAFE_TASK).await.unwrap();
    assert_eq!(answer, "Two orders for T5.");

    let requests = provider.requests();
    let tool_names: Vec<_> =
        requests[0].tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(tool_names, ["generate_order_id", "lookup_orders"]);
    // The model resolves "table 5" to the `T5` id on its own.
    assert!(CAFE_TASK.contains("table 5"));
    assert!(
        requests[0]
            .messages
            .contains(&ModelMessage::User(CAFE_TASK.to_owned()))
    );

    let results = tool_results(&requests[2].messages);
    assert_eq!(results[0], r#"["Latte (Large)","Mocha (Small)"]"#);
    assert!(results[1].starts_with("T5_Latte_"));
    assert!(results[2].starts_with("T5_Mocha_"));

    let full_code = agent.memory().full_code();
    let calls: Vec<_> = full_code.lines().collect();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], r#"lookup_orders({"table_id":"T5"})"#);
    assert!(calls[1].starts_with("generate_order_id({"));
    assert!(calls[2].contains(r#""drink_name":"Mocha""#));
}

#[tokio::test]
async fn test_cafe_missing_table_is_a_tool_error() {
    let dir = tempfile::tempdir().unwrap();

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "call_1",
        "lookup_orders",
        json!({ "table_id": "T5" }),
    )]));
    provider.add_response(PresetResponse::text("The order table is missing."));

    let mut agent =
        cafe_agent(provider.clone(), dir.path().join("orders.csv")).build();
    agent.run(CAFE_TASK).await.unwrap();

    let step = agent.memory().action_steps().next().unwrap();
    assert!(step.observations[0].is_error);
    assert!(step.observations[0].content.starts_with("Error: failed to read"));
}

#[tokio::test]
async fn test_appliance_search() {
    let mut store = InMemoryVectorStore::new(HashingEmbedder::default());
    store
        .add_documents(vec![
            Document::new("AC error E1: the indoor sensor failed. Check the sensor cable, then reset the unit."),
            Document::new("Dishwasher: clean the spray arms monthly."),
        ])
        .await
        .unwrap();

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "call_1",
        "appliance_manual_search",
        json!({ "query": "AC error E1 sensor" }),
    )]));
    provider.add_response(PresetResponse::text("Check the sensor cable."));

    let mut agent = appliance_agent(provider.clone(), Arc::new(store)).build();
    agent.run(APPLIANCE_QUESTION).await.unwrap();

    let requests = provider.requests();
    assert!(requests[0].messages.iter().any(|msg| matches!(
        msg,
        ModelMessage::System(prompt) if prompt.ends_with(APPLIANCE_INSTRUCTIONS)
    )));
    let results = tool_results(&requests[1].messages);
    assert!(results[0].starts_with("AC error E1"));
    assert!(results[0].contains("\n\nDishwasher"));
}

#[tokio::test]
async fn test_appliance_gives_up_after_six_steps() {
    let store = InMemoryVectorStore::new(HashingEmbedder::default());
    let mut provider = TestModelProvider::default();
    for idx in 0..6 {
        provider.add_response(PresetResponse::with_events([tool_call(
            &format!("call_{idx}"),
            "appliance_manual_search",
            json!({ "query": "error E7" }),
        )]));
    }
    provider.add_response(PresetResponse::text("The manuals don't cover E7."));

    let mut agent = appliance_agent(provider.clone(), Arc::new(store)).build();
    let answer = agent.run("What does E7 mean?").await.unwrap();
    assert_eq!(answer, "The manuals don't cover E7.");
    assert_eq!(provider.requests().len(), 7);

    let step = agent.memory().action_steps().next().unwrap();
    assert_eq!(step.observations[0].content, APPLIANCE_FALLBACK);
}

#[tokio::test]
async fn test_coach_step_tracking() {
    let store = InMemoryVectorStore::new(HashingEmbedder::default());
    let mut provider = TestModelProvider::default();
    provider.add_response(
        PresetResponse::with_events([tool_call(
            "call_1",
            "scouting_report_search",
            json!({ "query": "point guard tendencies" }),
        )])
        .with_usage(300, 20),
    );
    provider.add_response(
        PresetResponse::text("Trap him off ball screens.").with_usage(450, 60),
    );

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut agent = coach_agent(provider, Arc::new(store), {
        let lines = Arc::clone(&lines);
        move |line: &str| lines.lock().unwrap().push(line.to_owned())
    })
    .build();
    agent.run(COACH_QUESTION).await.unwrap();

    assert_eq!(
        *lines.lock().unwrap(),
        [
            "Step 1: Analyzing basketball data!",
            "Step 2: Analyzing basketball data!",
            "Analysis complete! Total tokens used: 510",
        ]
    );
}

#[tokio::test]
async fn test_travel_memory() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::text("Noted."));
    provider.add_response(PresetResponse::text("It's ZX9Q2L."));

    let mut agent = travel_agent(provider.clone()).build();
    agent.run(TRAVEL_FACT).await.unwrap();
    let answer = agent.follow_up(TRAVEL_QUESTION).await.unwrap();
    assert_eq!(answer, "It's ZX9Q2L.");
    assert_eq!(agent.memory().full_code(), "");

    let requests = provider.requests();
    assert!(requests[1].messages.contains(&ModelMessage::User(TRAVEL_FACT.to_owned())));
}

#[tokio::test]
async fn test_admissions_delegation() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "call_1",
        "essay_writing_agent",
        json!({ "task": "Outline a CS personal statement" }),
    )]));
    // Served to the essay writing agent.
    provider.add_response(PresetResponse::text("Open with a project story."));
    provider.add_response(PresetResponse::text("Here is the plan."));

    let mut agent = admissions_agent(provider.clone()).unwrap().build();
    assert_eq!(agent.run(ADMISSIONS_TASK).await.unwrap(), "Here is the plan.");

    let requests = provider.requests();
    let tool_names: Vec<_> =
        requests[0].tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(tool_names, ["essay_writing_agent", "school_research_agent"]);
    assert!(requests[1].tools.is_empty());
    assert_eq!(
        tool_results(&requests[2].messages),
        ["Here is the final answer from your managed agent 'essay_writing_agent':\nOpen with a project story."]
    );
}
