//! End-to-end exercises of the execution loop through the `Agent` facade:
//! multi-turn conversations, tool round trips, and budget exhaustion.

use std::sync::Arc;

use agent_runtime_core::testing::{RepeatingToolCallProvider, ScriptedProvider};
use agent_runtime_core::{tool, Agent, AgentConfig, Message, ModelSpec, ObjectSchema};

fn model(provider: &str) -> ModelSpec {
    ModelSpec {
        provider: provider.to_string(),
        model: "fake-model".to_string(),
        temperature: None,
        max_tokens: None,
        top_p: None,
        system_message: Some("be terse".to_string()),
    }
}

fn add_tool() -> Arc<dyn agent_runtime_core::Tool> {
    let mut properties = std::collections::HashMap::new();
    properties.insert(
        "a".to_string(),
        agent_runtime_core::ParameterSchema::Number {
            description: None,
            minimum: None,
            maximum: None,
            default: None,
        },
    );
    properties.insert(
        "b".to_string(),
        agent_runtime_core::ParameterSchema::Number {
            description: None,
            minimum: None,
            maximum: None,
            default: None,
        },
    );
    let schema = ObjectSchema {
        properties,
        required: vec!["a".to_string(), "b".to_string()],
    };
    Arc::new(tool("add", "adds two numbers", schema, |params, _ctx| {
        Box::pin(async move {
            let a = params["a"].as_f64().unwrap_or(0.0);
            let b = params["b"].as_f64().unwrap_or(0.0);
            Ok(serde_json::json!(a + b))
        })
    }))
}

#[tokio::test]
async fn test_multi_turn_conversation_accumulates_history() {
    let provider = Arc::new(ScriptedProvider::new(
        "fake",
        vec![Message::assistant("2"), Message::assistant("4")],
    ));
    let config = AgentConfig::builder()
        .name("calculator")
        .ai_provider(provider)
        .default_model(model("fake"))
        .build()
        .unwrap();
    let agent = Agent::new(config);

    let first = agent.run("1+1?", None).await.unwrap();
    let second = agent.run("double that", None).await.unwrap();

    assert_eq!(first, "2");
    assert_eq!(second, "4");

    let history = agent.get_history().await;
    // system + 2x(user, assistant)
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].role(), "system");
}

#[tokio::test]
async fn test_tool_call_round_trip_through_agent() {
    let call = agent_runtime_core::ToolCall::new("t1", "add", r#"{"a":2,"b":3}"#);
    let provider = Arc::new(ScriptedProvider::new(
        "fake",
        vec![
            Message::assistant_tool_calls(None, vec![call]),
            Message::assistant("5"),
        ],
    ));
    let config = AgentConfig::builder()
        .name("calculator")
        .ai_provider(provider)
        .default_model(model("fake"))
        .tool(add_tool())
        .build()
        .unwrap();
    let agent = Agent::new(config);

    let answer = agent.run("what is 2+3?", None).await.unwrap();
    assert_eq!(answer, "5");

    let history = agent.get_history().await;
    assert!(history.iter().any(|m| m.role() == "tool"));
}

#[tokio::test]
async fn test_tool_budget_exhaustion_is_reported_through_agent() {
    let provider = Arc::new(RepeatingToolCallProvider::new("fake", "add", r#"{"a":1,"b":1}"#));
    let config = AgentConfig::builder()
        .name("looping")
        .ai_provider(provider)
        .default_model(ModelSpec {
            system_message: None,
            ..model("fake")
        })
        .tool(add_tool())
        .max_tool_turns(2)
        .build()
        .unwrap();
    let agent = Agent::new(config);

    let answer = agent.run("loop please", None).await.unwrap();
    assert!(!answer.is_empty());

    let history = agent.get_history().await;
    let tool_turns = history.iter().filter(|m| m.role() == "tool").count();
    assert!(tool_turns >= 2);
}

#[tokio::test]
async fn test_clearing_history_does_not_affect_a_later_turn() {
    let provider = Arc::new(ScriptedProvider::new(
        "fake",
        vec![Message::assistant("first"), Message::assistant("second")],
    ));
    let config = AgentConfig::builder()
        .name("agent")
        .ai_provider(provider)
        .default_model(ModelSpec { system_message: None, ..model("fake") })
        .build()
        .unwrap();
    let agent = Agent::new(config);

    agent.run("one", None).await.unwrap();
    agent.clear_history().await;
    assert!(agent.get_history().await.is_empty());

    let answer = agent.run("two", None).await.unwrap();
    assert_eq!(answer, "second");
    assert_eq!(agent.get_history().await.len(), 2);
}
