//! An agent with one registered tool, answering a question that requires a
//! tool round trip.
//!
//! Run with: `cargo run --example tool_calling`

use std::collections::HashMap;
use std::sync::Arc;

use agent_runtime_core::testing::ScriptedProvider;
use agent_runtime_core::{tool, Agent, AgentConfig, Message, ModelSpec, ObjectSchema, ParameterSchema, ToolCall};

fn weather_tool() -> Arc<dyn agent_runtime_core::Tool> {
    let mut properties = HashMap::new();
    properties.insert(
        "city".to_string(),
        ParameterSchema::String {
            description: Some("The city to look up".to_string()),
            r#enum: None,
            pattern: None,
            format: None,
            default: None,
        },
    );
    let schema = ObjectSchema {
        properties,
        required: vec!["city".to_string()],
    };

    Arc::new(tool("get_weather", "returns the current weather for a city", schema, |params, _ctx| {
        Box::pin(async move {
            let city = params["city"].as_str().unwrap_or("unknown");
            Ok(serde_json::json!(format!("It's sunny in {city}.")))
        })
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let call = ToolCall::new("call-1", "get_weather", r#"{"city":"Lisbon"}"#);
    let provider = Arc::new(ScriptedProvider::new(
        "local",
        vec![
            Message::assistant_tool_calls(None, vec![call]),
            Message::assistant("It's sunny in Lisbon today!"),
        ],
    ));

    let config = AgentConfig::builder()
        .name("weather-agent")
        .ai_provider(provider)
        .default_model(ModelSpec {
            provider: "local".to_string(),
            model: "local-model".to_string(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            system_message: None,
        })
        .tool(weather_tool())
        .build()?;

    let agent = Agent::new(config);
    let answer = agent.run("What's the weather in Lisbon?", None).await?;
    println!("{answer}");

    for message in agent.get_history().await {
        println!("[{}] {:?}", message.role(), message);
    }

    Ok(())
}
