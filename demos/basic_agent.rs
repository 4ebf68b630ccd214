//! A minimal agent: one scripted provider, no tools, a single turn.
//!
//! Run with: `cargo run --example basic_agent`

use std::sync::Arc;

use agent_runtime_core::testing::ScriptedProvider;
use agent_runtime_core::{Agent, AgentConfig, Message, ModelSpec};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let provider = Arc::new(ScriptedProvider::new(
        "local",
        vec![Message::assistant("Hello! How can I help you today?")],
    ));

    let config = AgentConfig::builder()
        .name("demo-agent")
        .ai_provider(provider)
        .default_model(ModelSpec {
            provider: "local".to_string(),
            model: "local-model".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
            top_p: None,
            system_message: Some("You are a concise, friendly assistant.".to_string()),
        })
        .build()?;

    let agent = Agent::new(config);
    let answer = agent.run("Hi there!", None).await?;
    println!("{answer}");

    Ok(())
}
