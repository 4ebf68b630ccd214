//! A logging plugin attached to an agent, observing every provider call.
//!
//! Run with: `cargo run --example plugin_hooks`

use std::sync::Arc;

use async_trait::async_trait;

use agent_runtime_core::testing::ScriptedProvider;
use agent_runtime_core::{
    Agent, AgentConfig, Message, ModelSpec, Plugin, Priority, ProviderCallContext, Result,
};

struct LoggingPlugin;

#[async_trait]
impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        "logger"
    }

    fn priority(&self) -> Priority {
        Priority::HIGH
    }

    async fn before_provider_call(&self, ctx: &ProviderCallContext) -> Result<()> {
        println!("-> calling provider '{}'", ctx.provider_name);
        Ok(())
    }

    async fn after_provider_call(&self, ctx: &ProviderCallContext, response: &Message) -> Result<()> {
        println!("<- '{}' responded with role {}", ctx.provider_name, response.role());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::new(
        "local",
        vec![Message::assistant("Logged and answered.")],
    ));

    let config = AgentConfig::builder()
        .name("observed-agent")
        .ai_provider(provider)
        .default_model(ModelSpec {
            provider: "local".to_string(),
            model: "local-model".to_string(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            system_message: None,
        })
        .plugin(Arc::new(LoggingPlugin))
        .build()?;

    let agent = Agent::new(config);
    let answer = agent.run("Say hello", None).await?;
    println!("final answer: {answer}");

    Ok(())
}
