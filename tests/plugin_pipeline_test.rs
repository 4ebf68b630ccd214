//! Exercises the plugin pipeline through the `Agent` facade: ordering,
//! failure isolation, and attach/detach between turns.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use agent_runtime_core::testing::ScriptedProvider;
use agent_runtime_core::{Agent, AgentConfig, Message, ModelSpec, Plugin, Priority, ProviderCallContext, Result};

fn model() -> ModelSpec {
    ModelSpec {
        provider: "fake".to_string(),
        model: "fake-model".to_string(),
        temperature: None,
        max_tokens: None,
        top_p: None,
        system_message: None,
    }
}

struct RecordingPlugin {
    name: &'static str,
    priority: Priority,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        self.name
    }
    fn priority(&self) -> Priority {
        self.priority
    }
    async fn after_provider_call(&self, _ctx: &ProviderCallContext, _response: &Message) -> Result<()> {
        self.log.lock().unwrap().push(self.name.to_string());
        Ok(())
    }
}

struct FailingPlugin;
#[async_trait]
impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        "failing"
    }
    fn priority(&self) -> Priority {
        Priority::CRITICAL
    }
    async fn after_provider_call(&self, _ctx: &ProviderCallContext, _response: &Message) -> Result<()> {
        Err(agent_runtime_core::Error::plugin("failing", "boom"))
    }
}

#[tokio::test]
async fn test_plugins_run_in_priority_order_and_survive_failures() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = Arc::new(ScriptedProvider::new("fake", vec![Message::assistant("ok")]));
    let config = AgentConfig::builder()
        .name("agent")
        .ai_provider(provider)
        .default_model(model())
        .plugin(Arc::new(FailingPlugin))
        .plugin(Arc::new(RecordingPlugin {
            name: "low",
            priority: Priority::LOW,
            log: log.clone(),
        }))
        .plugin(Arc::new(RecordingPlugin {
            name: "high",
            priority: Priority::HIGH,
            log: log.clone(),
        }))
        .build()
        .unwrap();
    let agent = Agent::new(config);

    let answer = agent.run("hi", None).await.unwrap();
    assert_eq!(answer, "ok");
    assert_eq!(*log.lock().unwrap(), vec!["high".to_string(), "low".to_string()]);
}

#[tokio::test]
async fn test_attaching_a_plugin_between_turns_does_not_alter_prior_messages() {
    let provider = Arc::new(ScriptedProvider::new(
        "fake",
        vec![Message::assistant("first"), Message::assistant("second")],
    ));
    let config = AgentConfig::builder()
        .name("agent")
        .ai_provider(provider)
        .default_model(model())
        .build()
        .unwrap();
    let agent = Agent::new(config);

    agent.run("one", None).await.unwrap();
    let history_before = agent.get_history().await;

    let count = Arc::new(AtomicU32::new(0));
    struct CountingPlugin(Arc<AtomicU32>);
    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            "counter"
        }
        async fn before_run(&self, _input: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
    agent.add_plugin(Arc::new(CountingPlugin(count.clone()))).await.unwrap();

    agent.run("two", None).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    agent.remove_plugin("counter").await.unwrap();
    agent.run("ignored", None).await.ok();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // messages from before attach are untouched by the later plugin attach/detach
    let history_after_first_two = &agent.get_history().await[..history_before.len()];
    assert_eq!(history_after_first_two, history_before.as_slice());
}
