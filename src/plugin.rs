//! Plugin pipeline: an ordered, hook-based observer system with
//! enable/disable policy, priority/category classification, and failure
//! isolation.
//!
//! Named hook points fire in sequential, priority order with per-plugin
//! metadata (category, enabled state). A plugin hook can never abort a
//! turn on its own — failures are isolated per plugin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::ChatOptions;

/// Advisory classification for a plugin, used for ordering and introspection
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Monitoring,
    Logging,
    Storage,
    Notification,
    Security,
    Performance,
    ErrorHandling,
    Limits,
    EventProcessing,
    Custom,
}

/// A plugin's run priority. Higher values run first; spec §3 names four
/// bands (`critical=1000 … minimal=100`) as guidance, not a closed set —
/// any `i32` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub i32);

impl Priority {
    pub const CRITICAL: Priority = Priority(1000);
    pub const HIGH: Priority = Priority(750);
    pub const NORMAL: Priority = Priority(500);
    pub const LOW: Priority = Priority(250);
    pub const MINIMAL: Priority = Priority(100);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// Context passed to `before_provider_call`/`after_provider_call` hooks.
#[derive(Debug, Clone)]
pub struct ProviderCallContext {
    pub provider_name: String,
    pub options: ChatOptions,
}

/// Context passed to `before_tool_call`/`after_tool_call` hooks.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_name: String,
    pub tool_call_id: String,
    pub arguments: serde_json::Value,
}

/// The subset of lifecycle points a [`Plugin`] may observe. Every method has
/// a default no-op body; a plugin implements only the hooks it needs (spec
/// §4.5/§6: "unimplemented hooks are skipped").
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str {
        "0.1.0"
    }
    fn category(&self) -> PluginCategory {
        PluginCategory::Custom
    }
    fn priority(&self) -> Priority {
        Priority::NORMAL
    }

    /// Whether the plugin is currently enabled. Checked fresh on every hook
    /// dispatch, so a plugin may disable itself mid-lifecycle (e.g. after a
    /// `silent`/`none` strategy resolves during `initialize`).
    fn enabled(&self) -> bool {
        true
    }

    /// Run once when the plugin is attached to the agent's execution
    /// service. Errors here are surfaced to the caller of `add_plugin`
    /// (registration itself is not isolated — only hook execution is).
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn before_run(&self, _input: &str) -> Result<()> {
        Ok(())
    }
    async fn after_run(&self, _output: &str) -> Result<()> {
        Ok(())
    }
    async fn before_provider_call(&self, _ctx: &ProviderCallContext) -> Result<()> {
        Ok(())
    }
    async fn after_provider_call(&self, _ctx: &ProviderCallContext, _response: &Message) -> Result<()> {
        Ok(())
    }
    async fn before_tool_call(&self, _ctx: &ToolCallContext) -> Result<()> {
        Ok(())
    }
    async fn after_tool_call(&self, _ctx: &ToolCallContext, _result: &Result<serde_json::Value>) -> Result<()> {
        Ok(())
    }
    /// Notified for any error that aborts the turn. Failures from
    /// this hook itself are swallowed.
    async fn on_error(&self, _error: &Error) -> Result<()> {
        Ok(())
    }

    /// Whether this plugin wants to observe module lifecycle events (spec
    /// §4.5 "Module-event subscription"). Default: no.
    fn subscribes_to_module_events(&self) -> bool {
        false
    }

    /// Bound at plugin attach time when [`Plugin::subscribes_to_module_events`]
    /// is `true`.
    async fn subscribe_to_module_events(&self, _bus: &crate::event_bus::EventBus) -> Result<()> {
        Ok(())
    }

    /// Unbound on plugin removal or agent destroy.
    async fn unsubscribe_from_module_events(&self, _bus: &crate::event_bus::EventBus) -> Result<()> {
        Ok(())
    }
}

/// Per-plugin bookkeeping the pipeline maintains alongside the plugin
/// itself: an error counter incremented whenever one of its hooks fails,
/// surfaced through the agent's stats snapshot for introspection.
#[derive(Default)]
struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    error_count: AtomicU64,
}

/// Which hook point is being fanned out; used only for the internal
/// dispatch helper and logging, never part of the public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookPoint {
    BeforeRun,
    AfterRun,
    BeforeProviderCall,
    AfterProviderCall,
    BeforeToolCall,
    AfterToolCall,
    OnError,
}

impl HookPoint {
    fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeRun => "beforeRun",
            HookPoint::AfterRun => "afterRun",
            HookPoint::BeforeProviderCall => "beforeProviderCall",
            HookPoint::AfterProviderCall => "afterProviderCall",
            HookPoint::BeforeToolCall => "beforeToolCall",
            HookPoint::AfterToolCall => "afterToolCall",
            HookPoint::OnError => "onError",
        }
    }
}

/// Ordered, hook-based observer pipeline. Registration is idempotent by
/// plugin name; hooks run sequentially in priority-desc,
/// name-asc order with failures isolated per plugin.
pub struct PluginPipeline {
    entries: HashMap<String, PluginEntry>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        PluginPipeline {
            entries: HashMap::new(),
        }
    }

    /// Register a plugin. Idempotent by name: registering the same name
    /// twice replaces neither the existing entry nor its error counter.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        self.entries.entry(name).or_insert_with(|| PluginEntry {
            plugin,
            error_count: AtomicU64::new(0),
        });
    }

    pub fn unregister(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.entries.get(name).map(|e| e.plugin.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.ordered().iter().map(|e| e.plugin.name().to_string()).collect()
    }

    /// Total hook failures recorded for `name` since registration.
    pub fn error_count(&self, name: &str) -> u64 {
        self.entries
            .get(name)
            .map(|e| e.error_count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Plugins ordered by priority descending, then name ascending
    ///.
    fn ordered(&self) -> Vec<&PluginEntry> {
        let mut entries: Vec<&PluginEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.plugin
                .priority()
                .cmp(&a.plugin.priority())
                .then_with(|| a.plugin.name().cmp(b.plugin.name()))
        });
        entries
    }

    async fn run_initializers(&self) -> Result<()> {
        for entry in self.ordered() {
            entry.plugin.initialize().await?;
        }
        Ok(())
    }

    /// Attach every registered plugin: run `initialize()` for each, in
    /// priority order. Unlike hook fan-out, initialize failures are not
    /// isolated — spec §4.1 treats plugin attach as part of agent init,
    /// which fails the whole init on error.
    pub async fn initialize_all(&self) -> Result<()> {
        self.run_initializers().await
    }

    async fn fan_out<'a, F, Fut>(&'a self, point: HookPoint, call: F)
    where
        F: Fn(&'a Arc<dyn Plugin>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        for entry in self.ordered() {
            if !entry.plugin.enabled() {
                continue;
            }
            if let Err(err) = call(&entry.plugin).await {
                entry.error_count.fetch_add(1, Ordering::SeqCst);
                log::warn!(
                    "plugin '{}' hook '{}' failed: {}",
                    entry.plugin.name(),
                    point.as_str(),
                    err
                );
            }
        }
    }

    pub async fn before_run(&self, input: &str) {
        self.fan_out(HookPoint::BeforeRun, |p| p.before_run(input)).await;
    }

    pub async fn after_run(&self, output: &str) {
        self.fan_out(HookPoint::AfterRun, |p| p.after_run(output)).await;
    }

    pub async fn before_provider_call(&self, ctx: &ProviderCallContext) {
        self.fan_out(HookPoint::BeforeProviderCall, |p| p.before_provider_call(ctx))
            .await;
    }

    pub async fn after_provider_call(&self, ctx: &ProviderCallContext, response: &Message) {
        self.fan_out(HookPoint::AfterProviderCall, |p| p.after_provider_call(ctx, response))
            .await;
    }

    pub async fn before_tool_call(&self, ctx: &ToolCallContext) {
        self.fan_out(HookPoint::BeforeToolCall, |p| p.before_tool_call(ctx)).await;
    }

    pub async fn after_tool_call(&self, ctx: &ToolCallContext, result: &Result<serde_json::Value>) {
        self.fan_out(HookPoint::AfterToolCall, |p| p.after_tool_call(ctx, result))
            .await;
    }

    /// `onError` hooks never abort and their own failures are swallowed
    /// entirely (not even counted) — spec §4.5.4 "`onError` hooks
    /// themselves, if failing, are swallowed".
    pub async fn on_error(&self, error: &Error) {
        for entry in self.ordered() {
            if !entry.plugin.enabled() {
                continue;
            }
            let _ = entry.plugin.on_error(error).await;
        }
    }

    /// Bind every plugin that opts in to module events. Called
    /// once at plugin-attach time during agent init.
    pub async fn subscribe_module_events(&self, bus: &crate::event_bus::EventBus) {
        for entry in self.ordered() {
            if entry.plugin.subscribes_to_module_events() {
                if let Err(err) = entry.plugin.subscribe_to_module_events(bus).await {
                    log::warn!("plugin '{}' failed to subscribe to module events: {}", entry.plugin.name(), err);
                }
            }
        }
    }

    /// Unbind every module-event subscriber, called on plugin removal or
    /// agent destroy.
    pub async fn unsubscribe_module_events(&self, bus: &crate::event_bus::EventBus) {
        for entry in self.ordered() {
            if entry.plugin.subscribes_to_module_events() {
                let _ = entry.plugin.unsubscribe_from_module_events(bus).await;
            }
        }
    }
}

impl Default for PluginPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32};

    struct RecordingPlugin {
        name: &'static str,
        priority: Priority,
        calls: Arc<std::sync::Mutex<Vec<String>>>,
        fail: bool,
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
            if self.fail {
                return Err(Error::plugin(self.name, "boom"));
            }
            self.calls.lock().unwrap().push(self.name.to_string());
            Ok(())
        }
    }

    fn ctx() -> ProviderCallContext {
        ProviderCallContext {
            provider_name: "fake".to_string(),
            options: ChatOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_priority_desc_name_asc_order() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(RecordingPlugin {
            name: "b",
            priority: Priority(500),
            calls: calls.clone(),
            fail: false,
        }));
        pipeline.register(Arc::new(RecordingPlugin {
            name: "a",
            priority: Priority(500),
            calls: calls.clone(),
            fail: false,
        }));
        pipeline.register(Arc::new(RecordingPlugin {
            name: "z",
            priority: Priority(900),
            calls: calls.clone(),
            fail: false,
        }));

        pipeline.after_provider_call(&ctx(), &Message::assistant("x")).await;
        assert_eq!(*calls.lock().unwrap(), vec!["z", "a", "b"]);
    }

    #[tokio::test]
    async fn test_failing_hook_is_isolated_and_counted() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(RecordingPlugin {
            name: "p1",
            priority: Priority(900),
            calls: calls.clone(),
            fail: true,
        }));
        pipeline.register(Arc::new(RecordingPlugin {
            name: "p2",
            priority: Priority(500),
            calls: calls.clone(),
            fail: false,
        }));

        pipeline.after_provider_call(&ctx(), &Message::assistant("x")).await;
        assert_eq!(*calls.lock().unwrap(), vec!["p2"]);
        assert_eq!(pipeline.error_count("p1"), 1);
        assert_eq!(pipeline.error_count("p2"), 0);
    }

    #[tokio::test]
    async fn test_registration_is_idempotent_by_name() {
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(RecordingPlugin {
            name: "p1",
            priority: Priority(500),
            calls: Arc::new(std::sync::Mutex::new(Vec::new())),
            fail: false,
        }));
        pipeline.register(Arc::new(RecordingPlugin {
            name: "p1",
            priority: Priority(999),
            calls: Arc::new(std::sync::Mutex::new(Vec::new())),
            fail: false,
        }));
        assert_eq!(pipeline.names().len(), 1);
        assert_eq!(pipeline.get("p1").unwrap().priority(), Priority(500));
    }

    struct DisabledPlugin {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Plugin for DisabledPlugin {
        fn name(&self) -> &str {
            "disabled"
        }
        fn enabled(&self) -> bool {
            false
        }
        async fn after_provider_call(&self, _ctx: &ProviderCallContext, _response: &Message) -> Result<()> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_disabled_plugin_hooks_do_not_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(DisabledPlugin { ran: ran.clone() }));
        pipeline.after_provider_call(&ctx(), &Message::assistant("x")).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    struct FailingOnError;
    #[async_trait]
    impl Plugin for FailingOnError {
        fn name(&self) -> &str {
            "failing-on-error"
        }
        async fn on_error(&self, _error: &Error) -> Result<()> {
            Err(Error::plugin("failing-on-error", "also broken"))
        }
    }

    #[tokio::test]
    async fn test_on_error_hook_failures_are_swallowed() {
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(FailingOnError));
        // Must not panic even though the hook itself returns an error.
        pipeline.on_error(&Error::cancellation("stopped")).await;
        assert_eq!(pipeline.error_count("failing-on-error"), 0);
    }

    struct CountingInitPlugin {
        count: Arc<AtomicU32>,
    }
    #[async_trait]
    impl Plugin for CountingInitPlugin {
        fn name(&self) -> &str {
            "counting-init"
        }
        async fn initialize(&self) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initialize_all_runs_every_plugin_once() {
        let count = Arc::new(AtomicU32::new(0));
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(CountingInitPlugin { count: count.clone() }));
        pipeline.initialize_all().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct ModuleEventPlugin {
        subscribed: Arc<AtomicBool>,
    }
    #[async_trait]
    impl Plugin for ModuleEventPlugin {
        fn name(&self) -> &str {
            "module-watcher"
        }
        fn subscribes_to_module_events(&self) -> bool {
            true
        }
        async fn subscribe_to_module_events(&self, _bus: &crate::event_bus::EventBus) -> Result<()> {
            self.subscribed.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn unsubscribe_from_module_events(&self, _bus: &crate::event_bus::EventBus) -> Result<()> {
            self.subscribed.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_plugins_opting_in_are_bound_and_unbound_from_module_events() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let mut pipeline = PluginPipeline::new();
        pipeline.register(Arc::new(ModuleEventPlugin { subscribed: subscribed.clone() }));
        let bus = crate::event_bus::EventBus::new();

        pipeline.subscribe_module_events(&bus).await;
        assert!(subscribed.load(Ordering::SeqCst));

        pipeline.unsubscribe_module_events(&bus).await;
        assert!(!subscribed.load(Ordering::SeqCst));
    }
}
