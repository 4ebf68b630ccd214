//! The Agent Facade: the caller-facing surface that owns one agent's
//! subsystems and drives their lifecycle.
//!
//! [`AgentConfig`] is builder-validated and fail-fast; [`Agent`] defers
//! construction work behind a [`tokio::sync::OnceCell`] single-flight
//! guard — every subsystem (provider registry, tool registry, module
//! registry, plugin pipeline) spins up on the first `run`/`run_stream`
//! call rather than at construction time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use crate::error::{Error, Result};
use crate::event_bus::EventBus;
use crate::execution::{self, ChunkStream, ModelSpec, RunOptions, DEFAULT_MAX_TOOL_TURNS};
use crate::history::{HistoryManager, HistoryStats};
use crate::ids::generate_conversation_id;
use crate::logger::LogLevel;
use crate::message::Message;
use crate::module::{Module, ModuleContext, ModuleExecutionResult, ModuleRegistry, RegisterOptions};
use crate::plugin::{Plugin, PluginPipeline};
use crate::provider::{Provider, ProviderRegistry};
use crate::tool::Tool;
use crate::tool_registry::ToolRegistry;

/// Validated construction input for an [`Agent`].
///
/// Only ever produced by [`AgentConfigBuilder::build`], which enforces every
/// invariant spec §4.1 "Config validation" names before an `AgentConfig`
/// value can exist at all.
#[derive(Clone)]
pub struct AgentConfig {
    pub name: String,
    pub ai_providers: Vec<Arc<dyn Provider>>,
    pub default_model: ModelSpec,
    pub tools: Vec<Arc<dyn Tool>>,
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub modules: Vec<Arc<dyn Module>>,
    pub conversation_id: Option<String>,
    pub logging: LogLevel,
    pub max_tool_turns: usize,
    pub history_max_size: Option<usize>,
}

/// Builder for [`AgentConfig`]. Required: `name`, at least one `ai_provider`,
/// `default_model`.
pub struct AgentConfigBuilder {
    name: Option<String>,
    ai_providers: Vec<Arc<dyn Provider>>,
    default_model: Option<ModelSpec>,
    tools: Vec<Arc<dyn Tool>>,
    plugins: Vec<Arc<dyn Plugin>>,
    modules: Vec<Arc<dyn Module>>,
    conversation_id: Option<String>,
    logging: LogLevel,
    max_tool_turns: usize,
    history_max_size: Option<usize>,
}

impl AgentConfig {
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::new()
    }
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentConfigBuilder {
    pub fn new() -> Self {
        AgentConfigBuilder {
            name: None,
            ai_providers: Vec::new(),
            default_model: None,
            tools: Vec::new(),
            plugins: Vec::new(),
            modules: Vec::new(),
            conversation_id: None,
            logging: LogLevel::default(),
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
            history_max_size: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ai_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.ai_providers.push(provider);
        self
    }

    pub fn ai_providers(mut self, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.ai_providers.extend(providers);
        self
    }

    pub fn default_model(mut self, model: ModelSpec) -> Self {
        self.default_model = Some(model);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn logging(mut self, level: LogLevel) -> Self {
        self.logging = level;
        self
    }

    pub fn max_tool_turns(mut self, max: usize) -> Self {
        self.max_tool_turns = max;
        self
    }

    pub fn history_max_size(mut self, max: usize) -> Self {
        self.history_max_size = Some(max);
        self
    }

    /// Validate and build the config. Fails with `ConfigurationError` for
    /// every case spec §4.1 names: missing `name`, empty `aiProviders`,
    /// missing `defaultModel`, duplicate provider names, or
    /// `defaultModel.provider` absent from the registered providers.
    pub fn build(self) -> Result<AgentConfig> {
        let name = match self.name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(Error::configuration("AgentConfig.name is required")),
        };

        if self.ai_providers.is_empty() {
            return Err(Error::configuration("aiProviders must not be empty"));
        }

        let default_model = self
            .default_model
            .ok_or_else(|| Error::configuration("defaultModel is required"))?;

        let mut seen_names = HashSet::new();
        for provider in &self.ai_providers {
            if !seen_names.insert(provider.name().to_string()) {
                return Err(Error::configuration(format!(
                    "duplicate provider name '{}'",
                    provider.name()
                )));
            }
        }
        if !seen_names.contains(&default_model.provider) {
            return Err(Error::configuration(format!(
                "defaultModel.provider '{}' is not among registered providers",
                default_model.provider
            )));
        }

        Ok(AgentConfig {
            name,
            ai_providers: self.ai_providers,
            default_model,
            tools: self.tools,
            plugins: self.plugins,
            modules: self.modules,
            conversation_id: self.conversation_id,
            logging: self.logging,
            max_tool_turns: self.max_tool_turns,
            history_max_size: self.history_max_size,
        })
    }
}

/// A snapshot of an agent's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub name: String,
    pub version: String,
    pub conversation_id: String,
    pub providers: Vec<String>,
    pub current_provider: Option<String>,
    pub tools: Vec<String>,
    pub plugins: Vec<String>,
    pub modules: Vec<String>,
    pub history_length: usize,
    pub history_stats: HistoryStats,
    pub uptime_ms: u64,
}

/// A configured instance that converts user input into assistant responses
/// using a provider and tools.
///
/// Every manager below is a per-agent instance, never a singleton: two `Agent`s never share a provider registry, tool
/// registry, plugin pipeline, module registry, event bus, or history
/// manager.
pub struct Agent {
    config: AgentConfig,
    conversation_id: String,
    created_at: Instant,
    init: OnceCell<()>,
    providers: Mutex<ProviderRegistry>,
    tools: Mutex<ToolRegistry>,
    plugins: Mutex<PluginPipeline>,
    modules: Mutex<ModuleRegistry>,
    history: Mutex<HistoryManager>,
    bus: EventBus,
    model: Mutex<ModelSpec>,
    destroyed: AtomicBool,
}

impl Agent {
    /// Construct an agent from an already-validated config. Construction
    /// itself does nothing async — every subsystem is empty until the
    /// first `run`/`run_stream` triggers lazy init.
    pub fn new(config: AgentConfig) -> Self {
        let conversation_id = config
            .conversation_id
            .clone()
            .unwrap_or_else(generate_conversation_id);
        let model = Mutex::new(config.default_model.clone());
        let history_max_size = config.history_max_size;

        Agent {
            config,
            conversation_id,
            created_at: Instant::now(),
            init: OnceCell::new(),
            providers: Mutex::new(ProviderRegistry::new()),
            tools: Mutex::new(ToolRegistry::new()),
            plugins: Mutex::new(PluginPipeline::new()),
            modules: Mutex::new(ModuleRegistry::new()),
            history: Mutex::new(HistoryManager::new(history_max_size)),
            bus: EventBus::new(),
            model,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Single-flight lazy init: provider registry fills, tools register,
    /// modules initialize in dependency order, plugins attach and subscribe
    /// to module events. Concurrent first calls share the same init future
    /// (`OnceCell::get_or_try_init`'s own guarantee); a failed attempt
    /// leaves the cell uninitialized so a later call can retry.
    async fn ensure_initialized(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                {
                    let mut providers = self.providers.lock().await;
                    for provider in &self.config.ai_providers {
                        providers.register(provider.clone())?;
                    }
                    providers.set_current_provider(
                        &self.config.default_model.provider,
                        &self.config.default_model.model,
                    )?;
                }
                {
                    let mut tools = self.tools.lock().await;
                    for tool in &self.config.tools {
                        tools.register(tool.clone())?;
                    }
                }
                {
                    let mut modules = self.modules.lock().await;
                    for module in &self.config.modules {
                        modules.register(module.clone(), RegisterOptions::default())?;
                    }
                    modules.initialize_all(&self.bus).await?;
                }
                {
                    let mut plugins = self.plugins.lock().await;
                    for plugin in &self.config.plugins {
                        plugins.register(plugin.clone());
                    }
                    plugins.initialize_all().await?;
                    plugins.subscribe_module_events(&self.bus).await;
                }
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    fn check_not_destroyed(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::configuration("agent has been destroyed"));
        }
        Ok(())
    }

    /// Run one turn to completion and return the model's final text answer.
    pub async fn run(&self, input: &str, options: Option<RunOptions>) -> Result<String> {
        self.check_not_destroyed()?;
        self.ensure_initialized().await?;
        let run_options = options.unwrap_or_default();

        let providers = self.providers.lock().await;
        let tools = self.tools.lock().await;
        let plugins = self.plugins.lock().await;
        let model = self.model.lock().await.clone();
        let mut history = self.history.lock().await;
        let session = history.session_mut(&self.conversation_id);

        execution::run_turn(
            input,
            session,
            &providers,
            &tools,
            &plugins,
            &self.bus,
            &model,
            self.config.max_tool_turns,
            &run_options,
        )
        .await
    }

    /// Run one turn in streaming mode, returning a lazy finite sequence of
    /// text chunks delivered as the provider (and any tools interleaved
    /// between its calls) produce them.
    pub async fn run_stream(&self, input: &str, options: Option<RunOptions>) -> Result<ChunkStream<'_>> {
        self.check_not_destroyed()?;
        self.ensure_initialized().await?;
        let run_options = options.unwrap_or_default();

        let providers = self.providers.lock().await;
        let tools = self.tools.lock().await;
        let plugins = self.plugins.lock().await;
        let model = self.model.lock().await.clone();
        let history = self.history.lock().await;

        execution::run_turn_stream(
            input,
            history,
            self.conversation_id.clone(),
            &providers,
            tools,
            plugins,
            &self.bus,
            model,
            self.config.max_tool_turns,
            run_options,
        )
        .await
    }

    pub async fn get_history(&self) -> Vec<Message> {
        let mut history = self.history.lock().await;
        history.session_mut(&self.conversation_id).get_messages()
    }

    pub async fn clear_history(&self) {
        let mut history = self.history.lock().await;
        history.clear(&self.conversation_id);
    }

    /// Attach a plugin: run its `initialize()`, register it with the
    /// pipeline, and bind it to the event bus if it opts in. Unlike hook
    /// fan-out, an `initialize()` failure here is not isolated — it is
    /// surfaced to the caller.
    pub async fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        plugin.initialize().await?;
        {
            let mut plugins = self.plugins.lock().await;
            plugins.register(plugin.clone());
        }
        if plugin.subscribes_to_module_events() {
            plugin.subscribe_to_module_events(&self.bus).await?;
        }
        Ok(())
    }

    pub async fn remove_plugin(&self, name: &str) -> Result<()> {
        let mut plugins = self.plugins.lock().await;
        if let Some(plugin) = plugins.get(name) {
            if plugin.subscribes_to_module_events() {
                let _ = plugin.unsubscribe_from_module_events(&self.bus).await;
            }
        }
        plugins.unregister(name);
        Ok(())
    }

    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.lock().await.get(name)
    }

    /// Register a tool. Duplicates are skipped by `schema.name` (spec
    /// §4.1 "Tool registration skips duplicates").
    pub async fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<()> {
        self.tools.lock().await.register(tool)
    }

    pub async fn unregister_tool(&self, name: &str) {
        self.tools.lock().await.unregister(name);
    }

    /// Register a module and, when `options.auto_initialize` is set, run
    /// its `initialize()` immediately, publishing the same
    /// `module.initialize.*` events `ModuleRegistry::initialize_all` would.
    pub async fn register_module(&self, module: Arc<dyn Module>, options: RegisterOptions) -> Result<()> {
        let mut modules = self.modules.lock().await;
        modules.register(module.clone(), options)?;
        if options.auto_initialize {
            use crate::event_bus::Event;
            self.bus.publish(Event::module_phase(module.name(), "initialize", "start"));
            match module.initialize().await {
                Ok(()) => self.bus.publish(Event::module_phase(module.name(), "initialize", "complete")),
                Err(err) => {
                    self.bus.publish(Event::module_phase(module.name(), "initialize", "error"));
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Dispose and unregister a module.
    pub async fn unregister_module(&self, name: &str) -> Result<()> {
        let mut modules = self.modules.lock().await;
        if let Some(module) = modules.get(name) {
            module.dispose().await?;
        }
        modules.unregister(name);
        Ok(())
    }

    pub async fn execute_module(&self, name: &str, ctx: &ModuleContext) -> Result<ModuleExecutionResult> {
        self.modules.lock().await.execute_module(name, ctx, &self.bus).await
    }

    /// Select the active provider/model pair. Fails if `model.provider`
    /// names a provider not present in this agent's config.
    pub async fn set_model(&self, model: ModelSpec) -> Result<()> {
        let known = self.config.ai_providers.iter().any(|p| p.name() == model.provider);
        if !known {
            return Err(Error::configuration(format!(
                "cannot select unknown provider '{}'",
                model.provider
            )));
        }
        if self.init.initialized() {
            self.providers
                .lock()
                .await
                .set_current_provider(&model.provider, &model.model)?;
        }
        *self.model.lock().await = model;
        Ok(())
    }

    pub async fn get_model(&self) -> ModelSpec {
        self.model.lock().await.clone()
    }

    pub fn get_config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub async fn get_stats(&self) -> AgentStats {
        let providers = self.providers.lock().await;
        let tools = self.tools.lock().await;
        let plugins = self.plugins.lock().await;
        let modules = self.modules.lock().await;
        let mut history = self.history.lock().await;
        let messages = history.session_mut(&self.conversation_id).get_messages();

        AgentStats {
            name: self.config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            conversation_id: self.conversation_id.clone(),
            providers: providers.names(),
            current_provider: providers.current_provider_name().map(str::to_string),
            tools: tools.get_tools().iter().map(|t| t.schema().name.clone()).collect(),
            plugins: plugins.names(),
            modules: modules.names(),
            history_length: messages.len(),
            history_stats: HistoryStats::from_messages(&messages),
            uptime_ms: self.created_at.elapsed().as_millis() as u64,
        }
    }

    /// Release every acquired resource. Dispose order matches spec §4.1:
    /// modules (reverse dependency) → plugins unsubscribed from the event
    /// bus → module registry cleared → state reset. Idempotent: a second
    /// call is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        {
            let modules = self.modules.lock().await;
            modules.dispose_all(&self.bus).await;
        }
        {
            let plugins = self.plugins.lock().await;
            plugins.unsubscribe_module_events(&self.bus).await;
        }
        {
            let mut modules = self.modules.lock().await;
            *modules = ModuleRegistry::new();
        }
        Ok(())
    }
}
