//! Module Registry: named sub-capabilities attached to an agent with their
//! own dependency order and lifecycle.
//!
//! Built in a name→dependencies / topological-check / reverse-order-disposal
//! shape: registration validates the dependency graph up front, disposal
//! runs in reverse initialization order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::event_bus::{Event, EventBus};

/// Context handed to `Module::execute`.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

/// The result of one `ModuleRegistry::execute_module` call.
#[derive(Debug, Clone)]
pub struct ModuleExecutionResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A named capability attached to an agent with its own dependency order
/// and lifecycle (`initialize` → active → `dispose`).
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &str;
    fn module_type(&self) -> &str {
        "generic"
    }
    /// Names of modules that must be initialized before this one.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Run the module's capability. Default: no-op success with no data.
    async fn execute(&self, _ctx: &ModuleContext) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

/// Options controlling how a module is registered.
#[derive(Debug, Clone, Copy)]
pub struct RegisterOptions {
    pub auto_initialize: bool,
    pub validate_dependencies: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        RegisterOptions {
            auto_initialize: true,
            validate_dependencies: true,
        }
    }
}

/// Owns every [`Module`] attached to one agent, in declared registration
/// order, and computes the dependency order used for `initialize_all`/
/// `dispose_all`.
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
    registration_order: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry {
            modules: HashMap::new(),
            registration_order: Vec::new(),
        }
    }

    /// Register a module. When `validate_dependencies` is set, fails with
    /// `ConfigurationError` if a dependency cycle would result.
    /// `auto_initialize` is honored by the caller (the agent facade), which
    /// decides whether to call `initialize_all` immediately; this method
    /// only records the module.
    pub fn register(&mut self, module: Arc<dyn Module>, options: RegisterOptions) -> Result<()> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Ok(());
        }
        self.modules.insert(name.clone(), module);
        self.registration_order.push(name);

        if options.validate_dependencies {
            self.dependency_order()?;
        }
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) {
        self.modules.remove(name);
        self.registration_order.retain(|n| n != name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.registration_order.clone()
    }

    /// Topologically order every registered module so each entry appears
    /// after all of its dependencies. Fails with `ConfigurationError` on a
    /// cycle or a dependency naming an unregistered module.
    fn dependency_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut visited: HashSet<String> = HashSet::new();
        let mut in_progress: HashSet<String> = HashSet::new();

        fn visit(
            name: &str,
            modules: &HashMap<String, Arc<dyn Module>>,
            visited: &mut HashSet<String>,
            in_progress: &mut HashSet<String>,
            order: &mut Vec<String>,
        ) -> Result<()> {
            if visited.contains(name) {
                return Ok(());
            }
            if in_progress.contains(name) {
                return Err(Error::configuration(format!(
                    "module dependency cycle detected at '{}'",
                    name
                )));
            }
            let Some(module) = modules.get(name) else {
                return Err(Error::configuration(format!(
                    "module '{}' depends on unregistered module",
                    name
                )));
            };
            in_progress.insert(name.to_string());
            for dep in module.dependencies() {
                visit(dep, modules, visited, in_progress, order)?;
            }
            in_progress.remove(name);
            visited.insert(name.to_string());
            order.push(name.to_string());
            Ok(())
        }

        for name in &self.registration_order {
            visit(name, &self.modules, &mut visited, &mut in_progress, &mut order)?;
        }
        Ok(order)
    }

    /// Initialize every module in dependency order, publishing
    /// `module.initialize.start/complete/error` onto the bus.
    pub async fn initialize_all(&self, bus: &EventBus) -> Result<()> {
        let order = self.dependency_order()?;
        for name in order {
            let module = self.modules.get(&name).expect("validated by dependency_order");
            bus.publish(Event::module_phase(&name, "initialize", "start"));
            match module.initialize().await {
                Ok(()) => bus.publish(Event::module_phase(&name, "initialize", "complete")),
                Err(err) => {
                    bus.publish(Event::module_phase(&name, "initialize", "error"));
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Dispose every module in reverse-dependency order, publishing `module.dispose.*` events. Disposal is
    /// best-effort: a failing module's error is logged and disposal
    /// continues so other modules still release their resources.
    pub async fn dispose_all(&self, bus: &EventBus) {
        let order = match self.dependency_order() {
            Ok(order) => order,
            Err(_) => self.registration_order.clone(),
        };
        for name in order.into_iter().rev() {
            let Some(module) = self.modules.get(&name) else { continue };
            bus.publish(Event::module_phase(&name, "dispose", "start"));
            match module.dispose().await {
                Ok(()) => bus.publish(Event::module_phase(&name, "dispose", "complete")),
                Err(err) => {
                    log::warn!("module '{}' failed to dispose: {}", name, err);
                    bus.publish(Event::module_phase(&name, "dispose", "error"));
                }
            }
        }
    }

    /// Run a named module's `execute`, publishing `module.execution.*`
    /// events and returning a structured success/failure result rather
    /// than propagating the error.
    pub async fn execute_module(
        &self,
        name: &str,
        ctx: &ModuleContext,
        bus: &EventBus,
    ) -> Result<ModuleExecutionResult> {
        let Some(module) = self.modules.get(name) else {
            return Err(Error::module(name, "module not registered"));
        };
        bus.publish(Event::module_phase(name, "execution", "start"));
        let started = Instant::now();
        let result = module.execute(ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(data) => {
                bus.publish(Event::module_phase(name, "execution", "complete"));
                ModuleExecutionResult {
                    success: true,
                    data: Some(data),
                    error: None,
                    duration_ms,
                }
            }
            Err(err) => {
                bus.publish(Event::module_phase(name, "execution", "error"));
                ModuleExecutionResult {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                    duration_ms,
                }
            }
        };
        Ok(outcome)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
