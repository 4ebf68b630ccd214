//! Name-keyed tool registry with allow-list filtering and dispatch.
//!
//! Grounded in the registry shape common across tool-calling agents: a
//! `HashMap<name, Arc<dyn Tool>>`, dedup-by-name registration, and a visible
//! subset restricted by an optional allow-list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{ToolSchema, Validator};
use crate::tool::{Tool, ToolContext};

/// Central registry holding every tool an agent knows about, plus the
/// optional allow-list restricting which of them are visible for a turn.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    allowed: Option<HashSet<String>>,
    validator: Validator,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
            allowed: None,
            validator: Validator::default(),
        }
    }

    /// Register a tool, deduplicating by `schema.name` (a second
    /// registration under the same name is a silent no-op, matching the
    /// agent facade's "tool registration skips duplicates" rule).
    ///
    /// Fails if the schema itself is malformed: a `required` name absent
    /// from `properties`.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        validate_schema_shape(schema)?;
        self.tools.entry(schema.name.clone()).or_insert(tool);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Restrict the set of tools visible to `getTools()`/dispatch to the
    /// given names. Idempotent: calling it twice with the same list is a
    /// no-op in effect.
    pub fn set_allowed_tools(&mut self, names: Vec<String>) {
        self.allowed = Some(names.into_iter().collect());
    }

    /// Clear any allow-list restriction, making every registered tool visible.
    pub fn clear_allowed_tools(&mut self) {
        self.allowed = None;
    }

    fn is_visible(&self, name: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.contains(name),
            None => true,
        }
    }

    /// All tools currently visible (registered and, if an allow-list is
    /// set, present in it), sorted by name for deterministic provider
    /// payload ordering.
    pub fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut visible: Vec<Arc<dyn Tool>> = self
            .tools
            .iter()
            .filter(|(name, _)| self.is_visible(name))
            .map(|(_, tool)| tool.clone())
            .collect();
        visible.sort_by(|a, b| a.schema().name.cmp(&b.schema().name));
        visible
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.get_tools().iter().map(|t| t.schema().clone()).collect()
    }

    /// Validate then execute a named tool's call, covering every failure
    /// mode `executeTool` can hit: missing, not allow-listed,
    /// validator rejection, or a throwing handler.
    pub async fn execute_tool(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value> {
        let Some(tool) = self.tools.get(name) else {
            return Err(Error::tool_execution(name, "tool not registered"));
        };
        if !self.is_visible(name) {
            return Err(Error::tool_execution(name, "tool not in allow-list"));
        }
        crate::tool::validate_and_execute(tool.as_ref(), params, &self.validator, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a tool's own schema shape at registration time: property types
/// must be within the supported set (enforced by the type system already
/// via `ParameterSchema`) and every `required` name must exist in
/// `properties`.
fn validate_schema_shape(schema: &ToolSchema) -> Result<()> {
    for required_name in &schema.parameters.required {
        if !schema.parameters.properties.contains_key(required_name) {
            return Err(Error::configuration(format!(
                "tool '{}' declares required property '{}' not present in properties",
                schema.name, required_name
            )));
        }
    }
    Ok(())
}
