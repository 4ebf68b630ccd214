//! Tool definition and execution system.
//!
//! A [`Tool`] pairs a declared [`ToolSchema`] with an async handler the
//! execution loop invokes once the model's arguments have been parsed and
//! validated. Tools are built either by hand (implementing the trait
//! directly) or with [`ToolBuilder`]/[`tool`] for the common case of a
//! closure-backed tool with a hand-written schema.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{ObjectSchema, ToolSchema, Validator};

/// Optional invocation context passed to a tool's `execute`, carrying the
/// run's `sessionId`/`userId`/`metadata` (see `RunOptions`) so a tool can
/// scope side effects to the calling conversation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

/// A named, schema-validated callable invoked when the model emits a tool
/// call matching its `schema.name`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's declared name, description, and parameter schema.
    fn schema(&self) -> &ToolSchema;

    /// Execute the tool with already-validated parameters, returning a
    /// value that will be JSON-serialized into the resulting `tool` message
    /// if it is not already a string.
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<serde_json::Value>;

    /// Optional tool-specific validation run in addition to the generic
    /// schema validator. Default: no extra validation.
    fn validate_parameters(&self, _params: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// Render a tool's result value into the text stored on a `tool` message:
/// strings pass through unchanged, everything else is JSON-serialized.
pub fn render_tool_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

type HandlerFn = dyn Fn(serde_json::Value, ToolContext) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
    + Send
    + Sync;

/// A closure-backed [`Tool`] built by [`ToolBuilder`].
pub struct ClosureTool {
    schema: ToolSchema,
    handler: Arc<HandlerFn>,
}

#[async_trait]
impl Tool for ClosureTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<serde_json::Value> {
        (self.handler)(params, ctx.clone()).await
    }
}

/// Start building a tool with a name and description.
///
/// ```
/// use agent_runtime_core::{tool, ObjectSchema, ParameterSchema};
/// use std::collections::HashMap;
///
/// let mut properties = HashMap::new();
/// properties.insert("a".to_string(), ParameterSchema::Number { description: None, minimum: None, maximum: None, default: None });
/// let schema = ObjectSchema { properties, required: vec!["a".to_string()] };
///
/// let add = tool("double", "doubles a number", schema, |params, _ctx| {
///     Box::pin(async move {
///         let a = params["a"].as_f64().unwrap_or(0.0);
///         Ok(serde_json::json!(a * 2.0))
///     })
/// });
/// assert_eq!(add.schema().name, "double");
/// ```
pub fn tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: ObjectSchema,
    handler: F,
) -> ClosureTool
where
    F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    ClosureTool {
        schema: ToolSchema {
            name: name.into(),
            description: description.into(),
            parameters,
        },
        handler: Arc::new(move |params, ctx| Box::pin(handler(params, ctx))),
    }
}

/// Fluent builder for constructing a [`ClosureTool`] one parameter at a time.
pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: ObjectSchema,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        ToolBuilder {
            name: name.into(),
            description: description.into(),
            parameters: ObjectSchema::empty(),
        }
    }

    /// Declare a parameter and whether it is required.
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        schema: crate::schema::ParameterSchema,
        required: bool,
    ) -> Self {
        let name = name.into();
        if required {
            self.parameters.required.push(name.clone());
        }
        self.parameters.properties.insert(name, schema);
        self
    }

    /// Finish the builder, attaching the async handler.
    pub fn handler<F, Fut>(self, handler: F) -> ClosureTool
    where
        F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        tool(self.name, self.description, self.parameters, handler)
    }
}

/// Validate, then execute, a tool's parsed arguments, matching spec §4.4
/// `executeTool` failure modes: the tool must already have been looked up
/// and allow-list checked by the caller (the `ToolRegistry`); this function
/// covers validation + execution only.
pub async fn validate_and_execute(
    tool: &dyn Tool,
    params: serde_json::Value,
    validator: &Validator,
    ctx: &ToolContext,
) -> Result<serde_json::Value> {
    let outcome = validator.validate(&tool.schema().parameters, &params);
    if !outcome.is_valid() {
        let messages: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
        return Err(Error::validation(messages.join("; ")).with_context(
            "toolName",
            tool.schema().name.clone(),
        ));
    }
    tool.validate_parameters(&params)?;
    tool.execute(params, ctx)
        .await
        .map_err(|e| Error::tool_execution(tool.schema().name.clone(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParameterSchema;

    fn number_param() -> ParameterSchema {
        ParameterSchema::Number {
            description: None,
            minimum: None,
            maximum: None,
            default: None,
        }
    }

    #[tokio::test]
    async fn test_tool_builder_constructs_executable_tool() {
        let add = ToolBuilder::new("add", "adds two numbers")
            .parameter("a", number_param(), true)
            .parameter("b", number_param(), true)
            .handler(|params, _ctx| {
                Box::pin(async move {
                    let a = params["a"].as_f64().unwrap_or(0.0);
                    let b = params["b"].as_f64().unwrap_or(0.0);
                    Ok(serde_json::json!(a + b))
                })
            });

        let ctx = ToolContext::default();
        let result = add.execute(serde_json::json!({"a": 1, "b": 2}), &ctx).await.unwrap();
        assert_eq!(result, serde_json::json!(3.0));
    }

    #[tokio::test]
    async fn test_validate_and_execute_rejects_invalid_params() {
        let add = ToolBuilder::new("add", "adds two numbers")
            .parameter("a", number_param(), true)
            .parameter("b", number_param(), true)
            .handler(|params, _ctx| {
                Box::pin(async move {
                    let a = params["a"].as_f64().unwrap_or(0.0);
                    let b = params["b"].as_f64().unwrap_or(0.0);
                    Ok(serde_json::json!(a + b))
                })
            });

        let validator = Validator::default();
        let ctx = ToolContext::default();
        let result = validate_and_execute(
            &add,
            serde_json::json!({"a": "not a number", "b": 2}),
            &validator,
            &ctx,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_validate_and_execute_runs_tool_on_valid_params() {
        let add = ToolBuilder::new("add", "adds two numbers")
            .parameter("a", number_param(), true)
            .parameter("b", number_param(), true)
            .handler(|params, _ctx| {
                Box::pin(async move {
                    let a = params["a"].as_f64().unwrap_or(0.0);
                    let b = params["b"].as_f64().unwrap_or(0.0);
                    Ok(serde_json::json!(a + b))
                })
            });

        let validator = Validator::default();
        let ctx = ToolContext::default();
        let result = validate_and_execute(&add, serde_json::json!({"a": 1, "b": 2}), &validator, &ctx)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!(3.0));
    }

    #[test]
    fn test_render_tool_result_passes_strings_through() {
        assert_eq!(render_tool_result(&serde_json::json!("hi")), "hi");
        assert_eq!(render_tool_result(&serde_json::json!(3)), "3");
        assert_eq!(render_tool_result(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_tool_execution_error_wraps_handler_failure() {
        let failing = ToolBuilder::new("fail", "always fails")
            .handler(|_params, _ctx| Box::pin(async move { Err(Error::validation("boom")) }));

        let validator = Validator::default();
        let ctx = ToolContext::default();
        let result = validate_and_execute(&failing, serde_json::json!({}), &validator, &ctx).await;
        match result {
            Err(Error::ToolExecution { tool_name, .. }) => assert_eq!(tool_name, "fail"),
            _ => panic!("expected ToolExecution error"),
        }
    }
}
