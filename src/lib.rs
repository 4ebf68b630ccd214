//! # Agent Runtime Core
//!
//! A backend-agnostic execution engine for building LLM agents. It defines
//! the contracts an integrator implements — [`Provider`], [`Tool`],
//! [`Plugin`], [`Module`] — and drives them through a bounded state machine
//! that interleaves provider calls, tool execution, and history management,
//! without depending on any single model vendor's API shape or transport.
//!
//! ## Key Features
//!
//! - **Backend-agnostic**: no concrete vendor transport ships in this
//!   crate — integrators implement [`Provider`] over their own HTTP/gRPC/SDK
//!   client.
//! - **Bounded execution loop**: `S0 Prepare -> S1 Call Provider -> S2
//!   Classify -> S3 Execute Tools -> S4 Loop Guard` runs to completion or a
//!   configurable `maxToolTurns`, streaming and non-streaming alike.
//! - **Ordered plugin pipeline**: priority-ordered lifecycle hooks with
//!   per-plugin failure isolation — a broken plugin never aborts a turn.
//! - **Total schema validation**: a JSON-schema-driven parameter validator
//!   that never panics or throws on malformed input.
//! - **Per-conversation history**: an append-only message log multiplexed
//!   by conversation id, with bounded-suffix snapshots for provider calls.
//! - **Dependency-ordered modules**: named sub-capabilities with their own
//!   init/dispose lifecycle and cycle detection.
//! - **Cooperative cancellation**: a `CancellationToken`/`CancellationSource`
//!   pair threaded through every turn.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_runtime_core::{Agent, AgentConfig, ModelSpec};
//! use agent_runtime_core::testing::ScriptedProvider;
//! use agent_runtime_core::Message;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(ScriptedProvider::new(
//!         "local",
//!         vec![Message::assistant("Hello there!")],
//!     ));
//!
//!     let config = AgentConfig::builder()
//!         .name("greeter")
//!         .ai_provider(provider)
//!         .default_model(ModelSpec {
//!             provider: "local".to_string(),
//!             model: "local-model".to_string(),
//!             temperature: None,
//!             max_tokens: None,
//!             top_p: None,
//!             system_message: Some("You are friendly.".to_string()),
//!         })
//!         .build()?;
//!
//!     let agent = Agent::new(config);
//!     let answer = agent.run("hi", None).await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **agent**: the caller-facing facade (`Agent`, `AgentConfig`) that owns
//!   and lazily initializes every subsystem below.
//! - **execution**: the bounded state machine driving one turn.
//! - **provider**: the backend-agnostic chat contract and its registry.
//! - **tool** / **tool_registry**: tool definition, schema-validated
//!   dispatch, and the allow-listed registry.
//! - **schema**: the total JSON-schema parameter validator and DSL.
//! - **plugin**: the ordered, failure-isolated lifecycle hook pipeline.
//! - **module**: dependency-ordered named sub-capabilities.
//! - **history**: per-conversation append-only message logs.
//! - **event_bus**: a broadcast channel for module/execution lifecycle events.
//! - **cancellation**: cooperative cancellation tokens.
//! - **context**: token estimation and history truncation utilities.
//! - **retry**: exponential backoff helpers for integrators' own adapters.
//! - **logger**: a thin per-component wrapper over the `log` facade.
//! - **error**: the crate-wide `Error`/`Result` types.
//! - **testing**: in-memory `Provider` fakes for exercising the loop without
//!   a real backend.

mod agent;
mod cancellation;
pub mod context;
mod error;
mod event_bus;
mod execution;
mod history;
mod ids;
mod logger;
mod message;
mod module;
mod plugin;
mod provider;
pub mod retry;
mod schema;
pub mod testing;
mod tool;
mod tool_registry;

// --- Agent Facade ---

pub use agent::{Agent, AgentConfig, AgentConfigBuilder, AgentStats};

// --- Execution Loop ---

pub use execution::{ChunkStream, ModelSpec, RunOptions, DEFAULT_MAX_TOOL_TURNS};

// --- Messages ---

pub use message::{Message, Metadata, TimestampMillis, ToolCall, ToolCallFunction};

// --- Provider Contract ---

pub use provider::{reassemble_stream, ChatOptions, ChatStream, ChatStreamChunk, Provider, ProviderRegistry, ToolChoice};

// --- Tool System ---

pub use tool::{render_tool_result, tool, ClosureTool, Tool, ToolBuilder, ToolContext};
pub use tool_registry::ToolRegistry;

// --- Schema Validation ---

pub use schema::{
    ObjectSchema, ParameterSchema, SchemaSource, ToolSchema, ValidationError, ValidationOutcome, Validator,
};

// --- Plugin Pipeline ---

pub use plugin::{Plugin, PluginCategory, PluginPipeline, Priority, ProviderCallContext, ToolCallContext};

// --- Module Registry ---

pub use module::{Module, ModuleContext, ModuleExecutionResult, ModuleRegistry, RegisterOptions};

// --- History ---

pub use history::{ConversationSession, HistoryManager, HistoryStats};

// --- Event Bus ---

pub use event_bus::{Event, EventBus};

// --- Cancellation ---

pub use cancellation::{cancellation_pair, CancellationSource, CancellationToken};

// --- Logging ---

pub use logger::{LogLevel, Logger};

// --- Identifiers ---

pub use ids::{generate_conversation_id, generate_id};

// --- Error Handling ---

pub use error::{Error, ErrorContext, Result};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types for building and running an agent.
/// Import with `use agent_runtime_core::prelude::*;`.
pub mod prelude {
    pub use crate::{
        tool, Agent, AgentConfig, AgentConfigBuilder, AgentStats, CancellationToken, ChatOptions, ChatStreamChunk,
        Error, EventBus, LogLevel, Message, Module, ModuleContext, ModuleRegistry, ModelSpec, Plugin,
        PluginCategory, PluginPipeline, Priority, Provider, ProviderRegistry, Result, RunOptions, Tool, ToolBuilder,
        ToolCall, ToolRegistry, ToolSchema,
    };
}
