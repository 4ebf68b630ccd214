//! The Execution Loop: a bounded state machine interleaving provider calls,
//! tool invocations, and history appends until the model stops requesting
//! tools or `max_tool_turns` is hit.
//!
//! Generalizes the teacher's single-provider `Client::send`/`receive` turn
//! loop into a provider-agnostic loop driven entirely by the `Provider`
//! trait. Streaming and non-streaming modes share the same phases (`S0
//! Prepare -> S1 Call Provider -> S2 Classify -> S3 Execute Tools -> S4 Loop
//! Guard`); streaming drives them as an explicit state machine polled one
//! step at a time so chunks reach the caller as they arrive, rather than
//! running the whole turn up front and replaying the result.

use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use crate::event_bus::{Event, EventBus};
use crate::history::{ConversationSession, HistoryManager};
use crate::message::{Message, ToolCall};
use crate::plugin::{PluginPipeline, ProviderCallContext, ToolCallContext};
use crate::provider::{
    reassemble_stream, ChatOptions, ChatStream, ChatStreamChunk, Provider, ProviderRegistry, ToolChoice,
};
use crate::schema::ToolSchema;
use crate::tool::ToolContext;
use crate::tool_registry::ToolRegistry;

/// The active provider/model selection plus per-turn generation
/// parameters, matching `AgentConfig.defaultModel`.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub system_message: Option<String>,
}

/// Caller-supplied options for one `run`/`run_stream` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_else(CancellationToken::none)
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Default hard upper bound on provider calls per turn.
pub const DEFAULT_MAX_TOOL_TURNS: usize = 8;

fn build_chat_options(model: &ModelSpec, tool_schemas: Vec<ToolSchema>) -> ChatOptions {
    ChatOptions {
        model: Some(model.model.clone()),
        temperature: model.temperature,
        max_tokens: model.max_tokens,
        top_p: model.top_p,
        tools: tool_schemas,
        tool_choice: ToolChoice::Auto,
    }
}

/// `S0 Prepare`: synthesize the system message at the head of an empty
/// session, then append the user turn.
fn prepare(session: &mut ConversationSession, user_input: &str, model: &ModelSpec) {
    if session.get_message_count() == 0 {
        if let Some(system_message) = &model.system_message {
            session.append(Message::system(system_message.clone()));
        }
    }
    session.append(Message::user(user_input));
}

/// Build the result of a tool invocation as sent back to the provider.
/// Errors are rendered through `serde_json` rather than hand-built, so any
/// character an error message can contain round-trips as valid JSON.
fn render_tool_error(err: &Error) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}

/// Run one full turn (non-streaming): drives the loop to completion and
/// returns the final assistant text.
pub async fn run_turn(
    user_input: &str,
    session: &mut ConversationSession,
    providers: &ProviderRegistry,
    tools: &ToolRegistry,
    plugins: &PluginPipeline,
    bus: &EventBus,
    model: &ModelSpec,
    max_tool_turns: usize,
    run_options: &RunOptions,
) -> Result<String> {
    plugins.before_run(user_input).await;
    prepare(session, user_input, model);
    bus.publish(Event::execution_start(session.id()));

    let result = drive_loop(session, providers, tools, plugins, model, max_tool_turns, run_options).await;

    match &result {
        Ok(content) => {
            bus.publish(Event::execution_complete(session.id()));
            plugins.after_run(content).await;
        }
        Err(err) => {
            bus.publish(Event::execution_error(session.id(), err));
            plugins.on_error(err).await;
        }
    }

    result
}

/// The shared non-streaming state machine driving `run_turn`: calls the
/// provider, classifies the response, executes any requested tools, and
/// loops until the model stops requesting tools or `max_tool_turns` is hit.
async fn drive_loop(
    session: &mut ConversationSession,
    providers: &ProviderRegistry,
    tools: &ToolRegistry,
    plugins: &PluginPipeline,
    model: &ModelSpec,
    max_tool_turns: usize,
    run_options: &RunOptions,
) -> Result<String> {
    let provider = providers
        .get(&model.provider)
        .ok_or_else(|| Error::configuration(format!("provider '{}' is not registered", model.provider)))?;

    let cancel = run_options.cancel_token();
    let tool_ctx = run_options.tool_context();
    let mut turn_counter = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::cancellation("turn cancelled before provider call"));
        }

        let snapshot = session.get_messages();
        let options = build_chat_options(model, tools.schemas());
        let provider_ctx = ProviderCallContext {
            provider_name: provider.name().to_string(),
            options: options.clone(),
        };

        plugins.before_provider_call(&provider_ctx).await;
        let response = provider.chat(&snapshot, &options).await?;
        plugins.after_provider_call(&provider_ctx, &response).await;

        if response.tool_calls().is_empty() {
            let content = match &response {
                Message::Assistant { content, .. } => content.clone().unwrap_or_default(),
                _ => String::new(),
            };
            session.append(response);
            return Ok(content);
        }

        let tool_calls = response.tool_calls().to_vec();
        session.append(response);

        for call in &tool_calls {
            if cancel.is_cancelled() {
                return Err(Error::cancellation("turn cancelled mid tool execution"));
            }

            let call_ctx = ToolCallContext {
                tool_name: call.function.name.clone(),
                tool_call_id: call.id.clone(),
                arguments: serde_json::from_str(&call.function.arguments_json).unwrap_or(serde_json::Value::Null),
            };
            plugins.before_tool_call(&call_ctx).await;

            let outcome: Result<serde_json::Value> =
                match serde_json::from_str::<serde_json::Value>(&call.function.arguments_json) {
                    Ok(params) => tools.execute_tool(&call.function.name, params, &tool_ctx).await,
                    Err(parse_err) => Err(Error::validation(format!(
                        "failed to parse arguments for tool '{}': {}",
                        call.function.name, parse_err
                    ))),
                };

            let result_text = match &outcome {
                Ok(value) => crate::tool::render_tool_result(value),
                Err(err) => {
                    plugins.on_error(err).await;
                    render_tool_error(err)
                }
            };
            session.append(Message::tool(call.id.clone(), result_text));
            plugins.after_tool_call(&call_ctx, &outcome).await;
        }

        turn_counter += 1;
        if turn_counter >= max_tool_turns {
            let content = "tool budget exhausted".to_string();
            session.append(Message::assistant(content.clone()));
            return Ok(content);
        }
    }
}

/// A lazy, finite sequence of text chunks for one turn. Each item is
/// produced as it arrives from the provider's own stream; tool calls
/// sitting between provider turns run only once the caller has polled past
/// the chunks that precede them.
pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// One step of the streaming turn's state machine. `Done` is terminal; a
/// fresh `stream_step` call on a `Done` state immediately ends the stream.
enum Phase {
    NeedProvider,
    Streaming {
        stream: ChatStream,
        collected: Vec<ChatStreamChunk>,
    },
    ToolCalls {
        remaining: std::vec::IntoIter<ToolCall>,
    },
    Done,
}

/// Everything `stream_step` needs to advance one phase, threaded through
/// `futures::stream::unfold` as the fold state. `H`/`T`/`P` are generic over
/// `Deref[Mut]` rather than concrete guard types so this can be driven by
/// either plain references (as in this module's own tests) or owned
/// `tokio::sync::MutexGuard`s (as `Agent::run_stream` does, since the
/// returned stream must outlive that method's own stack frame).
struct StreamState<'a, H, T, P>
where
    H: DerefMut<Target = HistoryManager> + Send,
    T: Deref<Target = ToolRegistry> + Send,
    P: Deref<Target = PluginPipeline> + Send,
{
    phase: Phase,
    provider: Arc<dyn Provider>,
    history: H,
    conversation_id: String,
    tools: T,
    plugins: P,
    bus: &'a EventBus,
    model: ModelSpec,
    max_tool_turns: usize,
    cancel: CancellationToken,
    tool_ctx: ToolContext,
    turn_counter: usize,
    pending_provider_ctx: Option<ProviderCallContext>,
}

async fn finish_success<H, T, P>(state: &StreamState<'_, H, T, P>, content: &str)
where
    H: DerefMut<Target = HistoryManager> + Send,
    T: Deref<Target = ToolRegistry> + Send,
    P: Deref<Target = PluginPipeline> + Send,
{
    state.bus.publish(Event::execution_complete(&state.conversation_id));
    state.plugins.after_run(content).await;
}

async fn finish_with_error<H, T, P>(state: &StreamState<'_, H, T, P>, err: &Error)
where
    H: DerefMut<Target = HistoryManager> + Send,
    T: Deref<Target = ToolRegistry> + Send,
    P: Deref<Target = PluginPipeline> + Send,
{
    state.bus.publish(Event::execution_error(&state.conversation_id, err));
    state.plugins.on_error(err).await;
}

/// Advance the streaming state machine by exactly one externally visible
/// step: either a chunk is yielded, the stream ends (`None`), or the phase
/// changes silently (provider call issued, a tool executed) and the loop
/// continues internally without producing an item yet.
async fn stream_step<H, T, P>(
    mut state: StreamState<'_, H, T, P>,
) -> Option<(Result<String>, StreamState<'_, H, T, P>)>
where
    H: DerefMut<Target = HistoryManager> + Send,
    T: Deref<Target = ToolRegistry> + Send,
    P: Deref<Target = PluginPipeline> + Send,
{
    loop {
        match std::mem::replace(&mut state.phase, Phase::Done) {
            Phase::Done => return None,

            Phase::NeedProvider => {
                if state.cancel.is_cancelled() {
                    let err = Error::cancellation("turn cancelled before provider call");
                    finish_with_error(&state, &err).await;
                    return Some((Err(err), state));
                }

                let snapshot = state.history.session_mut(&state.conversation_id).get_messages();
                let options = build_chat_options(&state.model, state.tools.schemas());
                let provider_ctx = ProviderCallContext {
                    provider_name: state.provider.name().to_string(),
                    options: options.clone(),
                };

                state.plugins.before_provider_call(&provider_ctx).await;
                match state.provider.chat_stream(&snapshot, &options).await {
                    Ok(stream) => {
                        state.pending_provider_ctx = Some(provider_ctx);
                        state.phase = Phase::Streaming {
                            stream,
                            collected: Vec::new(),
                        };
                    }
                    Err(err) => {
                        finish_with_error(&state, &err).await;
                        return Some((Err(err), state));
                    }
                }
            }

            Phase::Streaming { mut stream, mut collected } => match stream.next().await {
                Some(Ok(ChatStreamChunk::ContentDelta(delta))) => {
                    collected.push(ChatStreamChunk::ContentDelta(delta.clone()));
                    state.phase = Phase::Streaming { stream, collected };
                    return Some((Ok(delta), state));
                }
                Some(Ok(chunk @ ChatStreamChunk::ToolCallDelta { .. })) => {
                    collected.push(chunk);
                    state.phase = Phase::Streaming { stream, collected };
                }
                Some(Err(err)) => {
                    finish_with_error(&state, &err).await;
                    return Some((Err(err), state));
                }
                Some(Ok(ChatStreamChunk::Done)) | None => {
                    let response = reassemble_stream(&collected);
                    if let Some(ctx) = state.pending_provider_ctx.take() {
                        state.plugins.after_provider_call(&ctx, &response).await;
                    }

                    if response.tool_calls().is_empty() {
                        let content = match &response {
                            Message::Assistant { content, .. } => content.clone().unwrap_or_default(),
                            _ => String::new(),
                        };
                        state.history.session_mut(&state.conversation_id).append(response);
                        finish_success(&state, &content).await;
                        return None;
                    }

                    let tool_calls = response.tool_calls().to_vec();
                    state.history.session_mut(&state.conversation_id).append(response);
                    state.phase = Phase::ToolCalls {
                        remaining: tool_calls.into_iter(),
                    };
                }
            },

            Phase::ToolCalls { mut remaining } => {
                if state.cancel.is_cancelled() {
                    let err = Error::cancellation("turn cancelled mid tool execution");
                    finish_with_error(&state, &err).await;
                    return Some((Err(err), state));
                }

                match remaining.next() {
                    Some(call) => {
                        let call_ctx = ToolCallContext {
                            tool_name: call.function.name.clone(),
                            tool_call_id: call.id.clone(),
                            arguments: serde_json::from_str(&call.function.arguments_json)
                                .unwrap_or(serde_json::Value::Null),
                        };
                        state.plugins.before_tool_call(&call_ctx).await;

                        let outcome: Result<serde_json::Value> =
                            match serde_json::from_str::<serde_json::Value>(&call.function.arguments_json) {
                                Ok(params) => {
                                    state
                                        .tools
                                        .execute_tool(&call.function.name, params, &state.tool_ctx)
                                        .await
                                }
                                Err(parse_err) => Err(Error::validation(format!(
                                    "failed to parse arguments for tool '{}': {}",
                                    call.function.name, parse_err
                                ))),
                            };

                        let result_text = match &outcome {
                            Ok(value) => crate::tool::render_tool_result(value),
                            Err(err) => {
                                state.plugins.on_error(err).await;
                                render_tool_error(err)
                            }
                        };
                        state
                            .history
                            .session_mut(&state.conversation_id)
                            .append(Message::tool(call.id.clone(), result_text));
                        state.plugins.after_tool_call(&call_ctx, &outcome).await;

                        state.phase = Phase::ToolCalls { remaining };
                    }
                    None => {
                        state.turn_counter += 1;
                        if state.turn_counter >= state.max_tool_turns {
                            let content = "tool budget exhausted".to_string();
                            state
                                .history
                                .session_mut(&state.conversation_id)
                                .append(Message::assistant(content.clone()));
                            finish_success(&state, &content).await;
                            return None;
                        }
                        state.phase = Phase::NeedProvider;
                    }
                }
            }
        }
    }
}

/// Run one full turn in streaming mode, returning the chunk sequence as it
/// arrives. `history`/`tools`/`plugins` are taken by value (plain
/// references in tests, owned lock guards in `Agent::run_stream`) since the
/// returned stream embeds them and may be polled long after this function
/// itself has returned.
pub async fn run_turn_stream<'a, H, T, P>(
    user_input: &str,
    mut history: H,
    conversation_id: String,
    providers: &ProviderRegistry,
    tools: T,
    plugins: P,
    bus: &'a EventBus,
    model: ModelSpec,
    max_tool_turns: usize,
    run_options: RunOptions,
) -> Result<ChunkStream<'a>>
where
    H: DerefMut<Target = HistoryManager> + Send + 'a,
    T: Deref<Target = ToolRegistry> + Send + 'a,
    P: Deref<Target = PluginPipeline> + Send + 'a,
{
    plugins.before_run(user_input).await;
    {
        let session = history.session_mut(&conversation_id);
        prepare(session, user_input, &model);
    }
    bus.publish(Event::execution_start(&conversation_id));

    let provider = providers
        .get(&model.provider)
        .ok_or_else(|| Error::configuration(format!("provider '{}' is not registered", model.provider)))?;

    let cancel = run_options.cancel_token();
    let tool_ctx = run_options.tool_context();

    let state = StreamState {
        phase: Phase::NeedProvider,
        provider,
        history,
        conversation_id,
        tools,
        plugins,
        bus,
        model,
        max_tool_turns,
        cancel,
        tool_ctx,
        turn_counter: 0,
        pending_provider_ctx: None,
    };

    Ok(Box::pin(futures::stream::unfold(state, stream_step)))
}
