//! The streaming turn loop (spec §4.3): one request-to-terminal-event cycle
//! over a session — title generation, summary-aware history loading, the
//! stream/compact/dispatch cycle, dangling-tool-use repair, and cost
//! accounting.

use std::collections::VecDeque;
use std::sync::Arc;

use ac_core::{ContentPart, CoreError, FinishReason, Message, Role, Session, SessionId, ToolCallId};
use ac_provider::{calculate_cost, ModelInfo, Provider, StreamEvent, Usage};
use ac_session::{genealogy, MessageStore, SessionStore};
use ac_toolset::{PermissionGate, Tool, ToolError, ToolOutput};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::busy::BusyMap;
use crate::compaction::{apply_summary_cut, estimate_tokens, should_compact};
use crate::repair::{repair_dangling, repair_history};

/// Hard ceiling on stream/tool-dispatch cycles within a single turn. Not a
/// spec requirement; a defensive backstop against a model that never stops
/// requesting tools.
const MAX_TURN_CYCLES: usize = 64;

/// Minimum fraction of the context window the adapted max-output-tokens
/// budget may shrink to before the loop gives up halving and proceeds
/// anyway, logging a warning.
const MIN_MAX_TOKENS_FRACTION: f64 = 0.05;

#[derive(Debug, Clone)]
pub enum TurnEvent {
    ContentDelta { session_id: SessionId, text: String },
    ThinkingDelta { session_id: SessionId, text: String },
    ToolCallStarted { session_id: SessionId, call_id: ToolCallId, name: String },
    ToolCallCompleted { session_id: SessionId, call_id: ToolCallId, name: String, is_error: bool },
    Summarizing { session_id: SessionId },
    Response { session_id: SessionId, finish_reason: FinishReason },
    Error { session_id: SessionId, message: String },
}

pub struct TurnRequest {
    pub session_id: SessionId,
    pub model_id: String,
    pub summarizer_model_id: String,
    pub descriptor_model_id: String,
    pub max_output_tokens: u32,
    pub auto_compact: bool,
    pub tools: Vec<Arc<dyn Tool>>,
    pub gate: Arc<dyn PermissionGate>,
    pub user_text: String,
    pub attachments: Vec<ContentPart>,
}

pub struct TurnDriver {
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
    pub provider: Arc<dyn Provider>,
    pub summarizer: Arc<dyn Provider>,
    pub descriptor: Arc<dyn Provider>,
    pub broker: ac_broker::Broker<TurnEvent>,
    pub busy: BusyMap,
}

/// A just-completed tool-use/tool-result pair, kept around across cycles so
/// synchronous mid-turn compaction can re-append it after cutting history
/// to the fresh summary point (prevents livelock on a still-huge context).
struct ToolPair {
    assistant: Message,
    tool: Message,
}

impl TurnDriver {
    /// Runs one turn to completion, enforcing the single-flight busy check
    /// for `request.session_id`. Errors other than "already busy" are also
    /// published as a terminal [`TurnEvent::Error`] before being returned.
    #[instrument(skip(self, request, cancel), fields(session_id = %request.session_id))]
    pub async fn run_turn(&self, request: TurnRequest, cancel: CancellationToken) -> anyhow::Result<()> {
        let session_id = request.session_id;
        let _guard = self.busy.acquire(session_id.to_string())?;

        match self.run_turn_inner(request, &cancel).await {
            Ok(finish_reason) => {
                self.broker.publish(TurnEvent::Response { session_id, finish_reason }).await;
                Ok(())
            }
            Err(err) => {
                self.broker.publish(TurnEvent::Error { session_id, message: err.to_string() }).await;
                Err(err)
            }
        }
    }

    async fn run_turn_inner(&self, request: TurnRequest, cancel: &CancellationToken) -> anyhow::Result<FinishReason> {
        let session_id = request.session_id;
        let model = self
            .provider
            .model(&request.model_id)
            .ok_or_else(|| anyhow::anyhow!("unknown model '{}'", request.model_id))?;

        let prior = self.messages.list(&session_id).await?;
        if prior.is_empty() {
            self.spawn_title_generation(session_id, &request);
        }

        let mut session = self.sessions.get(&session_id).await?;
        let mut history = apply_summary_cut(prior, session.summary_message_id);
        repair_history(&mut history);

        let mut user_message = Message::new(session_id, Role::User);
        user_message.parts.push(ContentPart::Text { text: request.user_text.clone() });
        user_message.parts.extend(request.attachments.clone());
        self.messages.append(&user_message).await?;
        history.push(user_message);

        let mut max_output_tokens = request.max_output_tokens;
        let mut last_pair: Option<ToolPair> = None;

        for cycle in 0..MAX_TURN_CYCLES {
            if cancel.is_cancelled() {
                warn!(%session_id, "turn cancelled before its next cycle started");
                return Ok(FinishReason::Canceled);
            }

            let estimated = self.count_tokens(&history, &request.model_id).await;
            if request.auto_compact && should_compact(estimated, model.context_window, cycle == 0) {
                self.broker.publish(TurnEvent::Summarizing { session_id }).await;
                history = self.compact(&session, &history, &request.summarizer_model_id, last_pair.take()).await?;
                session = self.sessions.get(&session_id).await?;
            }

            max_output_tokens = fit_max_tokens(self.provider.as_ref(), &model, estimated, max_output_tokens);

            let (mut assistant, finish_reason) =
                self.stream_cycle(&request, session_id, &history, cancel).await?;

            let calls = extract_tool_calls(&assistant);
            if calls.is_empty() || !matches!(finish_reason, FinishReason::ToolUse) {
                history.push(assistant);
                return Ok(finish_reason);
            }

            let (tool_message, denied) = self.dispatch_tools(&request, session_id, &calls, cancel).await?;
            self.messages.append(&tool_message).await?;

            if denied {
                self.set_finish_reason(&mut assistant, FinishReason::PermissionDenied).await?;
                history.push(assistant);
                history.push(tool_message);
                return Ok(FinishReason::PermissionDenied);
            }

            last_pair = Some(ToolPair { assistant: assistant.clone(), tool: tool_message.clone() });
            history.push(assistant);
            history.push(tool_message);
        }

        warn!(%session_id, "turn exceeded max cycle count without reaching a terminal event");
        Err(anyhow::anyhow!("turn exceeded {MAX_TURN_CYCLES} cycles without completing"))
    }

    /// Estimate `history`'s token count for `model_id` using the provider's
    /// count endpoint if it offers one, falling back to the local heuristic
    /// on error (spec §4.3 step (b)).
    async fn count_tokens(&self, history: &[Message], model_id: &str) -> u64 {
        match self.provider.count_tokens(history, model_id).await {
            Ok(count) => count,
            Err(err) => {
                debug!(error = %err, "provider count_tokens unavailable, falling back to local heuristic");
                estimate_tokens(history)
            }
        }
    }

    fn spawn_title_generation(&self, session_id: SessionId, request: &TurnRequest) {
        let descriptor = Arc::clone(&self.descriptor);
        let sessions = Arc::clone(&self.sessions);
        let model_id = request.descriptor_model_id.clone();
        let mut prompt_message = Message::new(session_id, Role::User);
        prompt_message.parts.push(ContentPart::Text { text: request.user_text.clone() });

        tokio::spawn(async move {
            let title = match collect_text(descriptor.as_ref(), &[prompt_message], &model_id).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(%session_id, error = %err, "title generation failed");
                    return;
                }
            };

            match sessions.get(&session_id).await {
                Ok(mut session) => {
                    session.title = title.lines().next().unwrap_or_default().trim().to_string();
                    if let Err(err) = sessions.save(&session).await {
                        warn!(%session_id, error = %err, "failed to persist generated title");
                    }
                }
                Err(err) => warn!(%session_id, error = %err, "title generation: session vanished"),
            }
        });
    }

    /// Synchronous compaction: summarize `history` through the dedicated
    /// summarizer provider, persist the summary as a new user-role message,
    /// stamp it as the session's summary marker, and rebuild the working
    /// history from what's now persisted.
    async fn compact(
        &self,
        session: &Session,
        history: &[Message],
        summarizer_model_id: &str,
        preserved_pair: Option<ToolPair>,
    ) -> anyhow::Result<Vec<Message>> {
        let session_id = session.id;
        let summary_text = collect_text(self.summarizer.as_ref(), history, summarizer_model_id).await?;

        let mut summary_message = Message::new(session_id, Role::User);
        summary_message.parts.push(ContentPart::Text { text: summary_text });
        self.messages.append(&summary_message).await?;

        let mut session = self.sessions.get(&session_id).await?;
        session.summary_message_id = Some(summary_message.id);
        self.sessions.save(&session).await?;

        let persisted = self.messages.list(&session_id).await?;
        let mut rebuilt = apply_summary_cut(persisted, session.summary_message_id);

        if let Some(pair) = preserved_pair {
            if !rebuilt.iter().any(|m| m.id == pair.assistant.id) {
                rebuilt.push(pair.assistant);
                rebuilt.push(pair.tool);
            }
        }

        Ok(rebuilt)
    }

    /// Stream one provider response, persisting the assistant sink message
    /// after every event, and return it plus its finish reason. Tool-use
    /// call ids from the provider are treated as position-only hints (they
    /// may be rewritten between start and completion): each start mints a
    /// fresh internal id, and the matching stop is taken to be whichever
    /// start is earliest still open, not whichever shares the provider's id.
    async fn stream_cycle(
        &self,
        request: &TurnRequest,
        session_id: SessionId,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> anyhow::Result<(Message, FinishReason)> {
        let mut assistant = Message::new(session_id, Role::Assistant);
        assistant.model_id = Some(request.model_id.clone());
        self.messages.append(&assistant).await?;

        let mut rx = self.provider.stream_response(history, &request.model_id).await?;
        let mut pending_starts: VecDeque<usize> = VecDeque::new();
        let mut finish_reason = FinishReason::EndTurn;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(%session_id, "turn cancelled mid-stream");
                    finish_reason = FinishReason::Canceled;
                    self.finalize_assistant(&mut assistant, finish_reason).await?;
                    self.repair_if_dangling(&assistant).await?;
                    return Ok((assistant, finish_reason));
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        StreamEvent::ContentDelta { text } => {
                            append_text(&mut assistant, text.clone());
                            self.messages.update(&assistant).await?;
                            self.broker.publish(TurnEvent::ContentDelta { session_id, text }).await;
                        }
                        StreamEvent::ThinkingDelta { text } => {
                            append_reasoning(&mut assistant, text.clone());
                            self.messages.update(&assistant).await?;
                            self.broker.publish(TurnEvent::ThinkingDelta { session_id, text }).await;
                        }
                        StreamEvent::ToolUseStart { name, .. } => {
                            let call_id = ToolCallId::new();
                            assistant.parts.push(ContentPart::ToolUse {
                                call_id,
                                name: name.clone(),
                                input: serde_json::Value::Null,
                                finished: false,
                            });
                            pending_starts.push_back(assistant.parts.len() - 1);
                            self.messages.update(&assistant).await?;
                            self.broker.publish(TurnEvent::ToolCallStarted { session_id, call_id, name }).await;
                        }
                        StreamEvent::ToolUseStop { input, .. } => {
                            if let Some(idx) = pending_starts.pop_front() {
                                if let ContentPart::ToolUse { input: slot, finished, .. } = &mut assistant.parts[idx] {
                                    *slot = input;
                                    *finished = true;
                                }
                                self.messages.update(&assistant).await?;
                            }
                        }
                        StreamEvent::Complete { usage, finish_reason: reason } => {
                            finish_reason = reason;
                            self.apply_usage(session_id, &request.model_id, usage).await?;
                            self.finalize_assistant(&mut assistant, finish_reason).await?;
                            break;
                        }
                        StreamEvent::Error { message } => {
                            finish_reason = FinishReason::Error;
                            self.finalize_assistant(&mut assistant, finish_reason).await?;
                            self.repair_if_dangling(&assistant).await?;
                            return Err(CoreError::ProviderError(message).into());
                        }
                    }
                }
            }
        }

        Ok((assistant, finish_reason))
    }

    async fn finalize_assistant(&self, assistant: &mut Message, reason: FinishReason) -> anyhow::Result<()> {
        assistant.parts.push(ContentPart::Finish { reason, at: chrono::Utc::now() });
        self.messages.update(assistant).await?;
        Ok(())
    }

    /// Overwrite an already-finalized assistant message's finish reason
    /// (spec §4.3 step (e): a permission denial during tool dispatch
    /// retroactively marks the assistant's finish reason, after the stream
    /// itself already finalized it as `tool_use`).
    async fn set_finish_reason(&self, assistant: &mut Message, reason: FinishReason) -> anyhow::Result<()> {
        match assistant.parts.iter_mut().rev().find_map(|part| match part {
            ContentPart::Finish { reason: existing, .. } => Some(existing),
            _ => None,
        }) {
            Some(existing) => *existing = reason,
            None => assistant.parts.push(ContentPart::Finish { reason, at: chrono::Utc::now() }),
        }
        self.messages.update(assistant).await?;
        Ok(())
    }

    async fn repair_if_dangling(&self, assistant: &Message) -> anyhow::Result<()> {
        if let Some(repair) = repair_dangling(assistant, None) {
            self.messages.append(&repair).await?;
        }
        Ok(())
    }

    /// Record the usage counters and propagate the resulting cost up the
    /// session's ancestor chain (spec §4.3 "Cost accounting").
    async fn apply_usage(&self, session_id: SessionId, model_id: &str, usage: Usage) -> anyhow::Result<()> {
        let mut session = self.sessions.get(&session_id).await?;
        session.record_usage(usage.prompt_tokens, usage.completion_tokens);
        self.sessions.save(&session).await?;

        if let Some(model) = self.provider.model(model_id) {
            let cost = calculate_cost(&model, &usage);
            genealogy::propagate_cost_to_ancestors(self.sessions.as_ref(), &session_id, cost).await?;
        }
        Ok(())
    }

    async fn dispatch_tools(
        &self,
        request: &TurnRequest,
        session_id: SessionId,
        calls: &[(ToolCallId, String, serde_json::Value)],
        cancel: &CancellationToken,
    ) -> anyhow::Result<(Message, bool)> {
        let mut tool_message = Message::new(session_id, Role::Tool);
        let mut denied = false;

        for (call_id, name, input) in calls {
            let call_id = *call_id;

            if denied || cancel.is_cancelled() {
                tool_message.parts.push(cancelled_result(call_id, name.clone()));
                continue;
            }

            let tool = request.tools.iter().find(|t| &t.info().name == name);
            let Some(tool) = tool else {
                tool_message.parts.push(ContentPart::ToolResult {
                    call_id,
                    name: name.clone(),
                    content: format!("tool '{name}' is not available in this turn"),
                    metadata: Default::default(),
                    is_error: true,
                    structured_output: false,
                });
                continue;
            };

            self.broker
                .publish(TurnEvent::ToolCallStarted { session_id, call_id, name: name.clone() })
                .await;

            if !request.gate.allow(name, &permission_input_string(input)) {
                tool_message.parts.push(ContentPart::ToolResult {
                    call_id,
                    name: name.clone(),
                    content: format!("permission denied for tool '{name}'"),
                    metadata: Default::default(),
                    is_error: true,
                    structured_output: false,
                });
                denied = true;
                self.broker
                    .publish(TurnEvent::ToolCallCompleted { session_id, call_id, name: name.clone(), is_error: true })
                    .await;
                continue;
            }

            let (output, is_error) = match tool.run(input.clone()).await {
                Ok(output) => (output, false),
                Err(ToolError::PermissionDenied(msg)) => {
                    denied = true;
                    (ToolOutput::from(msg), true)
                }
                Err(other) => (ToolOutput::from(other.to_string()), true),
            };

            tool_message.parts.push(ContentPart::ToolResult {
                call_id,
                name: name.clone(),
                content: output.content,
                metadata: output.metadata,
                is_error,
                structured_output: output.structured_output,
            });
            self.broker
                .publish(TurnEvent::ToolCallCompleted { session_id, call_id, name: name.clone(), is_error })
                .await;
        }

        Ok((tool_message, denied))
    }
}

/// Pull every finished tool-use block out of `assistant`, in stream order.
fn extract_tool_calls(assistant: &Message) -> Vec<(ToolCallId, String, serde_json::Value)> {
    assistant
        .parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::ToolUse { call_id, name, input, finished: true } => {
                Some((*call_id, name.clone(), input.clone()))
            }
            _ => None,
        })
        .collect()
}

/// The string a permission glob is matched against (spec §4.1). Most
/// permission patterns target a command-shaped tool like `bash` whose input
/// carries a `command` field; fall back to the raw JSON for tools with a
/// different input shape.
fn permission_input_string(input: &serde_json::Value) -> String {
    input
        .get("command")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| input.to_string())
}

fn cancelled_result(call_id: ToolCallId, name: String) -> ContentPart {
    ContentPart::ToolResult {
        call_id,
        name,
        content: "cancelled".to_string(),
        metadata: Default::default(),
        is_error: true,
        structured_output: false,
    }
}

fn append_text(message: &mut Message, text: String) {
    if let Some(ContentPart::Text { text: existing }) = message.parts.last_mut() {
        existing.push_str(&text);
    } else {
        message.parts.push(ContentPart::Text { text });
    }
}

fn append_reasoning(message: &mut Message, text: String) {
    if let Some(ContentPart::Reasoning { text: existing }) = message.parts.last_mut() {
        existing.push_str(&text);
    } else {
        message.parts.push(ContentPart::Reasoning { text });
    }
}

async fn collect_text(provider: &dyn Provider, messages: &[Message], model_id: &str) -> anyhow::Result<String> {
    let mut rx = provider.stream_response(messages, model_id).await?;
    let mut text = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::ContentDelta { text: delta } => text.push_str(&delta),
            StreamEvent::Complete { .. } => break,
            StreamEvent::Error { message } => return Err(CoreError::ProviderError(message).into()),
            _ => {}
        }
    }
    Ok(text)
}

fn fit_max_tokens(provider: &dyn Provider, model: &ModelInfo, estimated: u64, mut max_out: u32) -> u32 {
    let floor = ((model.context_window as f64) * MIN_MAX_TOKENS_FRACTION) as u64;
    while estimated + max_out as u64 >= model.context_window && max_out as u64 > floor {
        max_out = provider.adjust_max_tokens(max_out);
    }
    if estimated + max_out as u64 >= model.context_window {
        warn!(
            estimated,
            max_out,
            context_window = model.context_window,
            "max-output-tokens budget could not be shrunk below 5% of context window; proceeding anyway"
        );
    }
    debug!(max_out, "adapted max-output-tokens for this cycle");
    max_out
}
