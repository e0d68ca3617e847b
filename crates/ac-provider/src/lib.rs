//! The model provider boundary: a streaming request/response contract plus
//! cost accounting, kept deliberately thin so the executor can drive any
//! backend (a hosted API, a local model server, a scripted test double)
//! through the same channel-based interface.

use ac_core::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

const STREAM_CHANNEL_CAPACITY: usize = 128;

/// Static facts about a model needed for context management and billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub context_window: u64,
    pub max_output_tokens: u32,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    pub cache_creation_cost_per_million: f64,
    pub cache_read_cost_per_million: f64,
}

/// Token usage reported for a single completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

/// Cost in dollars for `usage` against `model`'s per-million rates
/// (spec §4.2: sum of four rate x token products).
pub fn calculate_cost(model: &ModelInfo, usage: &Usage) -> f64 {
    let million = 1_000_000.0;
    (usage.prompt_tokens as f64 * model.input_cost_per_million
        + usage.completion_tokens as f64 * model.output_cost_per_million
        + usage.cache_creation_tokens as f64 * model.cache_creation_cost_per_million
        + usage.cache_read_tokens as f64 * model.cache_read_cost_per_million)
        / million
}

/// Events emitted while a model response streams in (spec §4.2).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    ContentDelta { text: String },
    ThinkingDelta { text: String },
    ToolUseStart { call_id: String, name: String },
    ToolUseStop { call_id: String, input: serde_json::Value },
    Complete { usage: Usage, finish_reason: ac_core::FinishReason },
    Error { message: String },
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Begin streaming a response to `messages` using `model_id`. Events are
    /// delivered over the returned receiver in arrival order, terminated by
    /// exactly one `Complete` or `Error` event.
    async fn stream_response(
        &self,
        messages: &[Message],
        model_id: &str,
    ) -> anyhow::Result<mpsc::Receiver<StreamEvent>>;

    /// Estimate the token count `messages` would occupy under `model_id`,
    /// used to decide whether compaction is needed before the next turn.
    async fn count_tokens(&self, messages: &[Message], model_id: &str) -> anyhow::Result<u64>;

    fn model(&self, model_id: &str) -> Option<ModelInfo>;

    /// Halve `current` as the response-size backoff when a completion
    /// overruns the context window (spec §4.2); never below a token.
    fn adjust_max_tokens(&self, current: u32) -> u32 {
        (current / 2).max(1)
    }
}

/// A scripted in-memory `Provider`, for this crate's own tests and for
/// other crates' dev-dependencies on `ac-provider` (e.g. `ac-executor`'s
/// turn-loop tests). Not gated behind `#[cfg(test)]` since a downstream
/// crate's test build can't see through that gate across a crate boundary.
pub mod test_double {
    //! Replays a fixed sequence of events per call, regardless of input.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct ScriptedProvider {
        model: ModelInfo,
        scripts: Mutex<Vec<Vec<StreamEvent>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new(model: ModelInfo, scripts: Vec<Vec<StreamEvent>>) -> Self {
            Self { model, scripts: Mutex::new(scripts), calls: AtomicUsize::new(0) }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn stream_response(
            &self,
            _messages: &[Message],
            _model_id: &str,
        ) -> anyhow::Result<mpsc::Receiver<StreamEvent>> {
            let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
            let events = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.is_empty() {
                    vec![]
                } else {
                    let idx = call_index.min(scripts.len() - 1);
                    std::mem::take(&mut scripts[idx])
                }
            };

            let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }

        async fn count_tokens(&self, messages: &[Message], _model_id: &str) -> anyhow::Result<u64> {
            let chars: usize = messages
                .iter()
                .flat_map(|m| m.parts.iter())
                .map(|part| match part {
                    ac_core::ContentPart::Text { text } => text.len(),
                    ac_core::ContentPart::Reasoning { text } => text.len(),
                    _ => 0,
                })
                .sum();
            Ok((chars / 4) as u64)
        }

        fn model(&self, model_id: &str) -> Option<ModelInfo> {
            (self.model.id == model_id).then(|| self.model.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelInfo {
        ModelInfo {
            id: "m".into(),
            context_window: 100_000,
            max_output_tokens: 4096,
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
            cache_creation_cost_per_million: 3.75,
            cache_read_cost_per_million: 0.3,
        }
    }

    #[test]
    fn cost_sums_all_four_rate_products() {
        let usage = Usage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            cache_creation_tokens: 1_000_000,
            cache_read_tokens: 1_000_000,
        };
        let cost = calculate_cost(&model(), &usage);
        assert_eq!(cost, 3.0 + 15.0 + 3.75 + 0.3);
    }

    #[test]
    fn zero_usage_is_zero_cost() {
        assert_eq!(calculate_cost(&model(), &Usage::default()), 0.0);
    }

    #[tokio::test]
    async fn scripted_provider_replays_its_script() {
        use test_double::ScriptedProvider;
        let provider = ScriptedProvider::new(
            model(),
            vec![vec![
                StreamEvent::ContentDelta { text: "hi".into() },
                StreamEvent::Complete {
                    usage: Usage::default(),
                    finish_reason: ac_core::FinishReason::EndTurn,
                },
            ]],
        );
        let mut rx = provider.stream_response(&[], "m").await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::ContentDelta { text } if text == "hi"));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, StreamEvent::Complete { .. }));
    }

    #[test]
    fn adjust_max_tokens_halves_and_floors_at_one() {
        use test_double::ScriptedProvider;
        let provider = ScriptedProvider::new(model(), vec![]);
        assert_eq!(provider.adjust_max_tokens(4096), 2048);
        assert_eq!(provider.adjust_max_tokens(1), 1);
    }
}
