//! The LLM provider adapter contract (engine → adapter).
//!
//! The engine never speaks a network protocol or links an inference engine
//! directly; everything flows through this trait, following the teacher's
//! `GenerationBackend` abstraction (`llama-agent::generation_backend`) which
//! keeps real inference, fixture playback, and recording behind one trait
//! object.

use crate::types::{Message, VRAMSample};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One chunk of a streaming chat completion.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Delta(String),
    ToolCall { id: String, name: String, arguments: String },
    Done,
    Error(String),
}

/// A bounded chat request sent to the provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub max_context: usize,
    pub capabilities: Vec<String>,
}

/// Engine → adapter contract. Every call carries a cancellation token per
/// the concurrency model's "every provider call carries a cancellation
/// token" requirement.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<Pin<Box<dyn Stream<Item = StreamEvent> + Send>>, String>;

    /// Returns the latest VRAM sample, or `Unknown` if the probe failed.
    async fn vram(&self) -> VRAMSample;

    async fn model_info(&self, model_id: &str) -> Option<ModelInfo>;
}

/// Runs a non-streaming summarization chat call bounded by `timeout`,
/// collecting deltas into a single string. Grounded on `querymt`'s
/// `DelegationSummarizer`, which wraps `provider.chat()` in
/// `tokio::time::timeout` rather than relying on the provider to enforce
/// its own bound.
pub async fn summarize_bounded(
    provider: &dyn ProviderAdapter,
    request: ChatRequest,
    cancel: CancellationToken,
    timeout: Duration,
) -> Result<String, SummarizeError> {
    use futures::StreamExt;

    let call = async {
        let mut stream = provider
            .chat(request, cancel.clone())
            .await
            .map_err(SummarizeError::Provider)?;

        let mut out = String::new();
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Delta(text) => out.push_str(&text),
                StreamEvent::ToolCall { .. } => {
                    // Summarization prompts never request tools; ignore.
                }
                StreamEvent::Done => break,
                StreamEvent::Error(msg) => return Err(SummarizeError::Provider(msg)),
            }
        }
        Ok(out)
    };

    tokio::select! {
        result = call => result,
        _ = tokio::time::sleep(timeout) => {
            cancel.cancel();
            Err(SummarizeError::Timeout(timeout))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VRAMReading;
    use chrono::Utc;
    use futures::stream;

    struct StubProvider {
        chunks: Vec<StreamEvent>,
    }

    #[async_trait]
    impl ProviderAdapter for StubProvider {
        async fn chat(
            &self,
            _request: ChatRequest,
            _cancel: CancellationToken,
        ) -> Result<Pin<Box<dyn Stream<Item = StreamEvent> + Send>>, String> {
            Ok(Box::pin(stream::iter(self.chunks.clone())))
        }

        async fn vram(&self) -> VRAMSample {
            VRAMSample::Reading(VRAMReading {
                total_bytes: 8_000_000_000,
                used_bytes: 1_000_000_000,
                free_bytes: 7_000_000_000,
                sampled_at: Utc::now(),
            })
        }

        async fn model_info(&self, _model_id: &str) -> Option<ModelInfo> {
            None
        }
    }

    #[tokio::test]
    async fn collects_deltas_until_done() {
        let provider = StubProvider {
            chunks: vec![
                StreamEvent::Delta("hello ".into()),
                StreamEvent::Delta("world".into()),
                StreamEvent::Done,
            ],
        };
        let request = ChatRequest {
            model_id: "m".into(),
            messages: vec![],
            max_tokens: None,
        };
        let result = summarize_bounded(&provider, request, CancellationToken::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, "hello world");
    }
}
