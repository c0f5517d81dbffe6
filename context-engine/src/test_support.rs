//! Test-only provider stubs shared across component test modules.
//!
//! Grounded on the teacher's `RecordedGenerationBackend` pattern
//! (`llama-agent::generation_backend::recorded`), which plays back fixed
//! responses instead of performing real inference so tests stay fast and
//! deterministic.
#![cfg(test)]

use crate::provider::{ChatRequest, ModelInfo, ProviderAdapter, StreamEvent};
use crate::types::VRAMSample;
use async_trait::async_trait;
use futures::stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Always returns a short canned summary; used wherever a test needs a
/// provider but does not care about its content.
pub struct NullProvider;

#[async_trait]
impl ProviderAdapter for NullProvider {
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: CancellationToken,
    ) -> Result<Pin<Box<dyn futures::Stream<Item = StreamEvent> + Send>>, String> {
        Ok(Box::pin(stream::iter(vec![
            StreamEvent::Delta("stub summary".to_string()),
            StreamEvent::Done,
        ])))
    }

    async fn vram(&self) -> VRAMSample {
        VRAMSample::Unknown
    }

    async fn model_info(&self, _model_id: &str) -> Option<ModelInfo> {
        None
    }
}

/// Returns a fixed VRAM reading, for sizing/monitor tests that need a known
/// free-byte ratio.
pub struct FixedVramProvider {
    pub sample: VRAMSample,
}

#[async_trait]
impl ProviderAdapter for FixedVramProvider {
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: CancellationToken,
    ) -> Result<Pin<Box<dyn futures::Stream<Item = StreamEvent> + Send>>, String> {
        Ok(Box::pin(stream::iter(vec![StreamEvent::Done])))
    }

    async fn vram(&self) -> VRAMSample {
        self.sample
    }

    async fn model_info(&self, _model_id: &str) -> Option<ModelInfo> {
        None
    }
}
