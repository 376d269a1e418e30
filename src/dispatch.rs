//! Strategy selection: one entry point fronting every backend translator.

use std::sync::Arc;

use crate::backends::{Backend, BackendFamily};
use crate::error::Result;
use crate::template::ChatTemplate;
use crate::translate::anthropic::AnthropicTranslator;
use crate::translate::chat_template::TemplateTranslator;
use crate::translate::openai_types::{ChatCompletionChunk, ChatCompletionRequest};
use crate::translate::request::{ProviderRequest, RequestTranslator, TranslationParams};
use crate::translate::streaming::{ChunkDecoder, ToolCallIndexState};

/// A complete backend strategy: request translation plus stream decoding.
///
/// Only types implementing both halves can be installed in a [`Dispatcher`],
/// so every active strategy can decode streams.
pub trait InferenceStrategy: RequestTranslator + ChunkDecoder {}

impl<T: RequestTranslator + ChunkDecoder> InferenceStrategy for T {}

/// Build the built-in strategy for `backend`.
pub fn strategy_for(backend: Backend, template: Arc<dyn ChatTemplate>) -> Arc<dyn InferenceStrategy> {
    match backend.family() {
        BackendFamily::MessagesApi => Arc::new(AnthropicTranslator),
        BackendFamily::ChatTemplate => Arc::new(TemplateTranslator::new(
            backend.name(),
            backend.template_hook(),
            template,
        )),
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    strategy: Arc<dyn InferenceStrategy>,
}

impl Dispatcher {
    pub fn new(backend: Backend, template: Arc<dyn ChatTemplate>) -> Self {
        tracing::debug!(%backend, "Selected backend strategy");
        Self {
            strategy: strategy_for(backend, template),
        }
    }

    /// # Errors
    /// Returns `BridgeError::UnknownBackend` for names outside the known set.
    pub fn from_name(name: &str, template: Arc<dyn ChatTemplate>) -> Result<Self> {
        let backend: Backend = name.parse()?;
        Ok(Self::new(backend, template))
    }

    /// Replace the active strategy, e.g. for fallback routing or tests.
    pub fn set_strategy(&mut self, strategy: Arc<dyn InferenceStrategy>) -> &mut Self {
        tracing::debug!(strategy = strategy.name(), "Replaced backend strategy");
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> Arc<dyn InferenceStrategy> {
        Arc::clone(&self.strategy)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn translate_request(
        &self,
        request: ChatCompletionRequest,
        params: &TranslationParams,
    ) -> Result<ProviderRequest> {
        self.strategy.translate_request(request, params).await
    }

    pub fn translate_response(&self, response: &serde_json::Value) -> Result<serde_json::Value> {
        self.strategy.translate_response(response)
    }

    pub fn decode_chunk(
        &self,
        bytes: &[u8],
        model: &str,
        state: &mut ToolCallIndexState,
    ) -> Result<ChatCompletionChunk> {
        self.strategy.decode_chunk(bytes, model, state)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
