//! Decoder turning backend stream events into `OpenAI` streaming chunks.
//!
//! Each call decodes one backend frame into exactly one [`ChatCompletionChunk`].
//! Tool calls need state across frames: the backend identifies a tool call by
//! its content-block index, while `OpenAI` clients accumulate arguments under a
//! tool-call slot. [`ToolCallIndexState`] holds that mapping for one stream.
//!
//! Usage:
//!   let mut state = ToolCallIndexState::new();
//!   for frame in frames {
//!       let chunk = decode_chunk(&frame, "my-model", &mut state)?;
//!       // send chunk as SSE
//!   }

use std::collections::HashMap;

use super::anthropic_types::{BlockDelta, CompletionFragment, StartBlock, StreamEvent};
use super::openai_types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkToolCall, ChunkToolCallFunction,
    CHUNK_OBJECT,
};
use crate::error::Result;

/// Model name echoed when the caller does not supply one.
pub const FALLBACK_MODEL: &str = "custom-model";

/// Maps backend content-block indices to `OpenAI` tool-call slots for one stream.
///
/// Create one per in-flight stream and pass it to every decode call of that
/// stream, in arrival order. Slots are handed out in the order tool-use blocks
/// start, so sharing a state between streams or decoding out of order
/// assigns wrong slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallIndexState {
    slots: HashMap<u64, u32>,
    counter: u32,
}

impl ToolCallIndexState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `block_index` the next free slot.
    pub fn assign(&mut self, block_index: u64) -> u32 {
        let slot = self.counter;
        self.slots.insert(block_index, slot);
        self.counter += 1;
        slot
    }

    pub fn slot(&self, block_index: u64) -> Option<u32> {
        self.slots.get(&block_index).copied()
    }

    /// Number of tool calls started so far.
    pub fn tool_calls_started(&self) -> u32 {
        self.counter
    }
}

/// Streaming decode capability shared by every backend strategy.
pub trait ChunkDecoder: Send + Sync {
    /// # Errors
    /// Fails when `bytes` is not a well-formed event; the stream is broken.
    fn decode_chunk(
        &self,
        bytes: &[u8],
        model: &str,
        state: &mut ToolCallIndexState,
    ) -> Result<ChatCompletionChunk> {
        decode_chunk(bytes, model, state)
    }
}

/// Decode one raw backend frame.
pub fn decode_chunk(
    bytes: &[u8],
    model: &str,
    state: &mut ToolCallIndexState,
) -> Result<ChatCompletionChunk> {
    let event = StreamEvent::from_slice(bytes)?;
    tracing::trace!(event = event.event_name(), "Decoded stream event");
    Ok(event_to_chunk(&event, model, state))
}

/// Build the chunk for an already-parsed event, updating `state` for tool-use starts.
pub fn event_to_chunk(
    event: &StreamEvent,
    model: &str,
    state: &mut ToolCallIndexState,
) -> ChatCompletionChunk {
    let mut delta = ChunkDelta::default();
    let mut finish_reason = None;

    match event {
        StreamEvent::Completion(fragment) => {
            apply_completion(fragment, &mut delta, &mut finish_reason);
        }
        StreamEvent::ContentBlockDelta { index, delta: block_delta } => match block_delta {
            BlockDelta::TextDelta { text } => delta.content = Some(text.clone()),
            BlockDelta::InputJsonDelta { partial_json } => {
                let slot = state.slot(*index).unwrap_or(0);
                delta.tool_calls = Some(vec![arguments_fragment(slot, partial_json.clone())]);
            }
            BlockDelta::Other => {}
        },
        StreamEvent::ContentBlockStart {
            index,
            content_block: StartBlock::ToolUse { id, name },
        } => {
            let slot = state.assign(*index);
            tracing::debug!(slot, block_index = index, tool = %name, "Tool call started");
            delta.tool_calls = Some(vec![ChunkToolCall {
                index: slot,
                id: Some(id.clone()),
                call_type: Some("function".to_string()),
                function: Some(ChunkToolCallFunction {
                    name: Some(name.clone()),
                    arguments: Some(String::new()),
                }),
            }]);
        }
        StreamEvent::ContentBlockStart {
            content_block: StartBlock::Other,
            ..
        } => {}
        StreamEvent::ContentBlockStop { index } => {
            // Close with "{}" so the accumulated arguments parse even if no delta arrived.
            if let Some(slot) = state.slot(*index) {
                delta.tool_calls = Some(vec![arguments_fragment(slot, "{}".to_string())]);
            }
        }
        StreamEvent::MessageStop => finish_reason = Some("stop".to_string()),
        StreamEvent::Other(kind) => {
            tracing::trace!(kind = %kind, "Ignoring stream event");
        }
    }

    make_chunk(model, delta, finish_reason)
}

fn apply_completion(
    fragment: &CompletionFragment,
    delta: &mut ChunkDelta,
    finish_reason: &mut Option<String>,
) {
    let Some(choice) = fragment.choices.first() else {
        return;
    };
    if choice.stop_reason.as_deref() == Some("stop") {
        *finish_reason = Some("stop".to_string());
    } else {
        delta.content = choice.text.clone();
    }
}

fn arguments_fragment(slot: u32, arguments: String) -> ChunkToolCall {
    ChunkToolCall {
        index: slot,
        id: None,
        call_type: None,
        function: Some(ChunkToolCallFunction {
            name: None,
            arguments: Some(arguments),
        }),
    }
}

fn make_chunk(model: &str, delta: ChunkDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
    let model = if model.is_empty() { FALLBACK_MODEL } else { model };
    ChatCompletionChunk {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: CHUNK_OBJECT.to_string(),
        created: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
    }
}
