//! Relay a backend event stream to `OpenAI` streaming chunks.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;

use crate::dispatch::InferenceStrategy;
use crate::error::Result;
use crate::translate::openai_types::ChatCompletionChunk;
use crate::translate::request::RequestTranslator;
use crate::translate::streaming::{ChunkDecoder, ToolCallIndexState};

/// Terminal SSE line sent after the last chunk.
pub const SSE_DONE: &str = "data: [DONE]\n\n";

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// Decode `frames` in arrival order with a fresh tool-call state.
///
/// Blank frames are skipped. The first error (from the source or from
/// decoding) is yielded and ends the stream.
pub fn decode_stream(
    strategy: Arc<dyn InferenceStrategy>,
    model: String,
    frames: impl Stream<Item = Result<Bytes>> + Send + 'static,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut state = ToolCallIndexState::new();
        let mut decoded = 0usize;
        let mut skipped = 0usize;

        tokio::pin!(frames);

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!(error = %e, decoded, "Backend stream failed");
                    yield Err(e);
                    return;
                }
            };

            // Keep-alive padding between events carries no event.
            if frame.iter().all(u8::is_ascii_whitespace) {
                skipped += 1;
                tracing::trace!(len = frame.len(), decoded, "Skipping blank stream frame");
                continue;
            }

            match strategy.decode_chunk(&frame, &model, &mut state) {
                Ok(chunk) => {
                    decoded += 1;
                    yield Ok(chunk);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        decoded,
                        frame = %String::from_utf8_lossy(&frame),
                        "Undecodable stream frame, closing stream"
                    );
                    yield Err(e);
                    return;
                }
            }
        }

        tracing::info!(
            strategy = strategy.name(),
            model = %model,
            frames = decoded,
            skipped,
            tool_calls = state.tool_calls_started(),
            "Stream completed"
        );
    })
}

/// Render one chunk as an SSE `data:` line.
pub fn chunk_to_sse(chunk: &ChatCompletionChunk) -> Result<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(chunk)?))
}

/// Turn a chunk stream into SSE text, closed by [`SSE_DONE`] when it ends cleanly.
pub fn encode_sse(chunks: ChunkStream) -> impl Stream<Item = Result<String>> + Send {
    async_stream::stream! {
        let mut chunks = chunks;
        while let Some(chunk) = chunks.next().await {
            match chunk.and_then(|c| chunk_to_sse(&c)) {
                Ok(line) => yield Ok(line),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        yield Ok(SSE_DONE.to_string());
    }
}
