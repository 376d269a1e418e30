//! Translation between the `OpenAI` chat-completion format and backend formats.
//!
//! Requests go out through a [`request::RequestTranslator`] per backend
//! family; streamed backend events come back through
//! [`streaming::ChunkDecoder`]. Apart from the injected chat template, all
//! translation functions are pure (no I/O).

pub mod anthropic;
pub mod anthropic_types;
pub mod chat_template;
pub mod content;
pub mod openai_types;
pub mod request;
pub mod streaming;
