//! Error types for the bridge.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// The inbound request cannot be translated as given.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The operation exists on the strategy interface but no backend implements it.
    #[error("Not implemented: {operation}")]
    NotImplemented { operation: &'static str },

    #[error("Unknown backend '{name}'. Known backends: {known}")]
    UnknownBackend { name: String, known: String },

    /// A stream event parsed as JSON but does not have the expected shape.
    #[error("Stream decode error: {message}")]
    Decode { message: String },

    #[error("Chat template error: {message}")]
    Template { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BridgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub const fn not_implemented(operation: &'static str) -> Self {
        Self::NotImplemented { operation }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
