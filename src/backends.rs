//! The closed set of backends the bridge can translate for.
//!
//! Each backend names its request family and, for chat-template backends, the
//! hook it applies to the conversation before rendering. Users pick a backend
//! by name in their config or on the command line.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;
use crate::translate::chat_template::TemplateHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Anthropic models served through Bedrock.
    Anthropic,
    /// Any local model whose prompt comes from its tokenizer's chat template.
    Custom,
    Gemma,
    Lingshu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFamily {
    MessagesApi,
    ChatTemplate,
}

const ALL: &[Backend] = &[
    Backend::Anthropic,
    Backend::Custom,
    Backend::Gemma,
    Backend::Lingshu,
];

impl Backend {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub fn all() -> &'static [Backend] {
        ALL
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Backend::Anthropic => "anthropic",
            Backend::Custom => "custom",
            Backend::Gemma => "gemma",
            Backend::Lingshu => "lingshu",
        }
    }

    #[must_use]
    pub const fn family(self) -> BackendFamily {
        match self {
            Backend::Anthropic => BackendFamily::MessagesApi,
            Backend::Custom | Backend::Gemma | Backend::Lingshu => BackendFamily::ChatTemplate,
        }
    }

    #[must_use]
    pub const fn template_hook(self) -> Option<TemplateHook> {
        match self {
            Backend::Gemma => Some(TemplateHook::NativeImageMarkers),
            Backend::Lingshu => Some(TemplateHook::SingleTrailingImage),
            Backend::Anthropic | Backend::Custom => None,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Backend::Anthropic => "Bedrock Anthropic Messages API",
            Backend::Custom => "local model, prompt rendered by its chat template",
            Backend::Gemma => "local Gemma, images passed as native image markers",
            Backend::Lingshu => "local Lingshu, only the last image is forwarded",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| BridgeError::UnknownBackend {
            name: s.to_string(),
            known: ALL.iter().map(|b| b.name()).collect::<Vec<_>>().join(", "),
        })
    }
}
