use crate::backends::Backend;
use crate::error::{BridgeError, Result};
use crate::translate::request::TranslationParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Backend identifier, one of the names in [`Backend::all`].
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Default system prompt merged into every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Tokenizer identifier handed to the chat template (template backends only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_template_id: Option<String>,
    /// Where the translation journal is written; no journal when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_file: Option<PathBuf>,
}

fn default_backend() -> String {
    Backend::Anthropic.name().to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            system_instruction: None,
            model_template_id: None,
            journal_file: None,
        }
    }
}

impl BridgeConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir
    ///
    /// An explicit path must exist. Without one, a missing file means defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn backend(&self) -> Result<Backend> {
        self.backend.parse()
    }

    pub fn params(&self) -> TranslationParams {
        TranslationParams {
            system_instruction: self.system_instruction.clone(),
            model_template_id: self.model_template_id.clone(),
        }
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("inference-bridge.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("inference-bridge").join("config.toml"));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("inference-bridge").join("config.toml"));
        paths.push(home.join(".inference-bridge.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
backend = "gemma"
system_instruction = "You are a radiology assistant."
model_template_id = "google/gemma-3-4b-it"
journal_file = "/tmp/bridge.jsonl"
"#
        )
        .unwrap();

        let config = BridgeConfig::load(f.path()).unwrap();
        assert_eq!(config.backend().unwrap(), Backend::Gemma);
        assert_eq!(config.journal_file, Some(PathBuf::from("/tmp/bridge.jsonl")));

        let params = config.params();
        assert_eq!(
            params.system_instruction.as_deref(),
            Some("You are a radiology assistant.")
        );
        assert_eq!(params.model_template_id.as_deref(), Some("google/gemma-3-4b-it"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = BridgeConfig::load(f.path()).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.backend().unwrap(), Backend::Anthropic);
    }

    #[test]
    fn test_unknown_backend_surfaces_on_lookup() {
        let config = BridgeConfig {
            backend: "vertex".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.backend(),
            Err(BridgeError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "backend = [").unwrap();
        assert!(matches!(
            BridgeConfig::load(f.path()),
            Err(BridgeError::Toml(_))
        ));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            BridgeConfig::find_and_load(Some(missing.as_path())),
            Err(BridgeError::Config { .. })
        ));
    }

    #[test]
    fn test_search_paths_start_in_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("inference-bridge.toml"));
        assert!(paths.iter().all(|p| p.ends_with("config.toml")
            || p.ends_with("inference-bridge.toml")
            || p.ends_with(".inference-bridge.toml")));
    }
}
