//! Optional tool settings file.
//!
//! `supertask.toml` in the configuration directory carries operator
//! defaults for the LLM connection. Environment variables always win
//! over the file.
//!
//! ```toml
//! [llm]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//! timeout_ms = 60000
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::{Error, Result};

/// Settings filename inside the configuration directory.
pub const SETTINGS_FILE: &str = "supertask.toml";

/// Parsed `supertask.toml`. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolSettings {
    /// LLM connection defaults.
    #[serde(default)]
    pub llm: LlmSettings,
}

/// `[llm]` table of the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSettings {
    /// Completion endpoint URL.
    pub endpoint: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl ToolSettings {
    /// Loads the settings file from `dir`, defaulting when absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when the file exists but does not parse.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| Error::ConfigInvalid {
            key: SETTINGS_FILE.to_string(),
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        toml::from_str(&text).map_err(|e| Error::ConfigInvalid {
            key: SETTINGS_FILE.to_string(),
            message: e.to_string(),
        })
    }
}
