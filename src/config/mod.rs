//! Configuration management.
//!
//! Loads the three human-edited configuration documents (persona,
//! preprocessing prompts, generation prompts) plus the supertask schema,
//! validates them once, and caches the result process-wide. Tests call
//! [`ConfigStore::clear_cache`] to stay hermetic and point
//! `SUPERTASK_CONFIG_DIR` at a fixture directory.

mod persona;
mod prompts;
mod settings;

pub use persona::{
    CommunicationRules, DEFAULT_FRAMEWORK, EngagementStage, FRAMEWORK_COUNT, Framework, Identity,
    PersonaConfig, ReferencePolicy, Substitution,
};
pub use prompts::{
    GENERATION_SLOTS, GenerationPrompts, PREPROCESSING_SLOTS, PreprocessingPrompts,
};
pub use settings::{LlmSettings, SETTINGS_FILE, ToolSettings};

#[cfg(test)]
pub(crate) use persona::fixtures as persona_fixtures;
#[cfg(test)]
pub(crate) use prompts::fixtures as prompt_fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::{Error, Result};

/// The only schema version this pipeline emits and validates.
pub const SCHEMA_VERSION: &str = "1.1";

/// Persona document filename.
pub const PERSONA_FILE: &str = "persona.yaml";
/// Preprocessing prompt template filename.
pub const PREPROCESSING_PROMPTS_FILE: &str = "preprocessing_prompts.yaml";
/// Generation prompt template filename.
pub const GENERATION_PROMPTS_FILE: &str = "generation_prompts.yaml";
/// Supertask schema document filename.
pub const SCHEMA_FILE: &str = "supertask_schema_v1.1.json";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SUPERTASK_CONFIG_DIR";

static CACHE: Mutex<Option<Arc<ConfigStore>>> = Mutex::new(None);

/// Loaded, validated configuration shared read-only across the pipeline.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    persona: PersonaConfig,
    preprocessing: PreprocessingPrompts,
    generation: GenerationPrompts,
    schema: serde_json::Value,
    settings: ToolSettings,
    /// Directory the documents were loaded from.
    pub config_dir: PathBuf,
}

impl ConfigStore {
    /// Loads and validates every configuration document from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the offending file or key.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let persona = PersonaConfig::from_yaml(&read_config_file(dir, PERSONA_FILE)?)?;
        let preprocessing =
            PreprocessingPrompts::from_yaml(&read_config_file(dir, PREPROCESSING_PROMPTS_FILE)?)?;
        let generation =
            GenerationPrompts::from_yaml(&read_config_file(dir, GENERATION_PROMPTS_FILE)?)?;
        let schema = parse_schema(&read_config_file(dir, SCHEMA_FILE)?)?;
        let settings = ToolSettings::load(dir)?;

        tracing::debug!(dir = %dir.display(), "configuration loaded");
        Ok(Self {
            persona,
            preprocessing,
            generation,
            schema,
            settings,
            config_dir: dir.to_path_buf(),
        })
    }

    /// Loads from the default directory: `SUPERTASK_CONFIG_DIR` when set,
    /// else `./config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when no configuration directory exists or a
    /// document fails validation.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_dir()?)
    }

    /// Returns the process-wide shared store, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the load error on first use; later calls reuse the cache.
    pub fn shared() -> Result<Arc<Self>> {
        let mut cache = CACHE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(store) = cache.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(Self::load_default()?);
        *cache = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Drops the process-wide cache. Intended for tests.
    pub fn clear_cache() {
        let mut cache = CACHE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *cache = None;
    }

    /// Builds a store from already-parsed parts. Intended for tests and
    /// embedded callers.
    #[must_use]
    pub fn from_parts(
        persona: PersonaConfig,
        preprocessing: PreprocessingPrompts,
        generation: GenerationPrompts,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            persona,
            preprocessing,
            generation,
            schema,
            settings: ToolSettings::default(),
            config_dir: PathBuf::new(),
        }
    }

    /// Operator tool settings (`supertask.toml`), default when absent.
    #[must_use]
    pub const fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// The coaching persona.
    #[must_use]
    pub const fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    /// Stage-1 prompt templates.
    #[must_use]
    pub const fn preprocessing_prompts(&self) -> &PreprocessingPrompts {
        &self.preprocessing
    }

    /// Stage-3 prompt templates.
    #[must_use]
    pub const fn generation_prompts(&self) -> &GenerationPrompts {
        &self.generation
    }

    /// The supertask schema document for `version`.
    ///
    /// Only [`SCHEMA_VERSION`] is supported; earlier versions are
    /// deprecated and rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for any other version.
    pub fn schema(&self, version: &str) -> Result<&serde_json::Value> {
        if version == SCHEMA_VERSION {
            Ok(&self.schema)
        } else {
            Err(Error::ConfigInvalid {
                key: "schema.version".to_string(),
                message: format!("unsupported schema version '{version}', only {SCHEMA_VERSION}"),
            })
        }
    }
}

fn read_config_file(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    std::fs::read_to_string(&path).map_err(|e| Error::ConfigInvalid {
        key: name.to_string(),
        message: format!("cannot read {}: {e}", path.display()),
    })
}

fn parse_schema(text: &str) -> Result<serde_json::Value> {
    let schema: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::ConfigInvalid {
            key: SCHEMA_FILE.to_string(),
            message: e.to_string(),
        })?;
    if !schema.get("properties").is_some_and(serde_json::Value::is_object) {
        return Err(Error::ConfigInvalid {
            key: format!("{SCHEMA_FILE}.properties"),
            message: "schema document must declare an object 'properties' map".to_string(),
        });
    }
    Ok(schema)
}

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let local = PathBuf::from("config");
    if local.is_dir() {
        return Ok(local);
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "supertask") {
        let dir = dirs.config_dir().to_path_buf();
        if dir.is_dir() {
            return Ok(dir);
        }
    }
    Err(Error::ConfigInvalid {
        key: CONFIG_DIR_ENV.to_string(),
        message: "no configuration directory found; set SUPERTASK_CONFIG_DIR or create ./config"
            .to_string(),
    })
}

/// Test fixtures shared across the crate's test modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::{
        ConfigStore, GenerationPrompts, PersonaConfig, PreprocessingPrompts, persona_fixtures,
        prompt_fixtures,
    };

    pub(crate) const MINIMAL_SCHEMA: &str = r#"{
        "title": "Supertask",
        "version": "1.1",
        "type": "object",
        "properties": {
            "title": { "type": "string", "maxLength": 200 },
            "flexibleItems": { "type": "array", "minItems": 3, "maxItems": 8 }
        },
        "required": ["title", "flexibleItems"]
    }"#;

    /// A fully-validated store built from the inline fixture documents.
    pub(crate) fn test_store() -> ConfigStore {
        ConfigStore::from_parts(
            PersonaConfig::from_yaml(persona_fixtures::MINIMAL_PERSONA).unwrap(),
            PreprocessingPrompts::from_yaml(prompt_fixtures::PREPROCESSING_YAML).unwrap(),
            GenerationPrompts::from_yaml(prompt_fixtures::GENERATION_YAML).unwrap(),
            serde_json::from_str(MINIMAL_SCHEMA).unwrap(),
        )
    }
}
