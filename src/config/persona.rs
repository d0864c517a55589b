//! Coaching persona configuration.
//!
//! The persona document is human-edited YAML. It carries the coach's
//! identity, communication rules, the nine behavior-science frameworks,
//! the reference-data integration policy, and the jargon substitution
//! table. Everything here is validated once at load; the rest of the
//! pipeline treats the persona as read-only.

use serde::Deserialize;

use crate::{Error, Result};

/// Number of frameworks a valid persona declares.
pub const FRAMEWORK_COUNT: usize = 9;

/// Framework key used when no keyword trigger fires.
pub const DEFAULT_FRAMEWORK: &str = "tiny_habits";

/// The coaching persona, deserialized from `persona.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaConfig {
    /// Who the coach is.
    pub identity: Identity,
    /// How the coach communicates.
    pub communication: CommunicationRules,
    /// The nine behavior-science lenses, in declaration order.
    pub frameworks: Vec<Framework>,
    /// Which catalogs feed the reference digest, and how.
    pub reference_policy: ReferencePolicy,
    /// Internal jargon replaced with user-facing synonyms in emitted text.
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

/// Persona identity block. Injected verbatim at the head of every system
/// prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Coach name.
    pub name: String,
    /// Coach role description.
    pub role: String,
    /// Grammatical gender of the coaching voice. Must be `masculine`.
    pub language_form: String,
    /// Cultural framing for examples and references.
    pub cultural_context: String,
    /// Phrases the composed prompt must never contain.
    pub forbidden_phrases: Vec<String>,
    /// Phrasings the coach prefers; injected as guidance.
    #[serde(default)]
    pub preferred_phrases: Vec<String>,
}

/// Word budgets and questioning rules per engagement stage.
#[derive(Debug, Clone, Deserialize)]
pub struct CommunicationRules {
    /// Ordered engagement stages with word-count ceilings.
    pub engagement_stages: Vec<EngagementStage>,
    /// Minimum fraction of coach turns that must be questions.
    pub question_ratio_min: f64,
}

/// One engagement stage and its word budget.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementStage {
    /// Stage name, e.g. `opening`.
    pub name: String,
    /// Word-count ceiling for this stage.
    pub max_words: u32,
}

/// One behavior-science framework attached to the persona.
#[derive(Debug, Clone, Deserialize)]
pub struct Framework {
    /// Stable key, e.g. `tiny_habits`.
    pub key: String,
    /// Display name, e.g. "Tiny Habits (BJ Fogg)".
    pub name: String,
    /// Keywords whose presence in input text selects this framework.
    pub triggers: Vec<String>,
    /// Application rules injected into the prompt when selected.
    pub rules: Vec<String>,
    /// Sample coaching prompts; one is injected when selected.
    pub coaching_prompts: Vec<String>,
}

/// Reference-data integration policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferencePolicy {
    /// Habit rows below this cross-dimension score are dropped.
    pub habit_score_threshold: f64,
    /// Habit rows kept after ranking.
    pub habit_cap: usize,
    /// Lower bound of the serialized digest, bytes.
    pub digest_min_bytes: usize,
    /// Upper bound of the serialized digest, bytes.
    pub digest_max_bytes: usize,
    /// Habit inventory catalog filename.
    pub habits_file: String,
    /// Learning-path exemplar catalog filename.
    pub paths_file: String,
    /// Objective-to-path mapping catalog filename (included whole).
    pub objectives_file: String,
    /// Canonical coach document filename (included whole).
    pub coach_file: String,
}

/// One jargon substitution applied to emitted item text.
#[derive(Debug, Clone, Deserialize)]
pub struct Substitution {
    /// Internal token, e.g. the word meaning "supertask".
    pub from: String,
    /// User-facing synonym.
    pub to: String,
}

impl PersonaConfig {
    /// Parses and validates a persona from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the offending key.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let persona: Self =
            serde_yaml_ng::from_str(text).map_err(|e| Error::ConfigInvalid {
                key: "persona".to_string(),
                message: e.to_string(),
            })?;
        persona.validate()?;
        Ok(persona)
    }

    /// Runs the load-time consistency checks.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for the first failed check.
    pub fn validate(&self) -> Result<()> {
        if self.identity.language_form != "masculine" {
            return Err(Error::ConfigInvalid {
                key: "identity.language_form".to_string(),
                message: format!(
                    "expected 'masculine', found '{}'",
                    self.identity.language_form
                ),
            });
        }
        if self.identity.name.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                key: "identity.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.frameworks.len() != FRAMEWORK_COUNT {
            return Err(Error::ConfigInvalid {
                key: "frameworks".to_string(),
                message: format!(
                    "expected {FRAMEWORK_COUNT} frameworks, found {}",
                    self.frameworks.len()
                ),
            });
        }
        for framework in &self.frameworks {
            if framework.triggers.is_empty() {
                return Err(Error::ConfigInvalid {
                    key: format!("frameworks.{}.triggers", framework.key),
                    message: "must declare at least one keyword trigger".to_string(),
                });
            }
            if framework.rules.is_empty() {
                return Err(Error::ConfigInvalid {
                    key: format!("frameworks.{}.rules", framework.key),
                    message: "must declare at least one application rule".to_string(),
                });
            }
            if framework.coaching_prompts.is_empty() {
                return Err(Error::ConfigInvalid {
                    key: format!("frameworks.{}.coaching_prompts", framework.key),
                    message: "must declare at least one coaching prompt".to_string(),
                });
            }
        }
        if !self.frameworks.iter().any(|f| f.key == DEFAULT_FRAMEWORK) {
            return Err(Error::ConfigInvalid {
                key: "frameworks".to_string(),
                message: format!("default framework '{DEFAULT_FRAMEWORK}' is missing"),
            });
        }
        if self.communication.engagement_stages.is_empty() {
            return Err(Error::ConfigInvalid {
                key: "communication.engagement_stages".to_string(),
                message: "must declare at least one stage".to_string(),
            });
        }
        let budgets: Vec<u32> = self
            .communication
            .engagement_stages
            .iter()
            .map(|s| s.max_words)
            .collect();
        if budgets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Error::ConfigInvalid {
                key: "communication.engagement_stages".to_string(),
                message: "word budgets must be nondecreasing across stages".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.communication.question_ratio_min) {
            return Err(Error::ConfigInvalid {
                key: "communication.question_ratio_min".to_string(),
                message: "must be within [0, 1]".to_string(),
            });
        }
        if self.reference_policy.digest_min_bytes >= self.reference_policy.digest_max_bytes {
            return Err(Error::ConfigInvalid {
                key: "reference_policy.digest_min_bytes".to_string(),
                message: "digest band is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Looks up a framework by key.
    #[must_use]
    pub fn framework(&self, key: &str) -> Option<&Framework> {
        self.frameworks.iter().find(|f| f.key == key)
    }

    /// The framework used when no trigger fires.
    ///
    /// Presence is guaranteed by [`PersonaConfig::validate`].
    #[must_use]
    pub fn default_framework(&self) -> &Framework {
        self.frameworks
            .iter()
            .find(|f| f.key == DEFAULT_FRAMEWORK)
            .unwrap_or(&self.frameworks[0])
    }
}
