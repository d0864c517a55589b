//! # Supertask
//!
//! A two-stage pipeline that turns raw educational content into
//! mobile-optimized "supertask" JSON documents.
//!
//! A supertask is a short gamified learning unit consumed by a mobile
//! application: a title, metadata, and an ordered sequence of 3–8
//! character-bounded items (content snippets, attributed quotes,
//! multiple-choice quizzes).
//!
//! ## Pipeline
//!
//! 1. **Preprocessing**: ingest a raw file (markdown, JSON, PDF, DOCX,
//!    plain text), extract its text, and produce a filled intermediate
//!    template via a coaching-persona-grounded LLM call.
//! 2. **Generation**: parse the filled template, split long prose into
//!    character-bounded items, specialize per difficulty, validate against
//!    the supertask v1.1 schema, and emit JSON.
//!
//! ## Example
//!
//! ```rust,ignore
//! use supertask::{ConfigStore, GenerationService, Difficulty};
//!
//! let store = ConfigStore::load_default()?;
//! let service = GenerationService::new(store, llm_provider);
//! let report = service.generate(
//!     "work/filled/habit_stacking_filled.md",
//!     "work/output",
//!     &[Difficulty::Beginner, Difficulty::Advanced],
//!     &options,
//! )?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod catalog;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod observability;
pub mod prompt;
pub mod schema;
pub mod services;
pub mod splitter;
pub mod template;

// Re-exports for convenience
pub use catalog::{ReferenceCatalogs, ReferenceDigest};
pub use config::{ConfigStore, GenerationPrompts, PersonaConfig, PreprocessingPrompts};
pub use extract::{ContentExtractor, RawSource, SourceFormat};
pub use llm::{HttpCompletionClient, LlmProvider, PromptAudit};
pub use models::{
    Archetype, Difficulty, Dimension, FlexibleItem, Language, PipelineOptions, RelationType,
    Report, RunStatus, SupertaskDocument,
};
pub use schema::{SchemaValidator, Violation};
pub use services::{GenerationService, PipelineService, PreprocessingService};
pub use template::{FilledTemplate, TemplateParser};

/// Error type for supertask operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait
/// implementations. Each variant maps to one of the pipeline's documented
/// error kinds; [`Error::kind`] returns the machine-readable tag.
///
/// # Disposition
///
/// | Variant | Scope | Disposition |
/// |---------|-------|-------------|
/// | `ConfigInvalid` | process | abort before any file is processed |
/// | `ReferenceDataMissing` | process | abort |
/// | `UnsupportedFormat` | file | skip, continue batch |
/// | `ExtractionFailed` | file | retried twice, then skip |
/// | `PromptPolicyViolation` | file | fail file |
/// | `LlmRejected` | file | fail file |
/// | `LlmUnavailable` | file | fail file |
/// | `TemplateInvalid` | file | one repair retry, then fail |
/// | `InsufficientContent` | file | fail file |
/// | `Validation` | file | one repair pass, then fail |
/// | `GenerationFailed` | file | fail file |
/// | `Timeout` | file | fail file, continue batch |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A configuration document is malformed or inconsistent.
    ///
    /// Raised at load time when a required key is missing, an enum value is
    /// unknown, or cross-field checks fail (e.g. a persona framework with
    /// no keyword triggers).
    #[error("invalid configuration: {key}: {message}")]
    ConfigInvalid {
        /// The missing or malformed configuration key.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// A required reference catalog file is absent.
    #[error("reference catalog missing: {0}")]
    ReferenceDataMissing(String),

    /// The input file extension is not in the allow-list.
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// Text extraction failed for an input file.
    ///
    /// Recoverable: the extractor retries at most twice with a 100 ms
    /// backoff before surfacing this error.
    #[error("extraction failed for '{path}': {cause}")]
    ExtractionFailed {
        /// Path of the offending input.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// A composed prompt contains a phrase on the persona's forbidden list.
    #[error("composed prompt contains forbidden phrase: {phrase}")]
    PromptPolicyViolation {
        /// The forbidden phrase that matched.
        phrase: String,
    },

    /// The LLM provider rejected the request with a non-retryable error.
    #[error("llm request rejected: {0}")]
    LlmRejected(String),

    /// All LLM attempts failed with transient errors.
    #[error("llm unavailable after {attempts} attempt(s): {cause}")]
    LlmUnavailable {
        /// How many attempts were made.
        attempts: u32,
        /// The last transient failure.
        cause: String,
    },

    /// The Stage-1 output is missing required sections or fields.
    #[error("filled template invalid: {}", defects.join("; "))]
    TemplateInvalid {
        /// Every defect found, for the repair prompt.
        defects: Vec<String>,
    },

    /// Not enough material to form the minimum three items.
    #[error("insufficient content: {0}")]
    InsufficientContent(String),

    /// A candidate document violates the supertask schema.
    ///
    /// Aggregates every violation found in one document; validation does
    /// not stop at the first failure.
    #[error("schema validation failed with {} violation(s)", violations.len())]
    Validation {
        /// All violations, each with a machine-addressable path.
        violations: Vec<Violation>,
    },

    /// Automated and LLM repair both failed to produce a valid document.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// The per-file wall-clock budget was exceeded.
    #[error("per-file budget exceeded after {elapsed_secs}s")]
    Timeout {
        /// Seconds elapsed when the budget tripped.
        elapsed_secs: u64,
    },
}

impl Error {
    /// Returns the machine-readable error kind tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::ReferenceDataMissing(_) => "reference_data_missing",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::PromptPolicyViolation { .. } => "prompt_policy_violation",
            Self::LlmRejected(_) => "llm_rejected",
            Self::LlmUnavailable { .. } => "llm_unavailable",
            Self::TemplateInvalid { .. } => "template_invalid",
            Self::InsufficientContent(_) => "insufficient_content",
            Self::Validation { .. } => "validation_error",
            Self::GenerationFailed(_) => "generation_failed",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Returns true when the batch must abort instead of skipping the file.
    #[must_use]
    pub const fn is_process_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. } | Self::ReferenceDataMissing(_)
        )
    }
}

/// Result type alias for supertask operations.
pub type Result<T> = std::result::Result<T, Error>;
