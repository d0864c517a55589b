//! LLM client abstraction.
//!
//! The pipeline treats the provider as a black-box text-completion
//! service: one operation, `complete(system, user, max_output_tokens,
//! temperature) → text`, with retries, a per-attempt timeout, and an
//! optional append-only prompt audit. Responses are passed through
//! unparsed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use supertask::llm::{HttpCompletionClient, LlmProvider};
//!
//! let client = HttpCompletionClient::from_env()?;
//! let response = client.complete(system, user, 4096, 0.7)?;
//! ```
//!
//! Environment variables: `SUPERTASK_LLM_ENDPOINT`,
//! `SUPERTASK_LLM_API_KEY`, `SUPERTASK_LLM_MODEL`.

mod audit;
mod http;

pub use audit::{AuditedProvider, PromptAudit};
pub use http::HttpCompletionClient;

use secrecy::SecretString;
use std::time::Duration;

/// Attempts per completion, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff base between attempts.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Backoff ceiling.
pub const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Per-attempt request timeout.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable naming the completion endpoint.
pub const ENDPOINT_ENV: &str = "SUPERTASK_LLM_ENDPOINT";
/// Environment variable carrying the API key.
pub const API_KEY_ENV: &str = "SUPERTASK_LLM_API_KEY";
/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "SUPERTASK_LLM_MODEL";

/// Trait for LLM completion providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name, used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt pair.
    ///
    /// # Errors
    ///
    /// `LlmRejected` for non-retryable provider errors, `LlmUnavailable`
    /// once retries are exhausted.
    fn complete(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> crate::Result<String>;
}

impl<P: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> crate::Result<String> {
        (**self).complete(system, user, max_output_tokens, temperature)
    }
}

/// Connection settings for the HTTP completion client.
///
/// The API key is held in a [`SecretString`], zeroized on drop.
#[derive(Debug)]
pub struct LlmConnection {
    /// Completion endpoint URL.
    pub endpoint: String,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Model identifier sent with each request.
    pub model: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl LlmConnection {
    /// Default model when `SUPERTASK_LLM_MODEL` is unset.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Reads the connection from environment variables.
    ///
    /// Returns `None` when no endpoint is configured; callers map that to
    /// the environment-missing exit path.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::resolve(None)
    }

    /// Reads the connection from environment variables with settings-file
    /// fallbacks. Environment variables always win.
    #[must_use]
    pub fn resolve(settings: Option<&crate::config::LlmSettings>) -> Option<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .ok()
            .or_else(|| settings.and_then(|s| s.endpoint.clone()))?;
        let api_key = std::env::var(API_KEY_ENV).ok().map(SecretString::from);
        let model = std::env::var(MODEL_ENV)
            .ok()
            .or_else(|| settings.and_then(|s| s.model.clone()))
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let timeout = settings
            .and_then(|s| s.timeout_ms)
            .map_or(ATTEMPT_TIMEOUT, Duration::from_millis);
        Some(Self {
            endpoint,
            api_key,
            model,
            timeout,
        })
    }
}

/// Computes the backoff before the given retry attempt (1-based).
#[must_use]
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(8);
    let backoff = BACKOFF_BASE.saturating_mul(1 << exponent);
    backoff.min(BACKOFF_CAP)
}
