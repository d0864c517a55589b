//! Retrying HTTP completion client.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{LlmConnection, LlmProvider, MAX_ATTEMPTS, backoff_for_attempt};
use crate::{Error, Result};

/// Blocking HTTP client for an OpenAI-compatible chat-completions
/// endpoint.
///
/// Behavior contract:
/// - up to [`MAX_ATTEMPTS`] attempts for transient failures (connection
///   errors, 5xx, rate limits), exponential backoff 1 s base capped at
///   8 s;
/// - 60 s per-attempt timeout;
/// - non-retryable provider errors surface as `LlmRejected`, exhausted
///   retries as `LlmUnavailable`;
/// - the response text is passed through unparsed.
pub struct HttpCompletionClient {
    connection: LlmConnection,
    client: reqwest::blocking::Client,
}

enum AttemptError {
    /// Worth retrying: connect failures, timeouts, 5xx, 429.
    Transient(String),
    /// Provider rejected the request; retrying cannot help.
    Fatal(String),
}

impl HttpCompletionClient {
    /// Creates a client for the given connection settings.
    #[must_use]
    pub fn new(connection: LlmConnection) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(connection.timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("failed to build LLM HTTP client: {err}");
                reqwest::blocking::Client::new()
            });
        Self { connection, client }
    }

    /// Creates a client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `LlmRejected` when no endpoint is configured, which the
    /// CLI maps to the environment-missing exit code.
    pub fn from_env() -> Result<Self> {
        LlmConnection::from_env().map(Self::new).ok_or_else(|| {
            Error::LlmRejected(format!("no completion endpoint configured; set {}", super::ENDPOINT_ENV))
        })
    }

    fn attempt(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> std::result::Result<String, AttemptError> {
        let request = ChatRequest {
            model: self.connection.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            max_tokens: max_output_tokens,
            temperature,
        };

        let mut builder = self.client.post(&self.connection.endpoint).json(&request);
        if let Some(key) = &self.connection.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().map_err(|e| {
            // Connect errors and timeouts are transient by contract.
            AttemptError::Transient(e.to_string())
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(AttemptError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail: String = body.chars().take(200).collect();
            return Err(AttemptError::Fatal(format!("status {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AttemptError::Transient(format!("malformed response body: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AttemptError::Fatal("response carried no choices".to_string()))
    }
}

impl LlmProvider for HttpCompletionClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn complete(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let mut last_cause = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let backoff = backoff_for_attempt(attempt - 1);
                let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(attempt, backoff_ms, "retrying LLM call");
                metrics::counter!("llm_retries_total", "provider" => self.name()).increment(1);
                std::thread::sleep(backoff);
            }

            let started = Instant::now();
            let result = self.attempt(system, user, max_output_tokens, temperature);
            let elapsed = started.elapsed();
            metrics::histogram!("llm_request_duration_ms", "provider" => self.name())
                .record(elapsed.as_secs_f64() * 1000.0);

            match result {
                Ok(text) => {
                    metrics::counter!(
                        "llm_requests_total",
                        "provider" => self.name(),
                        "status" => "success"
                    )
                    .increment(1);
                    return Ok(text);
                },
                Err(AttemptError::Fatal(cause)) => {
                    metrics::counter!(
                        "llm_requests_total",
                        "provider" => self.name(),
                        "status" => "rejected"
                    )
                    .increment(1);
                    return Err(Error::LlmRejected(cause));
                },
                Err(AttemptError::Transient(cause)) => {
                    metrics::counter!(
                        "llm_requests_total",
                        "provider" => self.name(),
                        "status" => "error"
                    )
                    .increment(1);
                    tracing::warn!(attempt, cause = %cause, "transient LLM failure");
                    last_cause = cause;
                },
            }
        }

        Err(Error::LlmUnavailable {
            attempts: MAX_ATTEMPTS,
            cause: last_cause,
        })
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// One message in the conversation.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Chat-completions response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
