//! Append-only prompt audit sink.
//!
//! When enabled, every completion is bracketed by two JSON-lines records:
//! the request (prompt hash, full prompt text, timestamp) before the call
//! and the response (text or error, latency) after it. Audit failures are
//! logged and never abort the request.

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::LlmProvider;
use crate::Result;

/// Append-only JSON-lines audit sink. Writes are serialized behind a
/// single process-wide writer.
pub struct PromptAudit {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl PromptAudit {
    /// Opens (or creates) the audit file in append mode.
    ///
    /// Open failures are logged and downgrade the sink to a no-op; the
    /// pipeline must keep running without audit.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                tracing::warn!(path = %path.display(), "cannot open audit sink: {e}");
                e
            })
            .ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    /// Where this sink writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records the prompt pair before a call; returns the prompt hash.
    pub fn record_request(&self, system: &str, user: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(system.as_bytes());
        hasher.update(b"\x1e");
        hasher.update(user.as_bytes());
        let hash = hex::encode(hasher.finalize());

        self.write_line(&json!({
            "event": "request",
            "prompt_hash": hash,
            "system": system,
            "user": user,
            "timestamp": Utc::now().to_rfc3339(),
        }));
        hash
    }

    /// Records the outcome of a call.
    pub fn record_response(
        &self,
        prompt_hash: &str,
        outcome: &Result<String>,
        latency: Duration,
    ) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let record = match outcome {
            Ok(response) => json!({
                "event": "response",
                "prompt_hash": prompt_hash,
                "response": response,
                "latency_ms": latency_ms,
                "timestamp": Utc::now().to_rfc3339(),
            }),
            Err(err) => json!({
                "event": "response",
                "prompt_hash": prompt_hash,
                "error": err.to_string(),
                "error_kind": err.kind(),
                "latency_ms": latency_ms,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        };
        self.write_line(&record);
    }

    fn write_line(&self, record: &serde_json::Value) {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(file, "{record}") {
            tracing::warn!(path = %self.path.display(), "audit write failed: {e}");
        }
    }
}

/// Provider wrapper that audits every completion.
pub struct AuditedProvider<P: LlmProvider> {
    inner: P,
    audit: std::sync::Arc<PromptAudit>,
}

impl<P: LlmProvider> AuditedProvider<P> {
    /// Wraps `inner` with the given audit sink.
    #[must_use]
    pub const fn new(inner: P, audit: std::sync::Arc<PromptAudit>) -> Self {
        Self { inner, audit }
    }
}

impl<P: LlmProvider> LlmProvider for AuditedProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let hash = self.audit.record_request(system, user);
        let started = Instant::now();
        let outcome = self
            .inner
            .complete(system, user, max_output_tokens, temperature);
        self.audit.record_response(&hash, &outcome, started.elapsed());
        outcome
    }
}
