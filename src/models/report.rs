//! Batch options, progress events, and run reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::taxonomy::Difficulty;

/// Callback invoked with start/ok/fail events during a batch run.
pub type ProgressSink = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// A progress event for one input file.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Processing of the named input began.
    Started {
        /// Input identifier (path).
        input: String,
    },
    /// The named input finished successfully.
    Finished {
        /// Input identifier (path).
        input: String,
        /// Final status (ok or repaired).
        status: RunStatus,
    },
    /// The named input failed.
    Failed {
        /// Input identifier (path).
        input: String,
        /// Machine-readable error kind.
        kind: String,
    },
}

/// Options bag for the orchestrator command surface.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Whether to append prompt/response pairs to the audit sink.
    pub enable_prompt_audit: bool,
    /// Where the audit sink writes, when enabled.
    pub audit_path: Option<PathBuf>,
    /// Directory holding the reference catalogs.
    pub reference_dir: Option<PathBuf>,
    /// Optional progress callback.
    pub progress_sink: Option<ProgressSink>,
    /// Worker count for parallel batch mode; 1 means sequential.
    pub parallel_workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enable_prompt_audit: false,
            audit_path: None,
            reference_dir: None,
            progress_sink: None,
            parallel_workers: 1,
        }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("enable_prompt_audit", &self.enable_prompt_audit)
            .field("audit_path", &self.audit_path)
            .field("reference_dir", &self.reference_dir)
            .field("progress_sink", &self.progress_sink.is_some())
            .field("parallel_workers", &self.parallel_workers)
            .finish()
    }
}

impl PipelineOptions {
    /// Emits a progress event to the configured sink, if any.
    pub fn emit(&self, event: &ProgressEvent) {
        if let Some(sink) = &self.progress_sink {
            sink(event);
        }
    }
}

/// Outcome of processing one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Everything succeeded first try.
    Ok,
    /// A repair pass was required and succeeded.
    Repaired,
    /// The input failed after all repair attempts.
    Failed,
}

impl RunStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Repaired => "repaired",
            Self::Failed => "failed",
        }
    }
}

/// Per-input record in a batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Input identifier (path).
    pub input: String,
    /// Outcome.
    pub status: RunStatus,
    /// Wall-clock seconds spent on this input.
    pub elapsed_secs: f64,
    /// Paths written for this input, one per requested difficulty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Machine-readable error kind, present when status is failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl FileRecord {
    /// Builds a success record.
    #[must_use]
    pub fn success(
        input: impl Into<String>,
        status: RunStatus,
        elapsed_secs: f64,
        outputs: Vec<String>,
    ) -> Self {
        Self {
            input: input.into(),
            status,
            elapsed_secs,
            outputs,
            error_kind: None,
            error_detail: None,
        }
    }

    /// Builds a failure record from an error.
    #[must_use]
    pub fn failure(input: impl Into<String>, elapsed_secs: f64, error: &crate::Error) -> Self {
        Self {
            input: input.into(),
            status: RunStatus::Failed,
            elapsed_secs,
            outputs: Vec::new(),
            error_kind: Some(error.kind().to_string()),
            error_detail: Some(error.to_string()),
        }
    }
}

/// Summary of a batch run, returned to the CLI collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Per-input records, in completion order.
    pub records: Vec<FileRecord>,
    /// Difficulties that were requested for this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub difficulties: Vec<Difficulty>,
}

impl Report {
    /// Adds a record.
    pub fn push(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    /// Number of inputs processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.records.len()
    }

    /// Number of inputs with the given status.
    #[must_use]
    pub fn count(&self, status: RunStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Returns true when no input failed.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.count(RunStatus::Failed) == 0
    }

    /// One-line totals summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "processed={} ok={} repaired={} failed={}",
            self.processed(),
            self.count(RunStatus::Ok),
            self.count(RunStatus::Repaired),
            self.count(RunStatus::Failed)
        )
    }

    /// Records of failed inputs, for the failure enumeration.
    #[must_use]
    pub fn failures(&self) -> Vec<&FileRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .collect()
    }
}
