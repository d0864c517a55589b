//! Pipeline orchestration services.
//!
//! The preprocessing service runs Stage 1 (raw file → filled template),
//! the generation service runs Stage 3 (filled template → supertask
//! JSON), and the pipeline service chains them. Batch runs are sequential
//! by default with an optional scoped-thread parallel mode; per-file
//! failures never abort siblings, process-level failures abort
//! immediately.

mod difficulty;
mod generate;
mod pipeline;
mod preprocess;

pub use difficulty::{
    DIFFERENTIATION_TARGET, DifficultySpecializer, content_jaccard_distance, jaccard_distance,
};
pub use generate::GenerationService;
pub use pipeline::PipelineService;
pub use preprocess::PreprocessingService;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{FileRecord, PipelineOptions, ProgressEvent, Report, RunStatus};
use crate::{Error, Result};

/// Wall-clock budget per input file.
pub const FILE_BUDGET: Duration = Duration::from_secs(300);

/// Wall-clock budget for the extraction stage of one file.
pub const EXTRACTION_BUDGET: Duration = Duration::from_secs(30);

/// Environment variable overriding the reference-catalog directory.
pub const REFERENCE_DIR_ENV: &str = "SUPERTASK_REFERENCE_DIR";

/// Cancellation flag checked between files, never mid-call.
pub type CancelFlag = AtomicBool;

/// Tracks one file's wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileBudget {
    started: Instant,
}

impl FileBudget {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Fails with `Timeout` once the per-file budget is exceeded. Called
    /// between stages; an in-flight stage always runs to completion.
    pub(crate) fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed > FILE_BUDGET {
            return Err(Error::Timeout {
                elapsed_secs: elapsed.as_secs(),
            });
        }
        Ok(())
    }

    /// Fails with `Timeout` when a single stage overran its own budget.
    pub(crate) fn check_stage(&self, stage_budget: Duration) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed > stage_budget {
            return Err(Error::Timeout {
                elapsed_secs: elapsed.as_secs(),
            });
        }
        Ok(())
    }
}

/// Resolves the reference-catalog directory: explicit option, then the
/// environment override, then `./reference`.
pub(crate) fn resolve_reference_dir(options: &PipelineOptions) -> PathBuf {
    if let Some(dir) = &options.reference_dir {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var(REFERENCE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    PathBuf::from("reference")
}

/// Expands a batch input: a directory yields its files sorted by name, a
/// file yields itself.
pub(crate) fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| Error::ExtractionFailed {
                path: path.display().to_string(),
                cause: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        return Ok(files);
    }
    Err(Error::ExtractionFailed {
        path: path.display().to_string(),
        cause: "input path does not exist".to_string(),
    })
}

/// Runs `worker` over every input, best-effort: per-file errors become
/// failed records, process-fatal errors abort the whole batch. The
/// optional cancellation flag is honored between files.
pub(crate) fn run_batch<F>(
    inputs: &[PathBuf],
    options: &PipelineOptions,
    cancel: Option<&CancelFlag>,
    worker: F,
) -> Result<Report>
where
    F: Fn(&Path) -> Result<(Vec<String>, RunStatus)> + Sync,
{
    let report = Mutex::new(Report::default());
    let fatal: Mutex<Option<Error>> = Mutex::new(None);
    let cursor = AtomicUsize::new(0);
    let workers = options.parallel_workers.max(1).min(inputs.len().max(1));

    let run_one = |input: &Path| {
        let display_input = input.display().to_string();
        options.emit(&ProgressEvent::Started {
            input: display_input.clone(),
        });
        let budget = FileBudget::start();
        let record = match worker(input) {
            Ok((outputs, status)) => {
                options.emit(&ProgressEvent::Finished {
                    input: display_input.clone(),
                    status,
                });
                FileRecord::success(display_input, status, budget.elapsed_secs(), outputs)
            },
            Err(err) => {
                options.emit(&ProgressEvent::Failed {
                    input: display_input.clone(),
                    kind: err.kind().to_string(),
                });
                if err.is_process_fatal() {
                    let mut slot = fatal.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    return;
                }
                tracing::warn!(input = %display_input, kind = err.kind(), "input failed: {err}");
                FileRecord::failure(display_input, budget.elapsed_secs(), &err)
            },
        };
        report
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
    };

    let next_index = || -> Option<usize> {
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return None;
        }
        if fatal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
        {
            return None;
        }
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        (index < inputs.len()).then_some(index)
    };

    if workers <= 1 {
        while let Some(index) = next_index() {
            run_one(&inputs[index]);
        }
    } else {
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    while let Some(index) = next_index() {
                        run_one(&inputs[index]);
                    }
                });
            }
        });
    }

    let fatal = fatal
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take();
    if let Some(err) = fatal {
        return Err(err);
    }
    Ok(report
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone())
}

/// Deletes partial outputs written for a failed input.
pub(crate) fn remove_partial_outputs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "cannot remove partial output: {e}");
        } else {
            tracing::debug!(path = %path.display(), "partial output removed");
        }
    }
}
