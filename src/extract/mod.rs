//! Content extraction: any supported input file → normalized plain text
//! plus source metadata.

mod formats;

pub use formats::{
    detect_language_hint, text_from_docx, text_from_json, text_from_pdf, text_from_utf8,
};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Largest accepted input file.
pub const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Extraction retries after the first failed attempt.
const EXTRACTION_RETRIES: u32 = 2;

/// Backoff between extraction attempts.
const EXTRACTION_BACKOFF: Duration = Duration::from_millis(100);

/// Declared or implied format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Markdown (`.md`, `.markdown`).
    Markdown,
    /// Plain text (`.txt`).
    Text,
    /// JSON (`.json`).
    Json,
    /// PDF (`.pdf`).
    Pdf,
    /// Word document (`.docx`).
    Docx,
}

impl SourceFormat {
    /// Resolves the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for extensions outside the allow-list.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            other => Err(Error::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }

    /// Returns the format name used in prompts and metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Json => "json",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Immutable record of one ingested input file.
///
/// Created at ingestion and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RawSource {
    /// Where the file came from.
    pub path: PathBuf,
    /// Declared format.
    pub format: SourceFormat,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Extracted plain text.
    pub text: String,
    /// Source metadata: path, byte size, modification time, language hint.
    pub metadata: BTreeMap<String, String>,
}

/// Extracts normalized text from input files, retrying transient failures.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Ingests `path`, dispatching on its extension.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for unknown extensions; `ExtractionFailed`
    /// after the retries are exhausted.
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<RawSource> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;
        self.extract_as(path, format)
    }

    /// Ingests `path` with an explicitly declared format.
    ///
    /// # Errors
    ///
    /// `ExtractionFailed` after the retries are exhausted.
    pub fn extract_as(&self, path: &Path, format: SourceFormat) -> Result<RawSource> {
        let display_path = path.display().to_string();
        let size = std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| Error::ExtractionFailed {
                path: display_path.clone(),
                cause: e.to_string(),
            })?;
        if size > MAX_INPUT_BYTES {
            return Err(Error::ExtractionFailed {
                path: display_path,
                cause: format!("file is {size} bytes, larger than the {MAX_INPUT_BYTES} limit"),
            });
        }

        let mut last_error = None;
        for attempt in 0..=EXTRACTION_RETRIES {
            if attempt > 0 {
                std::thread::sleep(EXTRACTION_BACKOFF);
                tracing::debug!(path = %display_path, attempt, "retrying extraction");
            }
            match Self::attempt(path, format, &display_path) {
                Ok(source) => return Ok(source),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::ExtractionFailed {
            path: display_path,
            cause: "extraction attempts exhausted".to_string(),
        }))
    }

    fn attempt(path: &Path, format: SourceFormat, display: &str) -> Result<RawSource> {
        let bytes = std::fs::read(path).map_err(|e| Error::ExtractionFailed {
            path: display.to_string(),
            cause: e.to_string(),
        })?;

        let text = match format {
            SourceFormat::Markdown | SourceFormat::Text => text_from_utf8(display, &bytes)?,
            SourceFormat::Json => text_from_json(display, &bytes)?,
            SourceFormat::Pdf => text_from_pdf(display, &bytes)?,
            SourceFormat::Docx => text_from_docx(display, &bytes)?,
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("source_path".to_string(), display.to_string());
        metadata.insert("byte_size".to_string(), bytes.len().to_string());
        if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
            let stamp: DateTime<Utc> = modified.into();
            metadata.insert("modified_at".to_string(), stamp.to_rfc3339());
        }
        metadata.insert(
            "language_hint".to_string(),
            detect_language_hint(&text).to_string(),
        );

        Ok(RawSource {
            path: path.to_path_buf(),
            format,
            bytes,
            text,
            metadata,
        })
    }
}
