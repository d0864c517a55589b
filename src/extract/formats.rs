//! Per-format text extraction.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::Read;

use crate::{Error, Result};

fn extraction_failed(path: &str, cause: impl std::fmt::Display) -> Error {
    Error::ExtractionFailed {
        path: path.to_string(),
        cause: cause.to_string(),
    }
}

/// Decodes UTF-8 text, strips a BOM, and normalizes line endings.
pub fn text_from_utf8(path: &str, bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|e| extraction_failed(path, e))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Converts a JSON document into readable plain text.
///
/// When a top-level `content` or `body` string field is present it is
/// promoted and returned alone; otherwise the keys are serialized into
/// readable sections preserving source order.
pub fn text_from_json(path: &str, bytes: &[u8]) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| extraction_failed(path, e))?;

    if let Some(map) = value.as_object() {
        for key in ["content", "body"] {
            if let Some(promoted) = map.get(key).and_then(serde_json::Value::as_str) {
                return Ok(promoted.to_string());
            }
        }
    }

    let mut out = String::new();
    render_json_value(&value, 0, &mut out);
    Ok(out)
}

fn render_json_value(value: &serde_json::Value, depth: usize, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if depth == 0 {
                    out.push_str("## ");
                    out.push_str(key);
                    out.push('\n');
                } else {
                    out.push_str(&"  ".repeat(depth));
                    out.push_str(key);
                    out.push_str(": ");
                }
                match child {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        if depth == 0 {
                            render_json_value(child, depth + 1, out);
                        } else {
                            out.push('\n');
                            render_json_value(child, depth + 1, out);
                        }
                    },
                    scalar => {
                        if depth == 0 {
                            render_scalar(scalar, out);
                            out.push('\n');
                        } else {
                            render_scalar(scalar, out);
                        }
                        out.push('\n');
                    },
                }
            }
        },
        serde_json::Value::Array(items) => {
            for item in items {
                out.push_str(&"  ".repeat(depth));
                out.push_str("- ");
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        out.push('\n');
                        render_json_value(item, depth + 1, out);
                    },
                    scalar => {
                        render_scalar(scalar, out);
                        out.push('\n');
                    },
                }
            }
        },
        scalar => {
            render_scalar(scalar, out);
            out.push('\n');
        },
    }
}

fn render_scalar(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

/// Extracts text runs from a PDF, discarding non-textual content.
pub fn text_from_pdf(path: &str, bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| extraction_failed(path, e))
}

/// Extracts paragraph text from a DOCX file.
///
/// A DOCX is a ZIP archive; the document body lives in
/// `word/document.xml` as `<w:t>` text runs grouped into `<w:p>`
/// paragraphs.
pub fn text_from_docx(path: &str, bytes: &[u8]) -> Result<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| extraction_failed(path, e))?;
    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| extraction_failed(path, e))?;
    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|e| extraction_failed(path, e))?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) if tag.local_name().as_ref() == b"t" => in_text_run = true,
            Ok(Event::End(tag)) => match tag.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {},
            },
            Ok(Event::Text(text)) if in_text_run => {
                let unescaped = text.unescape().map_err(|e| extraction_failed(path, e))?;
                out.push_str(&unescaped);
            },
            Ok(Event::Eof) => break,
            Ok(_) => {},
            Err(e) => return Err(extraction_failed(path, e)),
        }
    }
    Ok(out)
}

/// Guesses the content language from stopword frequencies.
///
/// A hint only; the frontmatter language declared by Stage 1 is
/// authoritative.
#[must_use]
pub fn detect_language_hint(text: &str) -> &'static str {
    const PORTUGUESE: &[&str] = &["não", "você", "uma", "com", "para", "dos", "são"];
    const ENGLISH: &[&str] = &["the", "and", "with", "you", "that", "for", "are"];
    const SPANISH: &[&str] = &["los", "las", "una", "por", "está", "pero", "como"];

    let words: Vec<String> = text
        .split_whitespace()
        .take(2000)
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();

    let score = |markers: &[&str]| -> usize {
        words
            .iter()
            .filter(|w| markers.contains(&w.as_str()))
            .count()
    };

    let (pt, en, es) = (score(PORTUGUESE), score(ENGLISH), score(SPANISH));
    if pt >= en && pt >= es {
        "portuguese"
    } else if es > en {
        "spanish"
    } else {
        "english"
    }
}
