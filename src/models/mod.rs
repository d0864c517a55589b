//! Data models for the supertask pipeline.
//!
//! This module contains the core data structures shared across stages.

mod document;
mod item;
mod report;
mod taxonomy;

pub use document::{
    COINS_BAND, COINS_RECOMMENDED, DURATION_BAND, DocumentMetadata, SupertaskDocument, TITLE_MAX,
};
pub use item::{FlexibleItem, bands, char_len, comfortably_within};
pub use report::{
    FileRecord, PipelineOptions, ProgressEvent, ProgressSink, Report, RunStatus,
};
pub use taxonomy::{
    Archetype, DIFFICULTY_WORDS, Difficulty, Dimension, Language, RelationType,
};
