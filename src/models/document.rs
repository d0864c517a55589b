//! The emitted supertask document.

use serde::{Deserialize, Serialize};

use super::item::FlexibleItem;
use super::taxonomy::{Archetype, Difficulty, Dimension, Language, RelationType};

/// Title length ceiling.
pub const TITLE_MAX: usize = 200;
/// Inclusive duration band across both difficulties, in seconds.
pub const DURATION_BAND: (u32, u32) = (180, 600);
/// Inclusive coin-reward band.
pub const COINS_BAND: (u32, u32) = (1, 1000);
/// Recommended coin-reward band.
pub const COINS_RECOMMENDED: (u32, u32) = (10, 25);

/// A complete supertask, one per (input, difficulty) pair.
///
/// Field order matters: documents are emitted with keys in declaration
/// order, never alphabetized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SupertaskDocument {
    /// Display title, ending with the localized difficulty suffix.
    pub title: String,
    /// Life-area tag.
    pub dimension: Dimension,
    /// Audience-style tag.
    pub archetype: Archetype,
    /// What this supertask is attached to.
    pub related_to_type: RelationType,
    /// Identifier of the related entity; never empty.
    pub related_to_id: String,
    /// Estimated completion time in seconds, 180–600.
    pub estimated_duration: u32,
    /// Coins awarded on completion, 1–1000.
    pub coins_reward: u32,
    /// The 3–8 ordered items.
    pub flexible_items: Vec<FlexibleItem>,
    /// Document metadata and provenance.
    pub metadata: DocumentMetadata,
}

/// Metadata block of a supertask document.
///
/// Wire keys are snake_case, unlike the camelCase top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentMetadata {
    /// Content language.
    pub language: Language,
    /// Content region, e.g. "Brasil".
    pub region: String,
    /// Creation timestamp, ISO 8601.
    pub created_at: String,
    /// Last-update timestamp, ISO 8601.
    pub updated_at: String,
    /// Schema/content version, `major.minor` or `major.minor.patch`.
    pub version: String,
    /// Tool identifier that produced the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    /// When generation ran, ISO 8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_timestamp: Option<String>,
    /// Difficulty this variant was specialized for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<Difficulty>,
    /// Whether the coaching persona governed generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ari_persona_applied: Option<bool>,
    /// The filled template this document was generated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_template: Option<String>,
    /// Fraction of items whose text sits at least 10% inside its band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_optimization_score: Option<f64>,
}

impl SupertaskDocument {
    /// Computes the mobile-optimization score: the fraction of items whose
    /// every text field sits at least 10% inside its character band.
    #[must_use]
    pub fn mobile_optimization_score(&self) -> f64 {
        if self.flexible_items.is_empty() {
            return 0.0;
        }
        let comfortable = self
            .flexible_items
            .iter()
            .filter(|item| item.comfortably_within_bands())
            .count();
        #[allow(clippy::cast_precision_loss)]
        {
            comfortable as f64 / self.flexible_items.len() as f64
        }
    }

    /// Counts items of the given wire type.
    #[must_use]
    pub fn count_of(&self, type_name: &str) -> usize {
        self.flexible_items
            .iter()
            .filter(|item| item.type_name() == type_name)
            .count()
    }
}
