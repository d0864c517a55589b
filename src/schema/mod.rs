//! Supertask schema v1.1 validation.
//!
//! Every constraint is checked independently and all violations for one
//! document are aggregated into a single error; validation never stops at
//! the first failure. Each violation carries a machine-addressable path
//! (`flexibleItems[2].options[1]`) and a human message.

use chrono::DateTime;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::models::{
    COINS_BAND, COINS_RECOMMENDED, DURATION_BAND, Difficulty, FlexibleItem, SupertaskDocument,
    TITLE_MAX, bands, char_len,
};
use crate::{Error, Result};

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").unwrap_or_else(|_| unreachable!()));

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Machine-addressable path into the document.
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validator for supertask documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the document, aggregating every violation.
    ///
    /// `expected_difficulty` pins the duration band and title suffix;
    /// when absent, `metadata.difficulty_level` is used if present.
    ///
    /// # Errors
    ///
    /// Returns `Validation` carrying all violations.
    pub fn validate(
        &self,
        document: &SupertaskDocument,
        expected_difficulty: Option<Difficulty>,
    ) -> Result<()> {
        let violations = self.check(document, expected_difficulty);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { violations })
        }
    }

    /// Returns every violation without wrapping in an error.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn check(
        &self,
        document: &SupertaskDocument,
        expected_difficulty: Option<Difficulty>,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let difficulty = expected_difficulty.or(document.metadata.difficulty_level);

        // Title.
        let title_len = char_len(&document.title);
        if title_len == 0 || title_len > TITLE_MAX {
            violations.push(Violation::new(
                "title",
                format!("length {title_len} outside [1, {TITLE_MAX}]"),
            ));
        }
        if let Some(difficulty) = difficulty {
            let suffix = difficulty.suffix(document.metadata.language);
            if !document.title.ends_with(suffix) {
                violations.push(Violation::new(
                    "title",
                    format!("must end with the difficulty suffix '{suffix}'"),
                ));
            }
        }

        // Relation.
        if document.related_to_id.trim().is_empty() {
            violations.push(Violation::new("relatedToId", "must not be empty"));
        }

        // Duration.
        let (duration_min, duration_max) =
            difficulty.map_or(DURATION_BAND, |d| d.duration_band());
        if document.estimated_duration < duration_min || document.estimated_duration > duration_max
        {
            violations.push(Violation::new(
                "estimatedDuration",
                format!(
                    "{} outside [{duration_min}, {duration_max}]",
                    document.estimated_duration
                ),
            ));
        }

        // Coins. The recommended band is advisory, not a violation.
        if document.coins_reward < COINS_BAND.0 || document.coins_reward > COINS_BAND.1 {
            violations.push(Violation::new(
                "coinsReward",
                format!(
                    "{} outside [{}, {}]",
                    document.coins_reward, COINS_BAND.0, COINS_BAND.1
                ),
            ));
        } else if document.coins_reward < COINS_RECOMMENDED.0
            || document.coins_reward > COINS_RECOMMENDED.1
        {
            tracing::debug!(
                coins = document.coins_reward,
                "coin reward outside the recommended band"
            );
        }

        // Items.
        let count = document.flexible_items.len();
        if !(bands::ITEMS_MIN..=bands::ITEMS_MAX).contains(&count) {
            violations.push(Violation::new(
                "flexibleItems",
                format!(
                    "{count} items outside [{}, {}]",
                    bands::ITEMS_MIN,
                    bands::ITEMS_MAX
                ),
            ));
        }
        if document.count_of("content") < 1 {
            violations.push(Violation::new(
                "flexibleItems",
                "must contain at least 1 content item",
            ));
        }
        if document.count_of("quiz") < 2 {
            violations.push(Violation::new(
                "flexibleItems",
                "must contain at least 2 quiz items",
            ));
        }
        for (index, item) in document.flexible_items.iter().enumerate() {
            check_item(item, index, &mut violations);
        }

        // Metadata.
        let metadata = &document.metadata;
        if !VERSION_PATTERN.is_match(&metadata.version) {
            violations.push(Violation::new(
                "metadata.version",
                format!("'{}' does not match MAJOR.MINOR[.PATCH]", metadata.version),
            ));
        }
        for (path, value) in [
            ("metadata.created_at", &metadata.created_at),
            ("metadata.updated_at", &metadata.updated_at),
        ] {
            if DateTime::parse_from_rfc3339(value).is_err() {
                violations.push(Violation::new(path, format!("'{value}' is not ISO 8601")));
            }
        }
        if let Some(stamp) = &metadata.generation_timestamp {
            if DateTime::parse_from_rfc3339(stamp).is_err() {
                violations.push(Violation::new(
                    "metadata.generation_timestamp",
                    format!("'{stamp}' is not ISO 8601"),
                ));
            }
        }
        if let Some(score) = metadata.mobile_optimization_score {
            if !(0.0..=1.0).contains(&score) {
                violations.push(Violation::new(
                    "metadata.mobile_optimization_score",
                    format!("{score} outside [0.0, 1.0]"),
                ));
            }
        }

        violations
    }
}

fn check_text_band(
    text: &str,
    min: usize,
    max: usize,
    path: impl FnOnce() -> String,
    violations: &mut Vec<Violation>,
) {
    let len = char_len(text);
    if len < min || len > max {
        violations.push(Violation::new(
            path(),
            format!("length {len} outside [{min}, {max}]"),
        ));
    }
}

fn check_item(item: &FlexibleItem, index: usize, violations: &mut Vec<Violation>) {
    match item {
        FlexibleItem::Content {
            content,
            author,
            tips,
        } => {
            check_text_band(
                content,
                bands::CONTENT_MIN,
                bands::CONTENT_MAX,
                || format!("flexibleItems[{index}].content"),
                violations,
            );
            if let Some(author) = author {
                check_text_band(
                    author,
                    bands::AUTHOR_MIN,
                    bands::AUTHOR_MAX,
                    || format!("flexibleItems[{index}].author"),
                    violations,
                );
            }
            if let Some(tips) = tips {
                if tips.len() > bands::TIPS_MAX {
                    violations.push(Violation::new(
                        format!("flexibleItems[{index}].tips"),
                        format!("{} tips exceed the {} cap", tips.len(), bands::TIPS_MAX),
                    ));
                }
                for (tip_index, tip) in tips.iter().enumerate() {
                    check_text_band(
                        tip,
                        bands::TIP_MIN,
                        bands::TIP_MAX,
                        || format!("flexibleItems[{index}].tips[{tip_index}]"),
                        violations,
                    );
                }
            }
        },
        FlexibleItem::Quote { content, author } => {
            check_text_band(
                content,
                bands::QUOTE_MIN,
                bands::QUOTE_MAX,
                || format!("flexibleItems[{index}].content"),
                violations,
            );
            check_text_band(
                author,
                bands::AUTHOR_MIN,
                bands::AUTHOR_MAX,
                || format!("flexibleItems[{index}].author"),
                violations,
            );
        },
        FlexibleItem::Quiz {
            question,
            options,
            correct_answer,
            explanation,
        } => {
            check_text_band(
                question,
                bands::QUESTION_MIN,
                bands::QUESTION_MAX,
                || format!("flexibleItems[{index}].question"),
                violations,
            );
            if options.len() < bands::OPTIONS_MIN || options.len() > bands::OPTIONS_MAX {
                violations.push(Violation::new(
                    format!("flexibleItems[{index}].options"),
                    format!(
                        "{} options outside [{}, {}]",
                        options.len(),
                        bands::OPTIONS_MIN,
                        bands::OPTIONS_MAX
                    ),
                ));
            }
            for (option_index, option) in options.iter().enumerate() {
                check_text_band(
                    option,
                    bands::OPTION_MIN,
                    bands::OPTION_MAX,
                    || format!("flexibleItems[{index}].options[{option_index}]"),
                    violations,
                );
            }
            if *correct_answer >= options.len() {
                violations.push(Violation::new(
                    format!("flexibleItems[{index}].correctAnswer"),
                    format!(
                        "index {correct_answer} out of range for {} options",
                        options.len()
                    ),
                ));
            }
            check_text_band(
                explanation,
                bands::EXPLANATION_MIN,
                bands::EXPLANATION_MAX,
                || format!("flexibleItems[{index}].explanation"),
                violations,
            );
        },
    }
}

/// Renders violations for a repair prompt, one per line.
#[must_use]
pub fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
