//! Flexible item sum type and its character bands.
//!
//! Every supertask carries 3–8 items, each one of three tagged shapes.
//! All lengths are counted in characters (`char`s), not bytes, because the
//! primary content language carries accented letters.

use serde::{Deserialize, Serialize};

/// Character bands and array limits for flexible items, per the supertask
/// v1.1 schema.
pub mod bands {
    /// Minimum characters in a content item body.
    pub const CONTENT_MIN: usize = 50;
    /// Maximum characters in a content item body.
    pub const CONTENT_MAX: usize = 300;
    /// Minimum characters in an author attribution.
    pub const AUTHOR_MIN: usize = 1;
    /// Maximum characters in an author attribution.
    pub const AUTHOR_MAX: usize = 100;
    /// Maximum tips per content item.
    pub const TIPS_MAX: usize = 5;
    /// Minimum characters per tip.
    pub const TIP_MIN: usize = 20;
    /// Maximum characters per tip.
    pub const TIP_MAX: usize = 150;
    /// Minimum characters in a quote body.
    pub const QUOTE_MIN: usize = 20;
    /// Maximum characters in a quote body.
    pub const QUOTE_MAX: usize = 200;
    /// Minimum characters in a quiz question.
    pub const QUESTION_MIN: usize = 15;
    /// Maximum characters in a quiz question.
    pub const QUESTION_MAX: usize = 120;
    /// Minimum quiz options.
    pub const OPTIONS_MIN: usize = 2;
    /// Maximum quiz options.
    pub const OPTIONS_MAX: usize = 5;
    /// Minimum characters per quiz option.
    pub const OPTION_MIN: usize = 3;
    /// Maximum characters per quiz option.
    pub const OPTION_MAX: usize = 60;
    /// Minimum characters in a quiz explanation.
    pub const EXPLANATION_MIN: usize = 30;
    /// Maximum characters in a quiz explanation.
    pub const EXPLANATION_MAX: usize = 250;
    /// Minimum items in a document.
    pub const ITEMS_MIN: usize = 3;
    /// Maximum items in a document.
    pub const ITEMS_MAX: usize = 8;
}

/// One entry in a supertask's `flexibleItems` array.
///
/// A closed set of three shapes discriminated by the `type` tag on the
/// wire. The variants are mutually exclusive; deserialization of any other
/// tag fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlexibleItem {
    /// A prose snippet, optionally attributed and annotated with tips.
    Content {
        /// Body text, 50–300 characters.
        content: String,
        /// Optional attribution, 1–100 characters.
        #[serde(skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        /// Up to 5 tips of 20–150 characters each.
        #[serde(skip_serializing_if = "Option::is_none")]
        tips: Option<Vec<String>>,
    },
    /// An attributed quotation.
    Quote {
        /// Quote body, 20–200 characters.
        content: String,
        /// Mandatory attribution, 1–100 characters.
        author: String,
    },
    /// A multiple-choice question.
    Quiz {
        /// Question text, 15–120 characters.
        question: String,
        /// 2–5 options of 3–60 characters each.
        options: Vec<String>,
        /// Zero-based index into `options`.
        #[serde(rename = "correctAnswer")]
        correct_answer: usize,
        /// Didactic explanation, 30–250 characters.
        explanation: String,
    },
}

/// Counts characters, the unit every band is expressed in.
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Returns true when `len` sits at least 10% of the band width inside both
/// edges of `[min, max]`. Used for the mobile-optimization score.
#[must_use]
pub fn comfortably_within(len: usize, min: usize, max: usize) -> bool {
    let margin = (max - min) / 10;
    len >= min + margin && len <= max.saturating_sub(margin)
}

impl FlexibleItem {
    /// Returns the wire tag of this variant.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Quote { .. } => "quote",
            Self::Quiz { .. } => "quiz",
        }
    }

    /// Returns the main body text of the item.
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Content { content, .. } | Self::Quote { content, .. } => content,
            Self::Quiz { question, .. } => question,
        }
    }

    /// Returns true when every text field of this item sits within its
    /// exact band.
    #[must_use]
    pub fn within_bands(&self) -> bool {
        self.band_check(|len, min, max| len >= min && len <= max)
    }

    /// Returns true when every text field sits at least 10% inside its
    /// band. This is the per-item input to the mobile-optimization score.
    #[must_use]
    pub fn comfortably_within_bands(&self) -> bool {
        self.band_check(comfortably_within)
    }

    fn band_check(&self, fits: impl Fn(usize, usize, usize) -> bool) -> bool {
        match self {
            Self::Content {
                content,
                author,
                tips,
            } => {
                fits(char_len(content), bands::CONTENT_MIN, bands::CONTENT_MAX)
                    && author.as_ref().is_none_or(|a| {
                        fits(char_len(a), bands::AUTHOR_MIN, bands::AUTHOR_MAX)
                    })
                    && tips.as_ref().is_none_or(|tips| {
                        tips.len() <= bands::TIPS_MAX
                            && tips
                                .iter()
                                .all(|t| fits(char_len(t), bands::TIP_MIN, bands::TIP_MAX))
                    })
            },
            Self::Quote { content, author } => {
                fits(char_len(content), bands::QUOTE_MIN, bands::QUOTE_MAX)
                    && fits(char_len(author), bands::AUTHOR_MIN, bands::AUTHOR_MAX)
            },
            Self::Quiz {
                question,
                options,
                correct_answer,
                explanation,
            } => {
                fits(char_len(question), bands::QUESTION_MIN, bands::QUESTION_MAX)
                    && options.len() >= bands::OPTIONS_MIN
                    && options.len() <= bands::OPTIONS_MAX
                    && options
                        .iter()
                        .all(|o| fits(char_len(o), bands::OPTION_MIN, bands::OPTION_MAX))
                    && *correct_answer < options.len()
                    && fits(
                        char_len(explanation),
                        bands::EXPLANATION_MIN,
                        bands::EXPLANATION_MAX,
                    )
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quiz() -> FlexibleItem {
        FlexibleItem::Quiz {
            question: "Qual o primeiro passo de um novo hábito?".to_string(),
            options: vec![
                "Começar minúsculo".to_string(),
                "Esperar motivação".to_string(),
            ],
            correct_answer: 0,
            explanation: "Começar com uma versão minúscula torna o hábito viável todos os dias."
                .to_string(),
        }
    }

    #[test]
    fn test_serde_tag_discrimination() {
        let item = FlexibleItem::Quote {
            content: "A disciplina é a ponte entre metas e conquistas.".to_string(),
            author: "Jim Rohn".to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"quote\""));

        let back: FlexibleItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_correct_answer_wire_name() {
        let json = serde_json::to_string(&sample_quiz()).unwrap();
        assert!(json.contains("\"correctAnswer\":0"));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let json = r#"{"type":"video","url":"x"}"#;
        assert!(serde_json::from_str::<FlexibleItem>(json).is_err());
    }

    #[test]
    fn test_within_bands() {
        assert!(sample_quiz().within_bands());

        let short = FlexibleItem::Content {
            content: "curto demais".to_string(),
            author: None,
            tips: None,
        };
        assert!(!short.within_bands());
    }

    #[test]
    fn test_comfortably_within_margins() {
        // content band is [50, 300], margin 25: comfortable range [75, 275]
        assert!(!comfortably_within(50, 50, 300));
        assert!(!comfortably_within(74, 50, 300));
        assert!(comfortably_within(75, 50, 300));
        assert!(comfortably_within(275, 50, 300));
        assert!(!comfortably_within(276, 50, 300));
    }

    #[test]
    fn test_optional_fields_skipped_on_wire() {
        let item = FlexibleItem::Content {
            content: "Empilhe o novo hábito logo depois de um hábito que você já tem."
                .to_string(),
            author: None,
            tips: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("author"));
        assert!(!json.contains("tips"));
    }
}
