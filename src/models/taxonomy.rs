//! Fixed document taxonomies: dimension, archetype, language, relation,
//! difficulty.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five-valued life-area tag attached to every supertask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    /// Body, movement, sleep, nutrition.
    #[default]
    PhysicalHealth,
    /// Emotional regulation, focus, stress.
    MentalHealth,
    /// Family, friendship, community.
    Relationships,
    /// Career, productivity, craft.
    Work,
    /// Meaning, values, contemplative practice.
    Spirituality,
}

impl Dimension {
    /// Returns all dimension variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PhysicalHealth,
            Self::MentalHealth,
            Self::Relationships,
            Self::Work,
            Self::Spirituality,
        ]
    }

    /// Returns the dimension as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PhysicalHealth => "physicalHealth",
            Self::MentalHealth => "mentalHealth",
            Self::Relationships => "relationships",
            Self::Work => "work",
            Self::Spirituality => "spirituality",
        }
    }

    /// Parses a dimension from a string.
    ///
    /// Accepts the wire form plus the kebab/snake variants used in
    /// reference catalogs (`physical-health`, `physical_health`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "physicalhealth" => Some(Self::PhysicalHealth),
            "mentalhealth" => Some(Self::MentalHealth),
            "relationships" => Some(Self::Relationships),
            "work" => Some(Self::Work),
            "spirituality" => Some(Self::Spirituality),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four-valued audience-style tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    /// Intensity and discipline.
    #[default]
    Warrior,
    /// Curiosity and experimentation.
    Explorer,
    /// Reflection and depth.
    Sage,
    /// Structure and planning.
    Ruler,
}

impl Archetype {
    /// Returns all archetype variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Warrior, Self::Explorer, Self::Sage, Self::Ruler]
    }

    /// Returns the archetype as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Explorer => "explorer",
            Self::Sage => "sage",
            Self::Ruler => "ruler",
        }
    }

    /// Parses an archetype from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "warrior" => Some(Self::Warrior),
            "explorer" => Some(Self::Explorer),
            "sage" => Some(Self::Sage),
            "ruler" => Some(Self::Ruler),
            _ => None,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content language of an emitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Brazilian Portuguese, the primary content language.
    #[default]
    Portuguese,
    /// English.
    English,
    /// Spanish.
    Spanish,
}

impl Language {
    /// Returns the language as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Portuguese => "portuguese",
            Self::English => "english",
            Self::Spanish => "spanish",
        }
    }

    /// Parses a language from a string. Accepts ISO-ish short codes too.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "portuguese" | "pt" | "pt-br" => Some(Self::Portuguese),
            "english" | "en" => Some(Self::English),
            "spanish" | "es" => Some(Self::Spanish),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the supertask is related to on the mobile side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelationType {
    /// A habit blueprint.
    #[serde(rename = "HABITBP")]
    #[default]
    HabitBlueprint,
    /// Free-standing content.
    #[serde(rename = "GENERIC")]
    Generic,
}

impl RelationType {
    /// Returns the relation type as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HabitBlueprint => "HABITBP",
            Self::Generic => "GENERIC",
        }
    }

    /// Parses a relation type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HABITBP" => Some(Self::HabitBlueprint),
            "GENERIC" => Some(Self::Generic),
            _ => None,
        }
    }
}

/// Requested difficulty of an emitted variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Shorter, simpler variant.
    #[default]
    Beginner,
    /// Longer variant with technical vocabulary and close distractors.
    Advanced,
}

/// Every localized difficulty word, for scrubbing stray tokens out of quiz
/// questions and titles.
pub const DIFFICULTY_WORDS: &[&str] = &[
    "Iniciante",
    "Avançado",
    "Beginner",
    "Advanced",
    "Principiante",
    "Avanzado",
];

impl Difficulty {
    /// Returns the difficulty as its wire string, used in output filenames.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Advanced => "advanced",
        }
    }

    /// Parses a difficulty from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "iniciante" | "principiante" => Some(Self::Beginner),
            "advanced" | "avancado" | "avançado" | "avanzado" => Some(Self::Advanced),
            _ => None,
        }
    }

    /// Returns the localized title suffix for this difficulty, including
    /// the leading separator.
    #[must_use]
    pub const fn suffix(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Beginner, Language::Portuguese) => " - Iniciante",
            (Self::Advanced, Language::Portuguese) => " - Avançado",
            (Self::Beginner, Language::English) => " - Beginner",
            (Self::Advanced, Language::English) => " - Advanced",
            (Self::Beginner, Language::Spanish) => " - Principiante",
            (Self::Advanced, Language::Spanish) => " - Avanzado",
        }
    }

    /// Returns the inclusive duration band in seconds.
    #[must_use]
    pub const fn duration_band(&self) -> (u32, u32) {
        match self {
            Self::Beginner => (180, 360),
            Self::Advanced => (360, 600),
        }
    }

    /// Returns the inclusive coin-reward band.
    #[must_use]
    pub const fn coin_band(&self) -> (u32, u32) {
        match self {
            Self::Beginner => (10, 15),
            Self::Advanced => (15, 25),
        }
    }

    /// Returns the per-variant item-count ceiling.
    #[must_use]
    pub const fn max_items(&self) -> usize {
        match self {
            Self::Beginner => 6,
            Self::Advanced => 8,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
