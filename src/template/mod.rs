//! The filled intermediate template: typed frontmatter plus sectioned
//! markdown body.
//!
//! Stage 1 produces this document; Stage 3 consumes it. The parser is
//! tolerant (unknown sections are preserved as raw blocks addressable by
//! heading) but the frontmatter key set is strict.

mod parser;

pub use parser::TemplateParser;

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::models::{Archetype, Difficulty, Dimension, Language, RelationType};

/// Typed frontmatter header. Keys are strictly enumerated: unknown keys
/// fail the parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frontmatter {
    /// Display title, ending with the localized difficulty suffix.
    pub title: String,
    /// Short description of the unit.
    pub description: String,
    /// Difficulty the template was written for.
    pub target_difficulty: Difficulty,
    /// Life-area tag.
    pub dimension: Dimension,
    /// Audience-style tag.
    pub archetype: Archetype,
    /// Relation kind.
    pub related_to_type: RelationType,
    /// Related entity id.
    pub related_to_id: String,
    /// Estimated completion time in seconds.
    pub estimated_duration: u32,
    /// Coins awarded on completion.
    pub coins_reward: u32,
    /// Content language.
    pub language: Language,
    /// Content region.
    pub region: String,
    /// What the learner should take away.
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    /// What the learner should already know.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One "Content Item N" block from Main Content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentItem {
    /// Prose body.
    pub body: String,
    /// Optional attribution.
    pub author: Option<String>,
    /// Up to five tips.
    pub tips: Vec<String>,
}

/// An attributed quote block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBlock {
    /// Quote text, without the surrounding quotation marks.
    pub content: String,
    /// Mandatory attribution.
    pub author: String,
}

/// A quiz block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizBlock {
    /// Question text.
    pub question: String,
    /// Letter-tagged options in source order.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    pub correct_answer: usize,
    /// Explanation of the correct answer.
    pub explanation: String,
}

/// The parsed filled template.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledTemplate {
    /// Typed header.
    pub frontmatter: Frontmatter,
    /// Overview section text.
    pub overview: String,
    /// Ordered content items from Main Content.
    pub content_items: Vec<ContentItem>,
    /// Quote blocks found in Main Content.
    pub quotes: Vec<QuoteBlock>,
    /// Key Concepts bullet entries.
    pub key_concepts: Vec<String>,
    /// Examples bullet entries.
    pub examples: Vec<String>,
    /// Summary section text.
    pub summary: String,
    /// Quiz blocks.
    pub quizzes: Vec<QuizBlock>,
    /// Unrecognized sections, preserved as (heading, raw text).
    pub extra_sections: Vec<(String, String)>,
}

/// Content checks a filled template must pass before Stage 3.
pub const MIN_CONTENT_ITEMS: usize = 3;
/// Minimum quiz blocks.
pub const MIN_QUIZZES: usize = 2;
/// Maximum quiz blocks.
pub const MAX_QUIZZES: usize = 4;

impl FilledTemplate {
    /// Runs the Stage-1 content checks and returns every defect found.
    ///
    /// An empty result means the template is acceptable. The defect
    /// strings feed the repair prompt, so they are written as concrete
    /// instructions.
    #[must_use]
    pub fn defects(&self) -> Vec<String> {
        let mut defects = Vec::new();
        let fm = &self.frontmatter;

        if fm.title.trim().is_empty() {
            defects.push("frontmatter title is empty".to_string());
        } else {
            let suffix = fm.target_difficulty.suffix(fm.language);
            if !fm.title.ends_with(suffix) {
                defects.push(format!("title must end with '{suffix}'"));
            }
        }
        if fm.description.trim().is_empty() {
            defects.push("frontmatter description is empty".to_string());
        }
        if fm.related_to_id.trim().is_empty() {
            defects.push("frontmatter related_to_id is empty".to_string());
        }
        if self.content_items.len() < MIN_CONTENT_ITEMS {
            defects.push(format!(
                "need at least {MIN_CONTENT_ITEMS} content items, found {}",
                self.content_items.len()
            ));
        }
        if self.quizzes.len() < MIN_QUIZZES || self.quizzes.len() > MAX_QUIZZES {
            defects.push(format!(
                "need {MIN_QUIZZES}-{MAX_QUIZZES} quiz items, found {}",
                self.quizzes.len()
            ));
        }
        for (index, quiz) in self.quizzes.iter().enumerate() {
            if quiz.correct_answer >= quiz.options.len() {
                defects.push(format!(
                    "quiz {} correct answer index {} is out of range",
                    index + 1,
                    quiz.correct_answer
                ));
            }
        }
        defects
    }

    /// Renders the template back to markdown with frontmatter.
    ///
    /// Parsing the rendered text reproduces the frontmatter verbatim for
    /// all recognized keys.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("---\n");
        out.push_str(
            &serde_yaml_ng::to_string(&self.frontmatter).unwrap_or_default(),
        );
        out.push_str("---\n\n# Overview\n\n");
        out.push_str(self.overview.trim());
        out.push_str("\n\n# Main Content\n");
        for (index, item) in self.content_items.iter().enumerate() {
            let _ = write!(out, "\n## Content Item {}\n\n{}\n", index + 1, item.body.trim());
            if let Some(author) = &item.author {
                let _ = write!(out, "\nAuthor: {author}\n");
            }
            if !item.tips.is_empty() {
                out.push_str("\nTips:\n");
                for tip in &item.tips {
                    let _ = writeln!(out, "- {tip}");
                }
            }
        }
        for quote in &self.quotes {
            let _ = write!(out, "\n> \"{}\"\nAuthor: {}\n", quote.content, quote.author);
        }
        out.push_str("\n# Key Concepts\n\n");
        for concept in &self.key_concepts {
            let _ = writeln!(out, "- {concept}");
        }
        out.push_str("\n# Examples\n\n");
        for example in &self.examples {
            let _ = writeln!(out, "- {example}");
        }
        out.push_str("\n# Summary\n\n");
        out.push_str(self.summary.trim());
        out.push_str("\n\n# Quiz\n");
        for (index, quiz) in self.quizzes.iter().enumerate() {
            let _ = write!(out, "\n## Quiz {}\n\nQuestion: {}\nOptions:\n", index + 1, quiz.question);
            for (option_index, option) in quiz.options.iter().enumerate() {
                let letter = char::from(b'a' + u8::try_from(option_index).unwrap_or(0));
                let _ = writeln!(out, "{letter}) {option}");
            }
            let letter = char::from(b'a' + u8::try_from(quiz.correct_answer).unwrap_or(0));
            let _ = write!(
                out,
                "Correct Answer: {letter}\nExplanation: {}\n",
                quiz.explanation
            );
        }
        for (heading, body) in &self.extra_sections {
            let _ = write!(out, "\n# {heading}\n\n{}\n", body.trim());
        }
        out
    }
}
