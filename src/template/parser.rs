//! Structural parser for filled templates.

use regex::Regex;
use std::sync::LazyLock;

use super::{ContentItem, FilledTemplate, Frontmatter, QuizBlock, QuoteBlock};
use crate::{Error, Result};

static CONTENT_ITEM_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^content\s+item\s+\d+\s*$").unwrap_or_else(|_| unreachable!())
});

static QUIZ_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^quiz\s*\d*\s*$").unwrap_or_else(|_| unreachable!()));

static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-eA-E][).]\s*(.+)$").unwrap_or_else(|_| unreachable!()));

/// Parser for the filled-template markdown format.
pub struct TemplateParser;

impl TemplateParser {
    /// Parses quiz blocks out of free text, e.g. an LLM repair response
    /// that returns additional quizzes without the surrounding template.
    #[must_use]
    pub fn parse_quizzes(text: &str) -> Vec<QuizBlock> {
        parse_quiz_section(text)
    }

    /// Parses a filled template from its markdown text.
    ///
    /// Tolerant beyond the frontmatter: unknown sections are preserved,
    /// malformed quiz blocks are skipped with a warning, and the content
    /// checks live in [`FilledTemplate::defects`] rather than here.
    ///
    /// # Errors
    ///
    /// Returns `TemplateInvalid` when the frontmatter fence is missing or
    /// its YAML does not match the strict key set.
    pub fn parse(text: &str) -> Result<FilledTemplate> {
        let (frontmatter, body) = split_frontmatter(text)?;

        let mut template = FilledTemplate {
            frontmatter,
            overview: String::new(),
            content_items: Vec::new(),
            quotes: Vec::new(),
            key_concepts: Vec::new(),
            examples: Vec::new(),
            summary: String::new(),
            quizzes: Vec::new(),
            extra_sections: Vec::new(),
        };

        for (heading, section) in split_sections(body) {
            match heading.to_lowercase().as_str() {
                "overview" => template.overview = section.trim().to_string(),
                "main content" => parse_main_content(&section, &mut template),
                "key concepts" => template.key_concepts = parse_bullets(&section),
                "examples" => template.examples = parse_bullets(&section),
                "summary" => template.summary = section.trim().to_string(),
                "quiz" => template.quizzes = parse_quiz_section(&section),
                _ => template
                    .extra_sections
                    .push((heading, section.trim().to_string())),
            }
        }

        Ok(template)
    }
}

/// Splits the `---` fenced YAML header from the body.
fn split_frontmatter(text: &str) -> Result<(Frontmatter, &str)> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return Err(Error::TemplateInvalid {
            defects: vec!["missing frontmatter fence at the top".to_string()],
        });
    };
    let Some(end) = rest.find("\n---") else {
        return Err(Error::TemplateInvalid {
            defects: vec!["frontmatter fence is never closed".to_string()],
        });
    };
    let yaml = &rest[..end];
    // Skip the rest of the closing fence line.
    let after = &rest[end + 1..];
    let body = after.find('\n').map_or("", |i| &after[i + 1..]);

    let frontmatter: Frontmatter =
        serde_yaml_ng::from_str(yaml).map_err(|e| Error::TemplateInvalid {
            defects: vec![format!("frontmatter: {e}")],
        })?;
    Ok((frontmatter, body))
}

/// Splits the body into `(heading, text)` pairs at `# ` headings.
fn split_sections(body: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut heading: Option<String> = None;
    let mut buffer = String::new();

    for line in body.lines() {
        if let Some(title) = line.strip_prefix("# ") {
            if let Some(previous) = heading.take() {
                sections.push((previous, std::mem::take(&mut buffer)));
            }
            heading = Some(title.trim().to_string());
        } else if heading.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    if let Some(last) = heading {
        sections.push((last, buffer));
    }
    sections
}

/// Splits a section into `(subheading, text)` pairs at `## ` headings,
/// returning the preamble before the first subheading separately.
fn split_subsections(section: &str) -> (String, Vec<(String, String)>) {
    let mut preamble = String::new();
    let mut blocks = Vec::new();
    let mut heading: Option<String> = None;
    let mut buffer = String::new();

    for line in section.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            if let Some(previous) = heading.take() {
                blocks.push((previous, std::mem::take(&mut buffer)));
            }
            heading = Some(title.trim().to_string());
        } else if heading.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        } else {
            preamble.push_str(line);
            preamble.push('\n');
        }
    }
    if let Some(last) = heading {
        blocks.push((last, buffer));
    }
    (preamble, blocks)
}

fn parse_main_content(section: &str, template: &mut FilledTemplate) {
    let (preamble, blocks) = split_subsections(section);
    extract_quotes(&preamble, &mut template.quotes);

    for (heading, block) in blocks {
        if CONTENT_ITEM_HEADING.is_match(&heading) {
            let item = parse_content_item(&block, &mut template.quotes);
            if item.body.is_empty() {
                tracing::warn!(heading = %heading, "content item with empty body skipped");
            } else {
                template.content_items.push(item);
            }
        } else {
            template
                .extra_sections
                .push((format!("Main Content / {heading}"), block.trim().to_string()));
        }
    }
}

/// Parses one content-item block, moving embedded quote paragraphs into
/// `quotes`.
fn parse_content_item(block: &str, quotes: &mut Vec<QuoteBlock>) -> ContentItem {
    let mut item = ContentItem::default();
    let mut body_lines: Vec<String> = Vec::new();
    let mut in_tips = false;
    let mut pending_quote: Option<String> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        let unquoted = trimmed.trim_start_matches('>').trim_start();

        if let Some(quote) = parse_quote_line(unquoted) {
            pending_quote = Some(quote);
            in_tips = false;
            continue;
        }
        if let Some(author) = trimmed.strip_prefix("Author:") {
            let author = author.trim().to_string();
            if let Some(content) = pending_quote.take() {
                if !author.is_empty() {
                    quotes.push(QuoteBlock { content, author });
                }
            } else if !author.is_empty() {
                item.author = Some(author);
            }
            continue;
        }
        if trimmed.eq_ignore_ascii_case("Tips:") {
            in_tips = true;
            continue;
        }
        if in_tips {
            if let Some(tip) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
                item.tips.push(tip.trim().to_string());
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            in_tips = false;
        }
        // A quote line without attribution falls back to body text.
        if let Some(orphan) = pending_quote.take() {
            body_lines.push(orphan);
        }
        if !trimmed.is_empty() {
            body_lines.push(trimmed.to_string());
        }
    }
    if let Some(orphan) = pending_quote {
        tracing::warn!("quote without attribution treated as body text");
        body_lines.push(orphan);
    }

    item.body = body_lines.join(" ").trim().to_string();
    item
}

/// Recognizes a `"…"` line; returns the inner text.
fn parse_quote_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix('"')?;
    let end = rest.rfind('"')?;
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_string())
}

/// Scans free text for quote + `Author:` attribution pairs.
fn extract_quotes(text: &str, quotes: &mut Vec<QuoteBlock>) {
    let mut pending: Option<String> = None;
    for line in text.lines() {
        let trimmed = line.trim().trim_start_matches('>').trim_start();
        if let Some(quote) = parse_quote_line(trimmed) {
            pending = Some(quote);
        } else if let Some(author) = trimmed.strip_prefix("Author:") {
            if let Some(content) = pending.take() {
                let author = author.trim();
                if !author.is_empty() {
                    quotes.push(QuoteBlock {
                        content,
                        author: author.to_string(),
                    });
                }
            }
        } else if !trimmed.is_empty() {
            pending = None;
        }
    }
}

fn parse_bullets(section: &str) -> Vec<String> {
    section
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_quiz_section(section: &str) -> Vec<QuizBlock> {
    let (preamble, blocks) = split_subsections(section);

    let mut quiz_texts: Vec<String> = Vec::new();
    if blocks.is_empty() {
        // No subheadings: each "Question:" starts a new block.
        let mut current = String::new();
        for line in preamble.lines() {
            if line.trim().starts_with("Question:") && !current.trim().is_empty() {
                quiz_texts.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            current.push('\n');
        }
        if !current.trim().is_empty() {
            quiz_texts.push(current);
        }
    } else {
        for (heading, block) in blocks {
            if QUIZ_HEADING.is_match(&heading) {
                quiz_texts.push(block);
            } else {
                tracing::warn!(heading = %heading, "unrecognized quiz subheading skipped");
            }
        }
    }

    quiz_texts
        .iter()
        .filter_map(|text| match parse_quiz_block(text) {
            Some(quiz) => Some(quiz),
            None => {
                tracing::warn!("malformed quiz block skipped");
                None
            },
        })
        .collect()
}

fn parse_quiz_block(block: &str) -> Option<QuizBlock> {
    let mut question = String::new();
    let mut options: Vec<String> = Vec::new();
    let mut correct: Option<String> = None;
    let mut explanation = String::new();
    let mut mode = Field::None;

    for line in block.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Question:") {
            question = rest.trim().to_string();
            mode = Field::Question;
            continue;
        }
        if trimmed.eq_ignore_ascii_case("Options:") {
            mode = Field::Options;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("Correct Answer:") {
            correct = Some(rest.trim().to_string());
            mode = Field::None;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("Explanation:") {
            explanation = rest.trim().to_string();
            mode = Field::Explanation;
            continue;
        }
        match mode {
            Field::Question if !trimmed.is_empty() => {
                question.push(' ');
                question.push_str(trimmed);
            },
            Field::Options => {
                if let Some(captures) = OPTION_LINE.captures(trimmed) {
                    options.push(captures[1].trim().to_string());
                }
            },
            Field::Explanation if !trimmed.is_empty() => {
                explanation.push(' ');
                explanation.push_str(trimmed);
            },
            _ => {},
        }
    }

    if question.is_empty() || options.len() < 2 {
        return None;
    }
    let correct_answer = resolve_correct_answer(correct.as_deref()?, options.len())?;
    Some(QuizBlock {
        question,
        options,
        correct_answer,
        explanation,
    })
}

#[derive(Clone, Copy)]
enum Field {
    None,
    Question,
    Options,
    Explanation,
}

/// Resolves a letter tag (`a`, `B)`) or numeric index to a zero-based
/// option index.
fn resolve_correct_answer(value: &str, option_count: usize) -> Option<usize> {
    let cleaned = value.trim().trim_end_matches([')', '.']).trim();
    if cleaned.len() == 1 {
        let c = cleaned.chars().next()?;
        if c.is_ascii_alphabetic() {
            let index = (c.to_ascii_lowercase() as usize).checked_sub('a' as usize)?;
            return (index < option_count).then_some(index);
        }
    }
    let number: usize = cleaned.parse().ok()?;
    if number < option_count {
        Some(number)
    } else if (1..=option_count).contains(&number) {
        Some(number - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::valid_template;
    use super::*;

    const SAMPLE: &str = r#"---
title: "Sono Profundo - Iniciante"
description: "Por que a luz da manhã decide a noite."
target_difficulty: beginner
dimension: physicalHealth
archetype: warrior
related_to_type: HABITBP
related_to_id: sono-01
estimated_duration: 300
coins_reward: 12
language: portuguese
region: Brasil
learning_objectives:
  - regular o relógio biológico
prerequisites: []
tags: [sono]
---

# Overview

A noite começa de manhã.

# Main Content

## Content Item 1

A luz do sol nos primeiros 30 minutos do dia ancora o relógio biológico e define o horário em que o sono chega à noite.

Author: Andrew Huberman

Tips:
- Abra as janelas assim que acordar.
- Café só depois da luz.

## Content Item 2

Cafeína seis horas antes de dormir ainda atrapalha o sono profundo, mesmo que você consiga adormecer sem dificuldade.

> "O sono é a melhor meditação."
Author: Dalai Lama

# Key Concepts

- ritmo circadiano
- pressão de sono

# Examples

- Caminhar até a padaria logo cedo.

# Summary

Luz cedo, cafeína cedo, quarto escuro.

# Fontes

Lista de estudos citados.

# Quiz

## Quiz 1

Question: O que mais influencia o horário do sono?
Options:
a) A luz da manhã
b) O jantar
c) O colchão
Correct Answer: a
Explanation: A luz da manhã ancora o relógio biológico que decide quando o sono chega.

## Quiz 2

Question: Até quando a cafeína atrapalha o sono?
Options:
a) Uma hora antes
b) Seis horas antes
Correct Answer: b
Explanation: A cafeína tem meia-vida longa e ainda reduz o sono profundo seis horas depois.
"#;

    #[test]
    fn test_parse_full_template() {
        let template = TemplateParser::parse(SAMPLE).unwrap();

        assert_eq!(template.frontmatter.title, "Sono Profundo - Iniciante");
        assert_eq!(template.frontmatter.related_to_id, "sono-01");
        assert_eq!(template.overview, "A noite começa de manhã.");
        assert_eq!(template.content_items.len(), 2);
        assert_eq!(
            template.content_items[0].author.as_deref(),
            Some("Andrew Huberman")
        );
        assert_eq!(template.content_items[0].tips.len(), 2);
        assert_eq!(template.quotes.len(), 1);
        assert_eq!(template.quotes[0].author, "Dalai Lama");
        assert_eq!(template.key_concepts, vec!["ritmo circadiano", "pressão de sono"]);
        assert_eq!(template.summary, "Luz cedo, cafeína cedo, quarto escuro.");
        assert_eq!(template.quizzes.len(), 2);
        assert_eq!(template.quizzes[0].correct_answer, 0);
        assert_eq!(template.quizzes[1].correct_answer, 1);
    }

    #[test]
    fn test_unknown_section_preserved() {
        let template = TemplateParser::parse(SAMPLE).unwrap();
        assert_eq!(template.extra_sections.len(), 1);
        assert_eq!(template.extra_sections[0].0, "Fontes");
        assert_eq!(template.extra_sections[0].1, "Lista de estudos citados.");
    }

    #[test]
    fn test_missing_frontmatter_is_template_invalid() {
        let err = TemplateParser::parse("# Overview\n\nSem frontmatter.").unwrap_err();
        assert_eq!(err.kind(), "template_invalid");
    }

    #[test]
    fn test_unknown_frontmatter_key_rejected() {
        let text = SAMPLE.replace("tags: [sono]", "tags: [sono]\ninternal_notes: 12");
        let err = TemplateParser::parse(&text).unwrap_err();
        assert_eq!(err.kind(), "template_invalid");
    }

    #[test]
    fn test_malformed_quiz_skipped() {
        let text = SAMPLE.replace("Correct Answer: b\n", "");
        let template = TemplateParser::parse(&text).unwrap();
        assert_eq!(template.quizzes.len(), 1);
    }

    #[test]
    fn test_quiz_without_subheadings() {
        let collapsed = SAMPLE.replace("## Quiz 1\n\n", "").replace("## Quiz 2\n\n", "");
        let template = TemplateParser::parse(&collapsed).unwrap();
        assert_eq!(template.quizzes.len(), 2);
    }

    #[test]
    fn test_render_parse_round_trip_preserves_frontmatter() {
        let original = valid_template();
        let rendered = original.render();
        let parsed = TemplateParser::parse(&rendered).unwrap();
        assert_eq!(parsed.frontmatter, original.frontmatter);
        assert_eq!(parsed.content_items.len(), original.content_items.len());
        assert_eq!(parsed.quizzes, original.quizzes);
        assert_eq!(parsed.quotes, original.quotes);
    }

    #[test]
    fn test_resolve_correct_answer_forms() {
        assert_eq!(resolve_correct_answer("a", 3), Some(0));
        assert_eq!(resolve_correct_answer("C", 3), Some(2));
        assert_eq!(resolve_correct_answer("b)", 3), Some(1));
        assert_eq!(resolve_correct_answer("0", 3), Some(0));
        assert_eq!(resolve_correct_answer("3", 3), Some(2));
        assert_eq!(resolve_correct_answer("d", 3), None);
    }
}
