//! Difficulty specialization.
//!
//! Rewrites one item list into per-difficulty variants that differ
//! meaningfully: beginner favors common words, shorter prose, and
//! didactic explanations; advanced keeps technical vocabulary, analytic
//! framing, and a larger item budget. Underlying concepts survive both
//! rewrites; the variants are measured by token-level Jaccard distance.

use std::collections::HashSet;

use crate::models::{Difficulty, FlexibleItem, Language, bands, char_len};
use crate::splitter::{clip_chars, split_sentences, strip_difficulty_tokens};

/// Target token-level Jaccard distance between variant content texts.
pub const DIFFERENTIATION_TARGET: f64 = 0.7;

/// Simple ↔ technical lexicon, Portuguese. Beginner rewrites right→left,
/// advanced rewrites left→right.
const LEXICON: &[(&str, &str)] = &[
    ("usar", "empregar"),
    ("mostrar", "evidenciar"),
    ("começar", "iniciar"),
    ("melhorar", "otimizar"),
    ("mudar", "modificar"),
    ("ajuda", "suporte"),
    ("rápido", "imediato"),
    ("fácil", "simples de executar"),
    ("difícil", "custoso"),
    ("pequeno", "reduzido"),
    ("pequena", "reduzida"),
    ("grande", "substancial"),
    ("ver", "observar"),
    ("lembrar", "recordar"),
    ("repetir", "reiterar"),
    ("prêmio", "recompensa"),
    ("jeito", "método"),
    ("meta", "objetivo"),
    ("todo dia", "diariamente"),
    ("força de vontade", "autocontrole"),
    ("cérebro", "circuito neural"),
    ("hábito pequeno", "micro-hábito"),
];

/// Didactic close appended to beginner content.
const BEGINNER_FRAME: &str =
    "Regra de ouro: escolha a menor versão possível, faça hoje e comemore na hora.";

/// Analytic opening and close for advanced content.
const ADVANCED_OPENING: &str = "Na leitura avançada:";
const ADVANCED_FRAME: &str =
    "Monitore gatilho, resposta e recompensa; recalibre o protocolo quando o desempenho estagnar.";

/// Didactic close appended to beginner quiz explanations.
const BEGINNER_EXPLANATION_FRAME: &str = "Guarde o princípio e aplique na próxima chance.";

/// Analytic close appended to advanced quiz explanations.
const ADVANCED_EXPLANATION_FRAME: &str = "A distinção está no mecanismo, não na intenção.";

/// Rewrites item lists per difficulty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultySpecializer;

impl DifficultySpecializer {
    /// Creates a specializer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Produces the variant item list for one difficulty.
    ///
    /// The input is never mutated; each variant starts from a fresh copy.
    #[must_use]
    pub fn specialize(
        &self,
        items: &[FlexibleItem],
        difficulty: Difficulty,
        _language: Language,
    ) -> Vec<FlexibleItem> {
        let mut out: Vec<FlexibleItem> = items
            .iter()
            .map(|item| specialize_item(item, difficulty))
            .collect();
        truncate_preserving_minimums(&mut out, difficulty.max_items());
        out
    }
}

fn specialize_item(item: &FlexibleItem, difficulty: Difficulty) -> FlexibleItem {
    match item {
        FlexibleItem::Content {
            content,
            author,
            tips,
        } => {
            let rewritten = match difficulty {
                Difficulty::Beginner => beginner_content(content),
                Difficulty::Advanced => advanced_content(content),
            };
            let tips = tips.as_ref().map(|tips| match difficulty {
                // Beginners get at most two tips; advanced keeps them all.
                Difficulty::Beginner => tips.iter().take(2).cloned().collect(),
                Difficulty::Advanced => tips.clone(),
            });
            FlexibleItem::Content {
                content: rewritten,
                author: author.clone(),
                tips: tips.filter(|t: &Vec<String>| !t.is_empty()),
            }
        },
        FlexibleItem::Quote { content, author } => FlexibleItem::Quote {
            content: content.clone(),
            author: author.clone(),
        },
        FlexibleItem::Quiz {
            question,
            options,
            correct_answer,
            explanation,
        } => {
            let question = strip_difficulty_tokens(question);
            let options = options
                .iter()
                .map(|option| apply_lexicon(option, difficulty))
                .map(|option| clip_chars(&option, bands::OPTION_MAX))
                .collect();
            let explanation = specialize_explanation(explanation, difficulty);
            FlexibleItem::Quiz {
                question,
                options,
                correct_answer: *correct_answer,
                explanation,
            }
        },
    }
}

/// Beginner prose: the leading sentence in common words, closed with a
/// didactic rule of thumb. Short sentences and a small vocabulary beat
/// completeness at this level.
///
/// The frame is dropped when it would push the text over the content
/// band; an over-band core is left alone for the validator and the
/// repair ladder to handle.
fn beginner_content(text: &str) -> String {
    let sentences = split_sentences(text);
    let core = sentences.first().cloned().unwrap_or_default();
    let core = apply_lexicon(&core, Difficulty::Beginner);
    let framed = format!("{core} {BEGINNER_FRAME}");
    if char_len(&framed) <= bands::CONTENT_MAX {
        framed
    } else {
        core
    }
}

/// Advanced prose: the later sentences in technical vocabulary, framed by
/// an analytic opening and close. Working from the sentences the beginner
/// variant skips keeps the two variants lexically apart while the concept
/// keywords survive in both.
fn advanced_content(text: &str) -> String {
    let sentences = split_sentences(text);
    let core = if sentences.len() > 1 {
        sentences[1..].join(" ")
    } else {
        sentences.first().cloned().unwrap_or_default()
    };
    let core = apply_lexicon(&core, Difficulty::Advanced);
    let full = format!("{ADVANCED_OPENING} {core} {ADVANCED_FRAME}");
    if char_len(&full) <= bands::CONTENT_MAX {
        return full;
    }
    let opened = format!("{ADVANCED_OPENING} {core}");
    if char_len(&opened) <= bands::CONTENT_MAX {
        opened
    } else {
        core
    }
}

fn specialize_explanation(text: &str, difficulty: Difficulty) -> String {
    let rewritten = apply_lexicon(text, difficulty);
    let frame = match difficulty {
        Difficulty::Beginner => BEGINNER_EXPLANATION_FRAME,
        Difficulty::Advanced => ADVANCED_EXPLANATION_FRAME,
    };
    let out = if char_len(&rewritten) + 1 + char_len(frame) <= bands::EXPLANATION_MAX {
        format!("{rewritten} {frame}")
    } else {
        rewritten
    };
    clip_chars(&out, bands::EXPLANATION_MAX)
}

/// Applies the lexicon in the direction matching the difficulty.
fn apply_lexicon(text: &str, difficulty: Difficulty) -> String {
    let mut out = text.to_string();
    for (simple, technical) in LEXICON {
        let (from, to) = match difficulty {
            Difficulty::Beginner => (*technical, *simple),
            Difficulty::Advanced => (*simple, *technical),
        };
        out = replace_word(&out, from, to);
    }
    out
}

/// Whole-word, case-tolerant replacement: a match with a capitalized
/// first letter keeps the capital.
fn replace_word(text: &str, from: &str, to: &str) -> String {
    let lowered = text.to_lowercase();
    let needle = from.to_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(pos) = lowered[cursor..].find(&needle) {
        let begin = cursor + pos;
        let end = begin + needle.len();
        let boundary_before = begin == 0
            || lowered[..begin]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
        let boundary_after = lowered[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());

        if boundary_before && boundary_after {
            out.push_str(&text[cursor..begin]);
            let capitalized = text[begin..].chars().next().is_some_and(char::is_uppercase);
            if capitalized {
                let mut chars = to.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            } else {
                out.push_str(to);
            }
        } else {
            out.push_str(&text[cursor..end]);
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Drops items from the tail until `cap`, never dropping below one
/// content and two quizzes.
fn truncate_preserving_minimums(items: &mut Vec<FlexibleItem>, cap: usize) {
    while items.len() > cap {
        let content_count = items.iter().filter(|i| i.type_name() == "content").count();
        let quiz_count = items.iter().filter(|i| i.type_name() == "quiz").count();

        let droppable = items.iter().rposition(|item| match item.type_name() {
            "content" => content_count > 1,
            "quiz" => quiz_count > 2,
            _ => true,
        });
        match droppable {
            Some(index) => {
                items.remove(index);
            },
            None => break,
        }
    }
}

/// Lowercase alphanumeric token set of a text.
fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Token-level Jaccard distance between two texts: `1 - |A∩B| / |A∪B|`.
#[must_use]
pub fn jaccard_distance(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    #[allow(clippy::cast_precision_loss)]
    {
        1.0 - intersection as f64 / union as f64
    }
}

/// Jaccard distance over the concatenated content-item text of two item
/// lists. This is the differentiation measure between variants.
#[must_use]
pub fn content_jaccard_distance(a: &[FlexibleItem], b: &[FlexibleItem]) -> f64 {
    let gather = |items: &[FlexibleItem]| -> String {
        items
            .iter()
            .filter(|i| i.type_name() == "content")
            .map(FlexibleItem::body)
            .collect::<Vec<_>>()
            .join(" ")
    };
    jaccard_distance(&gather(a), &gather(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> FlexibleItem {
        FlexibleItem::Content {
            content: text.to_string(),
            author: None,
            tips: None,
        }
    }

    fn quiz() -> FlexibleItem {
        FlexibleItem::Quiz {
            question: "Qual é a melhor âncora para um hábito novo?".to_string(),
            options: vec![
                "Um horário fixo".to_string(),
                "Um hábito que já existe".to_string(),
            ],
            correct_answer: 1,
            explanation: "Âncoras contextuais acompanham a rotina real, enquanto horários \
                          quebram quando a agenda muda."
                .to_string(),
        }
    }

    fn sample_items() -> Vec<FlexibleItem> {
        vec![
            content(
                "Comece com uma versão pequena do hábito, fácil de repetir. A meta é treinar o \
                 cérebro a voltar amanhã sem usar força de vontade. Todo dia conta mais do que \
                 a intensidade de uma sessão isolada.",
            ),
            quiz(),
            content(
                "Âncoras vencem horários porque acompanham a rotina real. Depois do café, \
                 antes do banho: o contexto puxa o comportamento. Escolha uma âncora que já \
                 acontece todo dia e prenda o hábito novo logo depois dela.",
            ),
            quiz(),
        ]
    }

    #[test]
    fn test_variants_respect_bands() {
        let specializer = DifficultySpecializer::new();
        for difficulty in [Difficulty::Beginner, Difficulty::Advanced] {
            let items = specializer.specialize(&sample_items(), difficulty, Language::Portuguese);
            for item in &items {
                assert!(item.within_bands(), "{difficulty}: {item:?}");
            }
        }
    }

    #[test]
    fn test_differentiation_target_met() {
        let specializer = DifficultySpecializer::new();
        let source = sample_items();
        let beginner = specializer.specialize(&source, Difficulty::Beginner, Language::Portuguese);
        let advanced = specializer.specialize(&source, Difficulty::Advanced, Language::Portuguese);

        let distance = content_jaccard_distance(&beginner, &advanced);
        assert!(
            distance >= DIFFERENTIATION_TARGET,
            "distance {distance} under target"
        );
    }

    #[test]
    fn test_concept_keywords_survive_both_variants() {
        let specializer = DifficultySpecializer::new();
        let source = sample_items();
        let beginner = specializer.specialize(&source, Difficulty::Beginner, Language::Portuguese);
        let advanced = specializer.specialize(&source, Difficulty::Advanced, Language::Portuguese);

        for keyword in ["hábito", "âncora"] {
            for variant in [&beginner, &advanced] {
                let text = variant
                    .iter()
                    .filter(|i| i.type_name() == "content")
                    .map(FlexibleItem::body)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                assert!(text.contains(keyword), "{keyword} missing from a variant");
            }
        }
    }

    #[test]
    fn test_beginner_item_cap() {
        let specializer = DifficultySpecializer::new();
        let mut source = sample_items();
        source.push(content(
            "A celebração imediata fecha o circuito do hábito com emoção, e sem ela o \
             comportamento novo vira apenas mais uma tarefa na lista.",
        ));
        source.push(content(
            "O ambiente decide mais do que a motivação: remova um passo de fricção do \
             comportamento desejado e adicione fricção ao que você quer evitar.",
        ));
        source.push(content(
            "Planos ambiciosos morrem na primeira semana difícil; planos minúsculos \
             sobrevivem a qualquer segunda-feira e crescem com a consistência.",
        ));
        assert_eq!(source.len(), 7);

        let beginner = specializer.specialize(&source, Difficulty::Beginner, Language::Portuguese);
        assert!(beginner.len() <= Difficulty::Beginner.max_items());
        assert!(beginner.iter().filter(|i| i.type_name() == "quiz").count() >= 2);
        assert!(beginner.iter().any(|i| i.type_name() == "content"));
    }

    #[test]
    fn test_difficulty_tokens_stripped_from_quiz_questions() {
        let specializer = DifficultySpecializer::new();
        let mut source = sample_items();
        if let FlexibleItem::Quiz { question, .. } = &mut source[1] {
            *question = "Qual é a melhor âncora - Iniciante?".to_string();
        }
        let items = specializer.specialize(&source, Difficulty::Advanced, Language::Portuguese);
        if let FlexibleItem::Quiz { question, .. } = &items[1] {
            assert!(!question.contains("Iniciante"));
        }
    }

    #[test]
    fn test_replace_word_respects_boundaries_and_case() {
        assert_eq!(
            replace_word("Meta clara, metade do caminho.", "meta", "objetivo"),
            "Objetivo clara, metade do caminho."
        );
    }

    #[test]
    fn test_jaccard_distance_extremes() {
        assert!((jaccard_distance("a b c", "a b c") - 0.0).abs() < f64::EPSILON);
        assert!((jaccard_distance("a b", "c d") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quotes_pass_through_unchanged() {
        let specializer = DifficultySpecializer::new();
        let quote = FlexibleItem::Quote {
            content: "A disciplina é a ponte entre metas e conquistas.".to_string(),
            author: "Jim Rohn".to_string(),
        };
        let items = specializer.specialize(
            std::slice::from_ref(&quote),
            Difficulty::Beginner,
            Language::Portuguese,
        );
        assert_eq!(items[0], quote);
    }
}
