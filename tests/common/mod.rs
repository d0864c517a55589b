//! Shared fixtures for the integration suites.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

use supertask::llm::LlmProvider;

/// The crate's shipped configuration directory.
#[must_use]
pub fn shipped_config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config")
}

/// The crate's shipped reference catalogs.
#[must_use]
pub fn shipped_reference_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("reference")
}

/// Scripted LLM: pops one canned outcome per call.
pub struct ScriptedLlm {
    responses: Mutex<Vec<supertask::Result<String>>>,
    /// Completions requested so far.
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new(responses: Vec<supertask::Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, _: &str, _: &str, _: u32, _: f32) -> supertask::Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(!responses.is_empty(), "scripted llm exhausted");
        responses.remove(0)
    }
}

/// A complete filled template: three content items (the third under the
/// content band, so the splitter drops it), one quote, two quizzes.
/// Splits into five items (content, quiz, content, quote, quiz).
#[must_use]
pub fn filled_template() -> String {
    r#"---
title: "Hábitos Minúsculos - Iniciante"
description: "Como começar um hábito pequeno demais para falhar."
target_difficulty: beginner
dimension: physicalHealth
archetype: warrior
related_to_type: GENERIC
related_to_id: tiny-habits-intro
estimated_duration: 300
coins_reward: 12
language: portuguese
region: Brasil
learning_objectives:
  - ancorar um hábito novo
prerequisites: []
tags: [hábitos]
---

# Overview

Todo hábito grande começou pequeno.

# Main Content

## Content Item 1

Comece com uma versão do hábito pequena demais para falhar. Trinta segundos por dia bastam para ensinar o cérebro a voltar amanhã sem depender de motivação.

Tips:
- Prenda o hábito novo a um hábito que já existe na sua rotina.

## Content Item 2

Âncoras vencem horários porque acompanham a rotina real. Depois do café, antes do banho: o contexto puxa o comportamento novo sem precisar de lembrete.

> "A disciplina é a ponte entre metas e conquistas."
Author: Autor de Hábitos Diários

## Content Item 3

Respire fundo e comece agora mesmo.

# Key Concepts

- âncora
- celebração

# Examples

- Uma flexão depois de escovar os dentes.

# Summary

Pequeno, ancorado e celebrado: o hábito cresce sozinho.

# Quiz

## Quiz 1

Question: O que torna um hábito minúsculo eficaz?
Options:
a) A consistência diária
b) A intensidade do esforço
c) A duração da sessão
Correct Answer: a
Explanation: Repetir uma ação pequena todos os dias constrói o circuito do hábito sem depender de motivação.

## Quiz 2

Question: Qual é a melhor âncora para um hábito novo?
Options:
a) Um horário fixo no relógio
b) Um hábito que já existe
Correct Answer: b
Explanation: Âncoras contextuais acompanham a rotina real, enquanto horários quebram quando a agenda muda.
"#
    .to_string()
}
