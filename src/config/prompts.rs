//! Stage prompt templates.
//!
//! Both stages load a human-edited YAML document carrying string templates
//! with named `{slot}` substitution variables. Required slots are checked
//! at load so a missing variable fails fast instead of producing a prompt
//! with a literal placeholder.

use serde::Deserialize;

use crate::{Error, Result};

/// Slots the Stage-1 user template must carry.
pub const PREPROCESSING_SLOTS: &[&str] = &[
    "{raw_content}",
    "{file_type}",
    "{suggested_dimension}",
    "{target_difficulty}",
    "{target_audience}",
    "{template_content}",
];

/// Slots the Stage-3 user template must carry.
pub const GENERATION_SLOTS: &[&str] = &[
    "{filled_template}",
    "{target_json_structure}",
    "{target_difficulty}",
    "{target_audience}",
    "{estimated_duration}",
    "{suggested_coins}",
];

/// Templates for the preprocessing stage (raw file → filled template).
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessingPrompts {
    /// Stage framing appended after the persona identity block.
    pub system_template: String,
    /// User message template; must carry every [`PREPROCESSING_SLOTS`] slot.
    pub user_template: String,
    /// Canonical template skeleton substituted into `{template_content}`.
    pub template_skeleton: String,
    /// Terse suffix appended on the single repair retry; the defect list
    /// follows it.
    pub repair_suffix: String,
}

/// Templates for the structural generation stage (filled template → JSON).
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationPrompts {
    /// Stage framing appended after the persona identity block.
    pub system_template: String,
    /// User message template; must carry every [`GENERATION_SLOTS`] slot.
    pub user_template: String,
    /// Repair template quoting schema violations and the offending
    /// document; must carry `{violations}` and `{document}`.
    pub repair_template: String,
}

fn require_slots(template: &str, slots: &[&str], key: &str) -> Result<()> {
    for slot in slots {
        if !template.contains(slot) {
            return Err(Error::ConfigInvalid {
                key: key.to_string(),
                message: format!("missing required slot {slot}"),
            });
        }
    }
    Ok(())
}

impl PreprocessingPrompts {
    /// Parses and validates the preprocessing templates from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the template and the missing slot.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let prompts: Self = serde_yaml_ng::from_str(text).map_err(|e| Error::ConfigInvalid {
            key: "preprocessing_prompts".to_string(),
            message: e.to_string(),
        })?;
        prompts.validate()?;
        Ok(prompts)
    }

    /// Checks that every required slot is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for the first missing slot.
    pub fn validate(&self) -> Result<()> {
        require_slots(
            &self.user_template,
            PREPROCESSING_SLOTS,
            "preprocessing_prompts.user_template",
        )
    }
}

impl GenerationPrompts {
    /// Parses and validates the generation templates from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the template and the missing slot.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let prompts: Self = serde_yaml_ng::from_str(text).map_err(|e| Error::ConfigInvalid {
            key: "generation_prompts".to_string(),
            message: e.to_string(),
        })?;
        prompts.validate()?;
        Ok(prompts)
    }

    /// Checks that every required slot is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for the first missing slot.
    pub fn validate(&self) -> Result<()> {
        require_slots(
            &self.user_template,
            GENERATION_SLOTS,
            "generation_prompts.user_template",
        )?;
        require_slots(
            &self.repair_template,
            &["{violations}", "{document}"],
            "generation_prompts.repair_template",
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Minimal valid preprocessing templates.
    pub(crate) const PREPROCESSING_YAML: &str = r#"
system_template: |
  Você transforma conteúdo bruto em um template de aprendizado estruturado.
user_template: |
  Tipo de arquivo: {file_type}
  Dimensão sugerida: {suggested_dimension}
  Dificuldade alvo: {target_difficulty}
  Público alvo: {target_audience}

  Preencha o template abaixo com base no conteúdo.

  TEMPLATE:
  {template_content}

  CONTEÚDO:
  {raw_content}
template_skeleton: |
  ---
  title: ""
  description: ""
  target_difficulty: beginner
  dimension: physicalHealth
  archetype: warrior
  related_to_type: GENERIC
  related_to_id: ""
  estimated_duration: 300
  coins_reward: 12
  language: portuguese
  region: Brasil
  learning_objectives: []
  prerequisites: []
  tags: []
  ---
  # Overview

  # Main Content

  ## Content Item 1

  # Key Concepts

  # Examples

  # Summary

  # Quiz
repair_suffix: |
  A resposta anterior tinha defeitos. Corrija exatamente estes pontos e devolva o template completo:
"#;

    /// Minimal valid generation templates.
    pub(crate) const GENERATION_YAML: &str = r#"
system_template: |
  Você converte um template preenchido em JSON de desafio móvel.
user_template: |
  Dificuldade: {target_difficulty}
  Público: {target_audience}
  Duração estimada: {estimated_duration}
  Moedas sugeridas: {suggested_coins}

  ESTRUTURA ALVO:
  {target_json_structure}

  TEMPLATE PREENCHIDO:
  {filled_template}
repair_template: |
  O documento abaixo violou o schema. Corrija apenas o necessário e devolva o JSON completo.

  VIOLAÇÕES:
  {violations}

  DOCUMENTO:
  {document}
"#;
}
