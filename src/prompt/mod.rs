//! Prompt composition.
//!
//! Assembles the system and user messages for each stage by merging the
//! persona identity block, the content-selected frameworks, the reference
//! digest, and the stage template with its substitution slots. Pure
//! functions of their inputs; no I/O happens here.

mod frameworks;

pub use frameworks::{MAX_SELECTED, select_frameworks};

use regex::RegexBuilder;
use std::fmt::Write as _;

use crate::catalog::ReferenceDigest;
use crate::config::{GenerationPrompts, PersonaConfig, PreprocessingPrompts};
use crate::models::{Difficulty, Dimension};
use crate::{Error, Result};

/// Which stage a composed prompt serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Raw content → filled template.
    Preprocessing,
    /// Filled template → supertask JSON.
    Generation,
}

/// A composed prompt pair plus the references it was built from.
///
/// Ephemeral: lives for one LLM call.
#[derive(Debug, Clone)]
pub struct PromptPack {
    /// System message.
    pub system: String,
    /// User message.
    pub user: String,
    /// Stage this pack serves.
    pub stage: Stage,
    /// Persona the identity block came from.
    pub persona_name: String,
    /// Keys of the frameworks injected.
    pub framework_keys: Vec<String>,
    /// Version hash of the digest slice injected.
    pub digest_version: String,
}

/// Inputs for a Stage-1 prompt.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessingInput<'a> {
    /// Extracted raw text.
    pub raw_content: &'a str,
    /// Source format name.
    pub file_type: &'a str,
    /// Dimension guessed from the input.
    pub suggested_dimension: Dimension,
    /// Difficulty the run targets.
    pub target_difficulty: Difficulty,
    /// Audience description, e.g. the archetype.
    pub target_audience: &'a str,
}

/// Inputs for a Stage-3 prompt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    /// The filled template text.
    pub filled_template: &'a str,
    /// Dimension declared by the template frontmatter.
    pub dimension: Dimension,
    /// Difficulty the run targets.
    pub target_difficulty: Difficulty,
    /// Audience description.
    pub target_audience: &'a str,
    /// Duration to aim for, seconds.
    pub estimated_duration: u32,
    /// Coin reward to aim for.
    pub suggested_coins: u32,
}

/// Composes the Stage-1 prompt pack.
///
/// # Errors
///
/// `PromptPolicyViolation` when the composed prompt contains a forbidden
/// phrase.
pub fn compose_preprocessing(
    persona: &PersonaConfig,
    prompts: &PreprocessingPrompts,
    digest: &ReferenceDigest,
    input: &PreprocessingInput<'_>,
) -> Result<PromptPack> {
    let selected = select_frameworks(persona, input.raw_content);
    let system = build_system_message(
        persona,
        &prompts.system_template,
        &selected,
        digest,
        input.suggested_dimension,
    );
    let user = fill_slots(
        &prompts.user_template,
        &[
            ("raw_content", input.raw_content),
            ("file_type", input.file_type),
            ("suggested_dimension", input.suggested_dimension.as_str()),
            ("target_difficulty", input.target_difficulty.as_str()),
            ("target_audience", input.target_audience),
            ("template_content", &prompts.template_skeleton),
        ],
    );

    let pack = PromptPack {
        system,
        user,
        stage: Stage::Preprocessing,
        persona_name: persona.identity.name.clone(),
        framework_keys: selected.iter().map(|f| f.key.clone()).collect(),
        digest_version: digest.version.clone(),
    };
    guard_forbidden_phrases(persona, &pack)?;
    Ok(pack)
}

/// Composes the Stage-3 prompt pack.
///
/// `target_json_structure` is projected from the loaded schema document
/// via [`schema_skeleton`].
///
/// # Errors
///
/// `PromptPolicyViolation` when the composed prompt contains a forbidden
/// phrase.
pub fn compose_generation(
    persona: &PersonaConfig,
    prompts: &GenerationPrompts,
    digest: &ReferenceDigest,
    schema: &serde_json::Value,
    input: &GenerationInput<'_>,
) -> Result<PromptPack> {
    let selected = select_frameworks(persona, input.filled_template);
    let system = build_system_message(
        persona,
        &prompts.system_template,
        &selected,
        digest,
        input.dimension,
    );
    let skeleton = schema_skeleton(schema);
    let user = fill_slots(
        &prompts.user_template,
        &[
            ("filled_template", input.filled_template),
            ("target_json_structure", &skeleton),
            ("target_difficulty", input.target_difficulty.as_str()),
            ("target_audience", input.target_audience),
            ("estimated_duration", &input.estimated_duration.to_string()),
            ("suggested_coins", &input.suggested_coins.to_string()),
        ],
    );

    let pack = PromptPack {
        system,
        user,
        stage: Stage::Generation,
        persona_name: persona.identity.name.clone(),
        framework_keys: selected.iter().map(|f| f.key.clone()).collect(),
        digest_version: digest.version.clone(),
    };
    guard_forbidden_phrases(persona, &pack)?;
    Ok(pack)
}

/// Substitutes `{name}` slots in a template.
///
/// Substitution is single-pass per slot: values containing braces (JSON
/// skeletons, templates) are never re-scanned for slots.
#[must_use]
pub fn fill_slots(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Persona identity block, rendered verbatim at the head of every system
/// message, with the masculine-form rule spelled out.
fn identity_block(persona: &PersonaConfig) -> String {
    let identity = &persona.identity;
    let mut out = String::new();
    let _ = writeln!(out, "Você é {}, {}.", identity.name, identity.role);
    let _ = writeln!(out, "Contexto cultural: {}", identity.cultural_context);
    let _ = writeln!(
        out,
        "Escreva sempre na forma {} da língua.",
        if identity.language_form == "masculine" {
            "masculina"
        } else {
            identity.language_form.as_str()
        }
    );
    if !identity.preferred_phrases.is_empty() {
        let _ = writeln!(out, "Frases preferidas do treinador:");
        for phrase in &identity.preferred_phrases {
            let _ = writeln!(out, "- {phrase}");
        }
    }
    out
}

fn build_system_message(
    persona: &PersonaConfig,
    stage_template: &str,
    selected: &[&crate::config::Framework],
    digest: &ReferenceDigest,
    dimension: Dimension,
) -> String {
    let mut out = identity_block(persona);
    out.push('\n');
    out.push_str(stage_template);

    out.push_str("\n## Lentes aplicadas\n\n");
    for framework in selected {
        let _ = writeln!(out, "### {}", framework.name);
        for rule in &framework.rules {
            let _ = writeln!(out, "- {rule}");
        }
        if let Some(prompt) = framework.coaching_prompts.first() {
            let _ = writeln!(out, "Pergunta típica: {prompt}");
        }
        out.push('\n');
    }

    out.push_str("## Dados de referência\n\n");
    out.push_str(&digest.slice_for(dimension));
    out
}

/// Rejects the pack when any forbidden-phrase regex matches either
/// message. Matching is case-insensitive on the escaped phrase.
fn guard_forbidden_phrases(persona: &PersonaConfig, pack: &PromptPack) -> Result<()> {
    for phrase in &persona.identity.forbidden_phrases {
        let pattern = RegexBuilder::new(&regex::escape(phrase))
            .case_insensitive(true)
            .build();
        let Ok(pattern) = pattern else {
            continue;
        };
        if pattern.is_match(&pack.system) || pattern.is_match(&pack.user) {
            return Err(Error::PromptPolicyViolation {
                phrase: phrase.clone(),
            });
        }
    }
    Ok(())
}

/// Projects a JSON Schema document to an example document skeleton.
///
/// Enums collapse to their first value, strings to a placeholder, numbers
/// to their minimum, and `oneOf` arrays to one example per alternative.
#[must_use]
pub fn schema_skeleton(schema: &serde_json::Value) -> String {
    let example = example_value(schema);
    serde_json::to_string_pretty(&example).unwrap_or_else(|_| "{}".to_string())
}

fn example_value(schema: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        return values.first().cloned().unwrap_or(Value::Null);
    }
    if let Some(value) = schema.get("const") {
        return value.clone();
    }
    if let Some(alternatives) = schema.get("oneOf").and_then(Value::as_array) {
        return alternatives
            .first()
            .map(example_value)
            .unwrap_or(Value::Null);
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {
            let mut map = serde_json::Map::new();
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, child) in properties {
                    map.insert(key.clone(), example_value(child));
                }
            }
            Value::Object(map)
        },
        Some("array") => {
            let Some(items) = schema.get("items") else {
                return Value::Array(Vec::new());
            };
            if let Some(alternatives) = items.get("oneOf").and_then(Value::as_array) {
                Value::Array(alternatives.iter().map(example_value).collect())
            } else {
                Value::Array(vec![example_value(items)])
            }
        },
        Some("integer" | "number") => schema
            .get("minimum")
            .cloned()
            .unwrap_or_else(|| Value::from(0)),
        Some("boolean") => Value::Bool(true),
        _ => Value::String(String::from("...")),
    }
}
