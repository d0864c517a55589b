//! Preprocessing orchestrator: raw file → filled template.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    CancelFlag, EXTRACTION_BUDGET, FileBudget, collect_inputs, resolve_reference_dir, run_batch,
};
use crate::catalog::{DigestCache, ReferenceCatalogs};
use crate::config::ConfigStore;
use crate::extract::ContentExtractor;
use crate::llm::{AuditedProvider, LlmProvider, PromptAudit};
use crate::models::{Difficulty, Dimension, PipelineOptions, Report, RunStatus};
use crate::prompt::{PreprocessingInput, compose_preprocessing};
use crate::template::{FilledTemplate, TemplateParser};
use crate::{Error, Result};

/// Output token ceiling for Stage-1 calls.
const MAX_OUTPUT_TOKENS: u32 = 4096;
/// Sampling temperature for Stage-1 calls.
const TEMPERATURE: f32 = 0.7;

/// Stage-1 orchestrator.
///
/// For each input: extract → compose → complete → parse and check the
/// filled template, with one terse repair retry on defects. Batches are
/// best-effort; one failure never aborts siblings.
pub struct PreprocessingService {
    store: Arc<ConfigStore>,
    llm: Arc<dyn LlmProvider>,
    extractor: ContentExtractor,
    digest_cache: Arc<DigestCache>,
}

impl PreprocessingService {
    /// Creates the service.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            store,
            llm,
            extractor: ContentExtractor::new(),
            digest_cache: Arc::new(DigestCache::new()),
        }
    }

    /// Shares a digest cache with another service, so the pipeline does
    /// not rebuild the digest per stage.
    #[must_use]
    pub fn with_digest_cache(mut self, cache: Arc<DigestCache>) -> Self {
        self.digest_cache = cache;
        self
    }

    /// Processes a file or directory of files.
    ///
    /// # Errors
    ///
    /// Propagates only process-fatal errors (configuration, reference
    /// data); per-file failures are reported in the [`Report`].
    pub fn preprocess(
        &self,
        input_path: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
        cancel: Option<&CancelFlag>,
    ) -> Result<Report> {
        let inputs = collect_inputs(input_path)?;
        let llm = audited(&self.llm, options);
        run_batch(&inputs, options, cancel, |input| {
            let (path, status) = self.preprocess_file(input, output_dir, options, &llm)?;
            Ok((vec![path.display().to_string()], status))
        })
    }

    /// Runs Stage 1 for one input file; returns the emitted template path
    /// and whether a repair retry was needed.
    ///
    /// # Errors
    ///
    /// Every per-file error kind documented in [`crate::Error`].
    pub fn preprocess_file(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
        llm: &Arc<dyn LlmProvider>,
    ) -> Result<(PathBuf, RunStatus)> {
        let budget = FileBudget::start();
        let source = self.extractor.extract(input)?;
        budget.check_stage(EXTRACTION_BUDGET)?;

        let catalogs = ReferenceCatalogs::new(
            resolve_reference_dir(options),
            self.store.persona().reference_policy.clone(),
        );
        let digest = self.digest_cache.get_or_build(&catalogs)?;
        budget.check()?;

        let input_spec = PreprocessingInput {
            raw_content: &source.text,
            file_type: source.format.as_str(),
            suggested_dimension: suggest_dimension(&source.text),
            target_difficulty: Difficulty::Beginner,
            target_audience: crate::models::Archetype::Warrior.as_str(),
        };
        let pack = compose_preprocessing(
            self.store.persona(),
            self.store.preprocessing_prompts(),
            &digest,
            &input_spec,
        )?;

        let response = llm.complete(&pack.system, &pack.user, MAX_OUTPUT_TOKENS, TEMPERATURE)?;
        budget.check()?;

        let (template, status) = match parse_and_check(&response) {
            Ok(template) => (template, RunStatus::Ok),
            Err(defects) => {
                tracing::info!(
                    input = %input.display(),
                    defects = defects.len(),
                    "template defective, requesting repair"
                );
                let repair_user = format!(
                    "{}\n\n{}\n{}",
                    pack.user,
                    self.store.preprocessing_prompts().repair_suffix.trim(),
                    defects
                        .iter()
                        .map(|d| format!("- {d}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                let repaired =
                    llm.complete(&pack.system, &repair_user, MAX_OUTPUT_TOKENS, TEMPERATURE)?;
                budget.check()?;
                let template = parse_and_check(&repaired)
                    .map_err(|defects| Error::TemplateInvalid { defects })?;
                (template, RunStatus::Repaired)
            },
        };

        let path = emit_template(&template, input, output_dir)?;
        tracing::info!(input = %input.display(), output = %path.display(), "template emitted");
        Ok((path, status))
    }
}

/// Wraps the provider with the audit sink when the options ask for it.
pub(crate) fn audited(
    llm: &Arc<dyn LlmProvider>,
    options: &PipelineOptions,
) -> Arc<dyn LlmProvider> {
    if !options.enable_prompt_audit {
        return Arc::clone(llm);
    }
    let path = options
        .audit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("prompt_audit.jsonl"));
    Arc::new(AuditedProvider::new(
        Arc::clone(llm),
        Arc::new(PromptAudit::open(path)),
    ))
}

/// Parses the Stage-1 response and runs the content checks; the error
/// side carries the defect list for the repair prompt.
fn parse_and_check(response: &str) -> std::result::Result<FilledTemplate, Vec<String>> {
    let template = match TemplateParser::parse(response) {
        Ok(template) => template,
        Err(Error::TemplateInvalid { defects }) => return Err(defects),
        Err(other) => return Err(vec![other.to_string()]),
    };
    let defects = template.defects();
    if defects.is_empty() {
        Ok(template)
    } else {
        Err(defects)
    }
}

/// Writes the normalized template next to its input stem.
fn emit_template(
    template: &FilledTemplate,
    input: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| Error::ExtractionFailed {
        path: output_dir.display().to_string(),
        cause: e.to_string(),
    })?;
    let stem = input
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("input");
    let path = output_dir.join(format!("{stem}_filled.md"));
    std::fs::write(&path, template.render()).map_err(|e| Error::ExtractionFailed {
        path: path.display().to_string(),
        cause: e.to_string(),
    })?;
    Ok(path)
}

/// Guesses the life-area dimension from keyword frequencies in the raw
/// text. A hint for the prompt only; the LLM decides the final tag.
#[must_use]
pub fn suggest_dimension(text: &str) -> Dimension {
    const MARKERS: &[(Dimension, &[&str])] = &[
        (
            Dimension::PhysicalHealth,
            &["sono", "treino", "exercício", "corpo", "água", "comida", "energia", "caminhada"],
        ),
        (
            Dimension::MentalHealth,
            &["ansiedade", "foco", "meditação", "estresse", "mente", "emoção", "tela"],
        ),
        (
            Dimension::Relationships,
            &["família", "amigo", "amiga", "conversa", "relacionamento", "filho", "casal"],
        ),
        (
            Dimension::Work,
            &["trabalho", "carreira", "reunião", "projeto", "produtividade", "e-mail", "prazo"],
        ),
        (
            Dimension::Spirituality,
            &["propósito", "fé", "gratidão", "valores", "sentido", "oração", "silêncio"],
        ),
    ];

    let lowered = text.to_lowercase();
    let mut best = Dimension::PhysicalHealth;
    let mut best_score = 0usize;
    for (dimension, markers) in MARKERS {
        let score: usize = markers
            .iter()
            .map(|marker| lowered.matches(marker).count())
            .sum();
        if score > best_score {
            best = *dimension;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ScriptedProvider, write_reference_dir};
    use super::*;
    use crate::config::fixtures::test_store;

    fn valid_response() -> String {
        crate::template::fixtures::valid_template().render()
    }

    #[test]
    fn test_suggest_dimension() {
        assert_eq!(
            suggest_dimension("Reunião atrás de reunião, prazo em cima de prazo no trabalho."),
            Dimension::Work
        );
        assert_eq!(
            suggest_dimension("Gratidão e propósito dão sentido à semana."),
            Dimension::Spirituality
        );
        assert_eq!(suggest_dimension("texto neutro"), Dimension::PhysicalHealth);
    }

    #[test]
    fn test_preprocess_file_ok() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let input = workspace.path().join("habitos.md");
        std::fs::write(&input, "# Hábitos\n\nComece pequeno com um hábito por vez.\n").unwrap();
        let output = workspace.path().join("out");

        let llm: Arc<dyn LlmProvider> =
            Arc::new(ScriptedProvider::new(vec![Ok(valid_response())]));
        let service = PreprocessingService::new(Arc::new(test_store()), Arc::clone(&llm));
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let (path, status) = service
            .preprocess_file(&input, &output, &options, &llm)
            .unwrap();
        assert_eq!(status, RunStatus::Ok);
        assert_eq!(
            path.file_name().and_then(std::ffi::OsStr::to_str),
            Some("habitos_filled.md")
        );
        let emitted = std::fs::read_to_string(&path).unwrap();
        assert!(emitted.starts_with("---\n"));
        assert!(emitted.contains("# Quiz"));
    }

    #[test]
    fn test_preprocess_repair_path() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let input = workspace.path().join("habitos.md");
        std::fs::write(&input, "Hábito e rotina.\n").unwrap();
        let output = workspace.path().join("out");

        // First response misses the quiz section entirely; the repaired
        // second response is complete.
        let mut broken = crate::template::fixtures::valid_template();
        broken.quizzes.clear();
        let scripted = Arc::new(ScriptedProvider::new(vec![
            Ok(broken.render()),
            Ok(valid_response()),
        ]));
        let llm: Arc<dyn LlmProvider> = scripted.clone();
        let service = PreprocessingService::new(Arc::new(test_store()), Arc::clone(&llm));
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let (_, status) = service
            .preprocess_file(&input, &output, &options, &llm)
            .unwrap();
        assert_eq!(status, RunStatus::Repaired);
        assert_eq!(scripted.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preprocess_fails_after_failed_repair() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let input = workspace.path().join("habitos.md");
        std::fs::write(&input, "Hábito.\n").unwrap();
        let output = workspace.path().join("out");

        let mut broken = crate::template::fixtures::valid_template();
        broken.quizzes.clear();
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            Ok(broken.render()),
            Ok(broken.render()),
        ]));
        let service = PreprocessingService::new(Arc::new(test_store()), Arc::clone(&llm));
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let err = service
            .preprocess_file(&input, &output, &options, &llm)
            .unwrap_err();
        assert_eq!(err.kind(), "template_invalid");
    }

    #[test]
    fn test_batch_continues_past_unsupported_format() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let inputs = workspace.path().join("in");
        std::fs::create_dir(&inputs).unwrap();
        std::fs::write(inputs.join("a.md"), "Hábito e rotina diária.\n").unwrap();
        std::fs::write(inputs.join("b.xlsx"), "binário\n").unwrap();
        let output = workspace.path().join("out");

        let llm: Arc<dyn LlmProvider> =
            Arc::new(ScriptedProvider::new(vec![Ok(valid_response())]));
        let service = PreprocessingService::new(Arc::new(test_store()), llm);
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let report = service
            .preprocess(&inputs, &output, &options, None)
            .unwrap();
        assert_eq!(report.processed(), 2);
        assert_eq!(report.count(RunStatus::Ok), 1);
        assert_eq!(report.count(RunStatus::Failed), 1);
        assert_eq!(
            report.failures()[0].error_kind.as_deref(),
            Some("unsupported_format")
        );
    }
}
