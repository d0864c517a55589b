//! Generation orchestrator: filled template → supertask JSON, one
//! document per requested difficulty.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::preprocess::audited;
use super::{
    CancelFlag, DifficultySpecializer, FileBudget, collect_inputs, remove_partial_outputs,
    resolve_reference_dir, run_batch,
};
use crate::catalog::{DigestCache, ReferenceCatalogs, ReferenceDigest};
use crate::config::ConfigStore;
use crate::llm::LlmProvider;
use crate::models::{
    Difficulty, DocumentMetadata, FlexibleItem, PipelineOptions, Report, RunStatus,
    SupertaskDocument,
};
use crate::prompt::{GenerationInput, compose_generation};
use crate::schema::{SchemaValidator, render_violations};
use crate::splitter::{Splitter, strip_difficulty_tokens};
use crate::template::{FilledTemplate, TemplateParser};
use crate::{Error, Result};

/// Output token ceiling for Stage-3 repair calls.
const MAX_OUTPUT_TOKENS: u32 = 8192;
/// Sampling temperature for Stage-3 repair calls. Repairs should be
/// conservative.
const TEMPERATURE: f32 = 0.2;

/// Shorter windows used by the bounded automated repair pass.
const REPAIR_WINDOW_MIN: usize = 120;
const REPAIR_WINDOW_MAX: usize = 250;

/// Schema/content version stamped into emitted documents.
const DOCUMENT_VERSION: &str = "1.1";

/// Stage-3 orchestrator.
///
/// Parse → split → specialize per difficulty → validate → emit. Schema
/// violations go through a bounded automated repair (shorter windows,
/// exact-band clipping) and then one LLM repair before the file fails.
pub struct GenerationService {
    store: Arc<ConfigStore>,
    llm: Arc<dyn LlmProvider>,
    specializer: DifficultySpecializer,
    validator: SchemaValidator,
    digest_cache: Arc<DigestCache>,
}

impl GenerationService {
    /// Creates the service.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            store,
            llm,
            specializer: DifficultySpecializer::new(),
            validator: SchemaValidator::new(),
            digest_cache: Arc::new(DigestCache::new()),
        }
    }

    /// Shares a digest cache with another service.
    #[must_use]
    pub fn with_digest_cache(mut self, cache: Arc<DigestCache>) -> Self {
        self.digest_cache = cache;
        self
    }

    /// Processes a filled template file or a directory of them.
    ///
    /// # Errors
    ///
    /// Propagates only process-fatal errors; per-file failures land in
    /// the [`Report`].
    pub fn generate(
        &self,
        template_path: &Path,
        output_dir: &Path,
        difficulties: &[Difficulty],
        options: &PipelineOptions,
        cancel: Option<&CancelFlag>,
    ) -> Result<Report> {
        let inputs = collect_inputs(template_path)?;
        let llm = audited(&self.llm, options);
        let mut report = run_batch(&inputs, options, cancel, |input| {
            let (paths, status) = self.generate_file(input, output_dir, difficulties, options, &llm)?;
            Ok((
                paths.iter().map(|p| p.display().to_string()).collect(),
                status,
            ))
        })?;
        report.difficulties = difficulties.to_vec();
        Ok(report)
    }

    /// Runs Stage 3 for one filled template.
    ///
    /// # Errors
    ///
    /// Every per-file error kind documented in [`crate::Error`]. Partial
    /// outputs are removed before an error is returned.
    pub fn generate_file(
        &self,
        template_path: &Path,
        output_dir: &Path,
        difficulties: &[Difficulty],
        options: &PipelineOptions,
        llm: &Arc<dyn LlmProvider>,
    ) -> Result<(Vec<PathBuf>, RunStatus)> {
        let budget = FileBudget::start();
        let text =
            std::fs::read_to_string(template_path).map_err(|e| Error::ExtractionFailed {
                path: template_path.display().to_string(),
                cause: e.to_string(),
            })?;
        let mut template = TemplateParser::parse(&text)?;

        let catalogs = ReferenceCatalogs::new(
            resolve_reference_dir(options),
            self.store.persona().reference_policy.clone(),
        );
        let digest = self.digest_cache.get_or_build(&catalogs)?;
        budget.check()?;

        let splitter = Splitter::new(&self.store.persona().substitutions);
        let fallback_quote = digest.coach_quote();
        let mut outcome = splitter.split(&template, fallback_quote.as_ref())?;
        let mut repaired = false;

        if outcome.quiz_shortfall > 0 {
            repaired = true;
            self.repair_quizzes(&mut template, outcome.quiz_shortfall, &digest, llm)?;
            budget.check()?;
            outcome = splitter.split(&template, fallback_quote.as_ref())?;
            if outcome.quiz_shortfall > 0 {
                return Err(Error::GenerationFailed(format!(
                    "still {} quiz item(s) short after repair",
                    outcome.quiz_shortfall
                )));
            }
        }

        let stem = template_path
            .file_stem()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("template")
            .trim_end_matches("_filled")
            .to_string();
        std::fs::create_dir_all(output_dir).map_err(|e| Error::ExtractionFailed {
            path: output_dir.display().to_string(),
            cause: e.to_string(),
        })?;

        let mut written: Vec<PathBuf> = Vec::new();
        for difficulty in difficulties {
            budget.check().inspect_err(|_| remove_partial_outputs(&written))?;
            let result = self.generate_variant(
                &template,
                &outcome.items,
                *difficulty,
                &digest,
                template_path,
                llm,
            );
            match result {
                Ok((document, variant_repaired)) => {
                    repaired = repaired || variant_repaired;
                    let path = output_dir.join(format!("{stem}_{difficulty}.json"));
                    write_document(&document, &path)
                        .inspect_err(|_| remove_partial_outputs(&written))?;
                    written.push(path);
                },
                Err(err) => {
                    remove_partial_outputs(&written);
                    return Err(err);
                },
            }
        }

        let status = if repaired {
            RunStatus::Repaired
        } else {
            RunStatus::Ok
        };
        Ok((written, status))
    }

    /// Builds and validates one difficulty variant, applying the bounded
    /// and LLM repair ladder on violations. The boolean reports whether
    /// any repair was needed.
    fn generate_variant(
        &self,
        template: &FilledTemplate,
        items: &[FlexibleItem],
        difficulty: Difficulty,
        digest: &ReferenceDigest,
        template_path: &Path,
        llm: &Arc<dyn LlmProvider>,
    ) -> Result<(SupertaskDocument, bool)> {
        let language = template.frontmatter.language;
        let specialized = self.specializer.specialize(items, difficulty, language);
        let document = self.assemble(template, specialized, difficulty, template_path);
        let violations = self.validator.check(&document, Some(difficulty));
        if violations.is_empty() {
            return Ok((document, false));
        }
        tracing::info!(
            difficulty = %difficulty,
            violations = violations.len(),
            "document invalid, trying bounded repair"
        );

        // (a) Bounded automated repair: shorter windows, exact-band clips.
        let repair_splitter = Splitter::new(&self.store.persona().substitutions)
            .with_windows(REPAIR_WINDOW_MIN, REPAIR_WINDOW_MAX)
            .with_clipping(true);
        let fallback_quote = digest.coach_quote();
        if let Ok(outcome) = repair_splitter.split(template, fallback_quote.as_ref()) {
            if outcome.quiz_shortfall == 0 {
                let specialized =
                    self.specializer.specialize(&outcome.items, difficulty, language);
                let document = self.assemble(template, specialized, difficulty, template_path);
                if self.validator.check(&document, Some(difficulty)).is_empty() {
                    return Ok((document, true));
                }
            }
        }

        // (b) LLM repair quoting the violations and the offending document.
        tracing::info!(difficulty = %difficulty, "bounded repair failed, trying LLM repair");
        let document = self.llm_repair(template, &document, &violations, difficulty, digest, llm)?;
        self.validator.validate(&document, Some(difficulty))?;
        Ok((document, true))
    }

    /// Asks the LLM for additional quiz blocks drawn from the content
    /// pool, and appends the parsed results to the template.
    fn repair_quizzes(
        &self,
        template: &mut FilledTemplate,
        missing: usize,
        digest: &ReferenceDigest,
        llm: &Arc<dyn LlmProvider>,
    ) -> Result<()> {
        let pack = self.generation_pack(template, Difficulty::Beginner, digest)?;
        let pool = template
            .content_items
            .iter()
            .map(|item| item.body.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let user = format!(
            "Crie exatamente {missing} pergunta(s) de quiz a partir do conteúdo abaixo.\n\
             Formato de cada uma:\n\
             Question: (15 a 120 caracteres)\n\
             Options:\n\
             a) (3 a 60 caracteres)\n\
             b) (3 a 60 caracteres)\n\
             Correct Answer: a\n\
             Explanation: (30 a 250 caracteres)\n\n\
             CONTEÚDO:\n{pool}"
        );
        let response = llm.complete(&pack.system, &user, MAX_OUTPUT_TOKENS, TEMPERATURE)?;
        let quizzes = TemplateParser::parse_quizzes(&response);
        if quizzes.is_empty() {
            return Err(Error::GenerationFailed(
                "quiz repair returned no parsable quiz blocks".to_string(),
            ));
        }
        template.quizzes.extend(quizzes);
        Ok(())
    }

    /// One LLM repair round for a schema-invalid document.
    fn llm_repair(
        &self,
        template: &FilledTemplate,
        document: &SupertaskDocument,
        violations: &[crate::schema::Violation],
        difficulty: Difficulty,
        digest: &ReferenceDigest,
        llm: &Arc<dyn LlmProvider>,
    ) -> Result<SupertaskDocument> {
        let pack = self.generation_pack(template, difficulty, digest)?;
        let document_json = serde_json::to_string_pretty(document)
            .map_err(|e| Error::GenerationFailed(e.to_string()))?;
        let user = crate::prompt::fill_slots(
            &self.store.generation_prompts().repair_template,
            &[
                ("violations", render_violations(violations).as_str()),
                ("document", document_json.as_str()),
            ],
        );
        let response = llm.complete(&pack.system, &user, MAX_OUTPUT_TOKENS, TEMPERATURE)?;
        let json = extract_json(&response);
        serde_json::from_str(json).map_err(|e| {
            Error::GenerationFailed(format!("LLM repair returned unparsable JSON: {e}"))
        })
    }

    /// Composes the Stage-3 prompt pack for this template.
    fn generation_pack(
        &self,
        template: &FilledTemplate,
        difficulty: Difficulty,
        digest: &ReferenceDigest,
    ) -> Result<crate::prompt::PromptPack> {
        let rendered = template.render();
        let input = GenerationInput {
            filled_template: &rendered,
            dimension: template.frontmatter.dimension,
            target_difficulty: difficulty,
            target_audience: template.frontmatter.archetype.as_str(),
            estimated_duration: clamp_band(
                template.frontmatter.estimated_duration,
                difficulty.duration_band(),
            ),
            suggested_coins: clamp_band(template.frontmatter.coins_reward, difficulty.coin_band()),
        };
        compose_generation(
            self.store.persona(),
            self.store.generation_prompts(),
            digest,
            self.store.schema(crate::config::SCHEMA_VERSION)?,
            &input,
        )
    }

    /// Copies frontmatter to the top level, applies difficulty bands, and
    /// stamps provenance metadata.
    fn assemble(
        &self,
        template: &FilledTemplate,
        items: Vec<FlexibleItem>,
        difficulty: Difficulty,
        template_path: &Path,
    ) -> SupertaskDocument {
        let fm = &template.frontmatter;
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let base_title = strip_difficulty_tokens(fm.title.trim().trim_end_matches('-').trim_end());
        let title = format!("{}{}", base_title, difficulty.suffix(fm.language));

        let mut document = SupertaskDocument {
            title,
            dimension: fm.dimension,
            archetype: fm.archetype,
            related_to_type: fm.related_to_type,
            related_to_id: fm.related_to_id.clone(),
            estimated_duration: clamp_band(fm.estimated_duration, difficulty.duration_band()),
            coins_reward: clamp_band(fm.coins_reward, difficulty.coin_band()),
            flexible_items: items,
            metadata: DocumentMetadata {
                language: fm.language,
                region: fm.region.clone(),
                created_at: now.clone(),
                updated_at: now.clone(),
                version: DOCUMENT_VERSION.to_string(),
                generated_by: Some(format!("supertask {}", env!("CARGO_PKG_VERSION"))),
                generation_timestamp: Some(now),
                difficulty_level: Some(difficulty),
                ari_persona_applied: Some(true),
                source_template: template_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                mobile_optimization_score: None,
            },
        };
        document.metadata.mobile_optimization_score =
            Some(document.mobile_optimization_score());
        document
    }
}

fn clamp_band(value: u32, band: (u32, u32)) -> u32 {
    value.clamp(band.0, band.1)
}

/// Writes the document pretty-printed, two-space indent, UTF-8, with keys
/// in declaration order.
fn write_document(document: &SupertaskDocument, path: &Path) -> Result<()> {
    let mut json = serde_json::to_string_pretty(document)
        .map_err(|e| Error::GenerationFailed(e.to_string()))?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| Error::GenerationFailed(format!(
        "cannot write {}: {e}",
        path.display()
    )))
}

/// Pulls the JSON payload out of an LLM response that may wrap it in a
/// markdown fence or prose.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ScriptedProvider, write_reference_dir};
    use super::*;
    use crate::config::fixtures::test_store;
    use crate::template::fixtures::valid_template;

    struct Setup {
        _workspace: tempfile::TempDir,
        template_path: PathBuf,
        output: PathBuf,
        options: PipelineOptions,
    }

    fn setup(template: &crate::template::FilledTemplate) -> Setup {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let template_path = workspace.path().join("habitos_filled.md");
        std::fs::write(&template_path, template.render()).unwrap();
        let output = workspace.path().join("out");
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };
        Setup {
            _workspace: workspace,
            template_path,
            output,
            options,
        }
    }

    #[test]
    fn test_generate_single_difficulty() {
        let setup = setup(&valid_template());
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let service = GenerationService::new(Arc::new(test_store()), Arc::clone(&llm));

        let (paths, status) = service
            .generate_file(
                &setup.template_path,
                &setup.output,
                &[Difficulty::Beginner],
                &setup.options,
                &llm,
            )
            .unwrap();
        assert_eq!(status, RunStatus::Ok);
        assert_eq!(paths.len(), 1);
        assert!(
            paths[0]
                .file_name()
                .and_then(std::ffi::OsStr::to_str)
                .unwrap()
                .ends_with("habitos_beginner.json")
        );

        let written = std::fs::read_to_string(&paths[0]).unwrap();
        let document: SupertaskDocument = serde_json::from_str(&written).unwrap();
        assert!(document.title.ends_with(" - Iniciante"));
        assert_eq!(document.estimated_duration, 300);
        assert_eq!(document.coins_reward, 12);
        assert!(document.flexible_items.len() >= 3);
        // Keys must stay in declaration order, never alphabetized.
        let title_pos = written.find("\"title\"").unwrap();
        let dimension_pos = written.find("\"dimension\"").unwrap();
        assert!(title_pos < dimension_pos);
    }

    #[test]
    fn test_generate_dual_difficulty_differentiated() {
        let setup = setup(&valid_template());
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let service = GenerationService::new(Arc::new(test_store()), Arc::clone(&llm));

        let (paths, _) = service
            .generate_file(
                &setup.template_path,
                &setup.output,
                &[Difficulty::Beginner, Difficulty::Advanced],
                &setup.options,
                &llm,
            )
            .unwrap();
        assert_eq!(paths.len(), 2);

        let beginner: SupertaskDocument =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        let advanced: SupertaskDocument =
            serde_json::from_str(&std::fs::read_to_string(&paths[1]).unwrap()).unwrap();

        assert!(beginner.flexible_items.len() <= 6);
        assert!((180..=360).contains(&beginner.estimated_duration));
        assert!((360..=600).contains(&advanced.estimated_duration));
        assert!(advanced.title.ends_with(" - Avançado"));

        let distance = crate::services::content_jaccard_distance(
            &beginner.flexible_items,
            &advanced.flexible_items,
        );
        assert!(distance >= 0.7, "distance {distance} under target");
    }

    #[test]
    fn test_quiz_shortfall_triggers_llm_repair() {
        let mut template = valid_template();
        template.quizzes.truncate(1);
        let setup = setup(&template);

        let repair_response = "Question: Qual é o papel da celebração no hábito?\n\
                               Options:\n\
                               a) Fechar o circuito com emoção\n\
                               b) Aumentar a duração da sessão\n\
                               Correct Answer: a\n\
                               Explanation: A emoção imediata ensina o cérebro a querer repetir o \
                               comportamento no dia seguinte.\n";
        let scripted = Arc::new(ScriptedProvider::new(vec![Ok(repair_response.to_string())]));
        let llm: Arc<dyn LlmProvider> = scripted.clone();
        let service = GenerationService::new(Arc::new(test_store()), Arc::clone(&llm));

        let (paths, status) = service
            .generate_file(
                &setup.template_path,
                &setup.output,
                &[Difficulty::Beginner],
                &setup.options,
                &llm,
            )
            .unwrap();
        assert_eq!(status, RunStatus::Repaired);
        assert_eq!(scripted.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let document: SupertaskDocument =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert!(document.count_of("quiz") >= 2);
    }

    #[test]
    fn test_overlong_content_repaired_by_bounded_pass() {
        let mut template = valid_template();
        // A 400-char single sentence cannot be split at a boundary; the
        // bounded repair pass clips it to the exact band.
        template.content_items[0].body = format!("{}.", "palavra ".repeat(50).trim());
        let setup = setup(&template);

        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let service = GenerationService::new(Arc::new(test_store()), Arc::clone(&llm));

        let (paths, status) = service
            .generate_file(
                &setup.template_path,
                &setup.output,
                &[Difficulty::Advanced],
                &setup.options,
                &llm,
            )
            .unwrap();
        assert_eq!(status, RunStatus::Repaired);
        let document: SupertaskDocument =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        for item in &document.flexible_items {
            assert!(item.within_bands());
        }
    }

    #[test]
    fn test_failed_file_leaves_no_partial_outputs() {
        let mut template = valid_template();
        template.quizzes.clear();
        let setup = setup(&template);

        // Quiz repair responds with garbage both times it could be asked.
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            Ok("nada útil aqui".to_string()),
            Ok("nada útil aqui".to_string()),
        ]));
        let service = GenerationService::new(Arc::new(test_store()), Arc::clone(&llm));

        let err = service
            .generate_file(
                &setup.template_path,
                &setup.output,
                &[Difficulty::Beginner, Difficulty::Advanced],
                &setup.options,
                &llm,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "generation_failed");
        if setup.output.exists() {
            assert_eq!(std::fs::read_dir(&setup.output).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("Aqui está: {\"a\":1} pronto"), "{\"a\":1}");
    }
}
