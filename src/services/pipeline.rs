//! End-to-end pipeline: raw file → filled template → supertask JSON.

use std::path::Path;
use std::sync::Arc;

use super::preprocess::audited;
use super::{CancelFlag, GenerationService, PreprocessingService, collect_inputs, run_batch};
use crate::catalog::DigestCache;
use crate::config::ConfigStore;
use crate::llm::LlmProvider;
use crate::models::{Difficulty, PipelineOptions, Report, RunStatus};
use crate::Result;

/// Runs both stages per input, sharing one digest cache so the reference
/// catalogs are filtered once per batch.
pub struct PipelineService {
    preprocessing: PreprocessingService,
    generation: GenerationService,
    llm: Arc<dyn LlmProvider>,
}

impl PipelineService {
    /// Creates the pipeline from shared configuration and one provider.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, llm: Arc<dyn LlmProvider>) -> Self {
        let cache = Arc::new(DigestCache::new());
        Self {
            preprocessing: PreprocessingService::new(Arc::clone(&store), Arc::clone(&llm))
                .with_digest_cache(Arc::clone(&cache)),
            generation: GenerationService::new(store, Arc::clone(&llm))
                .with_digest_cache(cache),
            llm,
        }
    }

    /// The Stage-1 service, for callers that only preprocess.
    #[must_use]
    pub const fn preprocessing(&self) -> &PreprocessingService {
        &self.preprocessing
    }

    /// The Stage-3 service, for callers that only generate.
    #[must_use]
    pub const fn generation(&self) -> &GenerationService {
        &self.generation
    }

    /// Processes a file or directory through both stages.
    ///
    /// Filled templates and JSON documents land in `output_dir`, named
    /// `<stem>_filled.md` and `<stem>_<difficulty>.json`.
    ///
    /// # Errors
    ///
    /// Propagates only process-fatal errors; per-file failures are
    /// reported in the [`Report`].
    pub fn pipeline(
        &self,
        input_path: &Path,
        output_dir: &Path,
        difficulties: &[Difficulty],
        options: &PipelineOptions,
        cancel: Option<&CancelFlag>,
    ) -> Result<Report> {
        let inputs = collect_inputs(input_path)?;
        let llm = audited(&self.llm, options);
        let mut report = run_batch(&inputs, options, cancel, |input| {
            let (template_path, stage1_status) =
                self.preprocessing
                    .preprocess_file(input, output_dir, options, &llm)?;
            let (json_paths, stage3_status) = self.generation.generate_file(
                &template_path,
                output_dir,
                difficulties,
                options,
                &llm,
            )?;

            let mut outputs = vec![template_path.display().to_string()];
            outputs.extend(json_paths.iter().map(|p| p.display().to_string()));
            let status = if stage1_status == RunStatus::Repaired
                || stage3_status == RunStatus::Repaired
            {
                RunStatus::Repaired
            } else {
                RunStatus::Ok
            };
            Ok((outputs, status))
        })?;
        report.difficulties = difficulties.to_vec();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ScriptedProvider, write_reference_dir};
    use super::*;
    use crate::config::fixtures::test_store;
    use crate::models::SupertaskDocument;
    use crate::template::fixtures::valid_template;

    #[test]
    fn test_pipeline_end_to_end() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let input = workspace.path().join("habitos.md");
        std::fs::write(&input, "# Hábitos\n\nComece pequeno, um hábito por vez.\n").unwrap();
        let output = workspace.path().join("out");

        let llm: Arc<dyn LlmProvider> =
            Arc::new(ScriptedProvider::new(vec![Ok(valid_template().render())]));
        let service = PipelineService::new(Arc::new(test_store()), llm);
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let report = service
            .pipeline(
                &input,
                &output,
                &[Difficulty::Beginner, Difficulty::Advanced],
                &options,
                None,
            )
            .unwrap();
        assert!(report.all_ok(), "{}", report.summary());
        assert_eq!(report.records[0].outputs.len(), 3);

        let beginner: SupertaskDocument = serde_json::from_str(
            &std::fs::read_to_string(output.join("habitos_beginner.json")).unwrap(),
        )
        .unwrap();
        let advanced: SupertaskDocument = serde_json::from_str(
            &std::fs::read_to_string(output.join("habitos_advanced.json")).unwrap(),
        )
        .unwrap();
        assert!(beginner.title.ends_with(" - Iniciante"));
        assert!(advanced.title.ends_with(" - Avançado"));
    }

    #[test]
    fn test_pipeline_batch_isolates_failures() {
        let workspace = tempfile::tempdir().unwrap();
        let reference = workspace.path().join("reference");
        std::fs::create_dir(&reference).unwrap();
        write_reference_dir(&reference);
        let inputs = workspace.path().join("in");
        std::fs::create_dir(&inputs).unwrap();
        std::fs::write(inputs.join("bom.md"), "Hábito e rotina diária.\n").unwrap();
        std::fs::write(inputs.join("ruim.md"), "Texto que falha no LLM.\n").unwrap();
        let output = workspace.path().join("out");

        // Inputs run in sorted order: "bom.md" succeeds, "ruim.md" hits an
        // unavailable provider.
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
            Ok(valid_template().render()),
            Err(crate::Error::LlmUnavailable {
                attempts: 3,
                cause: "connection reset".to_string(),
            }),
        ]));
        let service = PipelineService::new(Arc::new(test_store()), llm);
        let options = PipelineOptions {
            reference_dir: Some(reference),
            ..Default::default()
        };

        let report = service
            .pipeline(&inputs, &output, &[Difficulty::Beginner], &options, None)
            .unwrap();
        assert_eq!(report.processed(), 2);
        assert_eq!(report.count(RunStatus::Ok), 1);
        assert_eq!(report.count(RunStatus::Failed), 1);
        assert_eq!(
            report.failures()[0].error_kind.as_deref(),
            Some("llm_unavailable")
        );
        // The failed input produced no JSON.
        assert!(!output.join("ruim_beginner.json").exists());
        assert!(output.join("bom_beginner.json").exists());
    }
}
