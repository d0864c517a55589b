//! CLI command surface.
//!
//! Three commands map 1:1 to the orchestrator operations: `preprocess`
//! (Stage 1), `generate` (Stage 3), and `pipeline` (both). Exit codes:
//! 0 all ok, 1 any per-file failure, 2 configuration invalid, 3
//! environment missing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::llm::{HttpCompletionClient, LlmConnection, LlmProvider};
use crate::models::{Difficulty, PipelineOptions, ProgressEvent, Report};
use crate::observability::{LogFormat, init_logging};
use crate::services::{CancelFlag, PipelineService};
use crate::Error;

/// Exit code: every input succeeded.
pub const EXIT_OK: u8 = 0;
/// Exit code: at least one input failed.
pub const EXIT_FAILURES: u8 = 1;
/// Exit code: configuration or reference data invalid.
pub const EXIT_CONFIG_INVALID: u8 = 2;
/// Exit code: LLM endpoint or credentials missing.
pub const EXIT_ENV_MISSING: u8 = 3;

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "supertask",
    version,
    about = "Turns raw educational content into mobile-optimized supertask JSON"
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: String,

    /// Configuration directory (persona, prompts, schema).
    #[arg(long, global = true, env = "SUPERTASK_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Arguments shared by every run.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input file or directory.
    pub input: PathBuf,

    /// Output directory.
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Reference catalog directory.
    #[arg(long, env = "SUPERTASK_REFERENCE_DIR")]
    pub reference_dir: Option<PathBuf>,

    /// Append prompt/response pairs to the audit sink.
    #[arg(long, env = "SUPERTASK_AUDIT_ENABLED")]
    pub audit: bool,

    /// Audit sink path (JSON lines).
    #[arg(long, requires = "audit")]
    pub audit_path: Option<PathBuf>,

    /// Parallel preprocessing workers.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..))]
    pub workers: u8,
}

/// Difficulty selection.
#[derive(Debug, Args)]
pub struct DifficultyArgs {
    /// Difficulties to emit: beginner, advanced, or both.
    #[arg(long, default_value = "both")]
    pub difficulties: String,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stage 1: raw files into filled templates.
    Preprocess {
        /// Shared run arguments.
        #[command(flatten)]
        run: RunArgs,
    },
    /// Stage 3: filled templates into supertask JSON.
    Generate {
        /// Shared run arguments.
        #[command(flatten)]
        run: RunArgs,
        /// Difficulty selection.
        #[command(flatten)]
        difficulty: DifficultyArgs,
    },
    /// Both stages: raw files into supertask JSON.
    Pipeline {
        /// Shared run arguments.
        #[command(flatten)]
        run: RunArgs,
        /// Difficulty selection.
        #[command(flatten)]
        difficulty: DifficultyArgs,
    },
}

/// Runs the CLI and returns the process exit code.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn run(cli: Cli, cancel: &CancelFlag) -> u8 {
    init_logging(
        cli.verbose,
        LogFormat::parse(&cli.log_format).unwrap_or_default(),
    );

    let store = match load_store(cli.config_dir.as_deref()) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("configuration error: {err}");
            return EXIT_CONFIG_INVALID;
        },
    };

    let Some(connection) = LlmConnection::resolve(Some(&store.settings().llm)) else {
        eprintln!(
            "no LLM endpoint configured; set {} (and {} if required)",
            crate::llm::ENDPOINT_ENV,
            crate::llm::API_KEY_ENV
        );
        return EXIT_ENV_MISSING;
    };
    let llm: Arc<dyn LlmProvider> = Arc::new(HttpCompletionClient::new(connection));
    let service = PipelineService::new(store, llm);

    let outcome = match &cli.command {
        Command::Preprocess { run } => service.preprocessing().preprocess(
            &run.input,
            &run.output_dir,
            &options_from(run),
            Some(cancel),
        ),
        Command::Generate { run, difficulty } => {
            match parse_difficulties(&difficulty.difficulties) {
                Ok(difficulties) => service.generation().generate(
                    &run.input,
                    &run.output_dir,
                    &difficulties,
                    &options_from(run),
                    Some(cancel),
                ),
                Err(message) => {
                    eprintln!("{message}");
                    return EXIT_CONFIG_INVALID;
                },
            }
        },
        Command::Pipeline { run, difficulty } => {
            match parse_difficulties(&difficulty.difficulties) {
                Ok(difficulties) => service.pipeline(
                    &run.input,
                    &run.output_dir,
                    &difficulties,
                    &options_from(run),
                    Some(cancel),
                ),
                Err(message) => {
                    eprintln!("{message}");
                    return EXIT_CONFIG_INVALID;
                },
            }
        },
    };

    match outcome {
        Ok(report) => {
            print_report(&report);
            if report.all_ok() {
                EXIT_OK
            } else {
                EXIT_FAILURES
            }
        },
        Err(err) => {
            eprintln!("{err}");
            match err {
                Error::ConfigInvalid { .. } | Error::ReferenceDataMissing(_) => {
                    EXIT_CONFIG_INVALID
                },
                _ => EXIT_FAILURES,
            }
        },
    }
}

fn load_store(config_dir: Option<&std::path::Path>) -> crate::Result<ConfigStore> {
    config_dir.map_or_else(ConfigStore::load_default, ConfigStore::load)
}

fn options_from(run: &RunArgs) -> PipelineOptions {
    PipelineOptions {
        enable_prompt_audit: run.audit,
        audit_path: run.audit_path.clone(),
        reference_dir: run.reference_dir.clone(),
        progress_sink: Some(Arc::new(|event: &ProgressEvent| match event {
            ProgressEvent::Started { input } => tracing::info!(input = %input, "started"),
            ProgressEvent::Finished { input, status } => {
                tracing::info!(input = %input, status = status.as_str(), "finished");
            },
            ProgressEvent::Failed { input, kind } => {
                tracing::warn!(input = %input, kind = %kind, "failed");
            },
        })),
        parallel_workers: usize::from(run.workers),
    }
}

/// Parses the `--difficulties` value.
///
/// # Errors
///
/// Returns a usage message for unknown values.
pub fn parse_difficulties(value: &str) -> std::result::Result<Vec<Difficulty>, String> {
    if value.trim().eq_ignore_ascii_case("both") {
        return Ok(vec![Difficulty::Beginner, Difficulty::Advanced]);
    }
    let mut difficulties = Vec::new();
    for part in value.split(',') {
        let Some(difficulty) = Difficulty::parse(part) else {
            return Err(format!(
                "unknown difficulty '{part}'; expected beginner, advanced, or both"
            ));
        };
        if !difficulties.contains(&difficulty) {
            difficulties.push(difficulty);
        }
    }
    if difficulties.is_empty() {
        return Err("no difficulty selected".to_string());
    }
    Ok(difficulties)
}

#[allow(clippy::print_stdout)]
fn print_report(report: &Report) {
    println!("{}", report.summary());
    for failure in report.failures() {
        println!(
            "  failed: {} [{}] {}",
            failure.input,
            failure.error_kind.as_deref().unwrap_or("unknown"),
            failure.error_detail.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_difficulties() {
        assert_eq!(
            parse_difficulties("both").unwrap(),
            vec![Difficulty::Beginner, Difficulty::Advanced]
        );
        assert_eq!(
            parse_difficulties("beginner").unwrap(),
            vec![Difficulty::Beginner]
        );
        assert_eq!(
            parse_difficulties("advanced,beginner").unwrap(),
            vec![Difficulty::Advanced, Difficulty::Beginner]
        );
        assert!(parse_difficulties("expert").is_err());
    }

    #[test]
    fn test_pipeline_command_args() {
        let cli = Cli::parse_from([
            "supertask",
            "pipeline",
            "content/",
            "--output-dir",
            "out/",
            "--difficulties",
            "beginner",
            "--workers",
            "4",
        ]);
        match cli.command {
            Command::Pipeline { run, difficulty } => {
                assert_eq!(run.workers, 4);
                assert_eq!(difficulty.difficulties, "beginner");
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
