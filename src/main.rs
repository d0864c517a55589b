//! Binary entry point for the supertask pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to the console by design.
#![allow(clippy::print_stderr)]

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use supertask::cli::{self, Cli};

/// Main entry point.
///
/// Installs the Ctrl-C handler that cancels the batch between files; an
/// in-flight LLM call always completes or times out first.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("cancellation requested; finishing the current file");
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        eprintln!("cannot install Ctrl-C handler: {e}");
    }

    ExitCode::from(cli::run(cli, &cancel))
}
