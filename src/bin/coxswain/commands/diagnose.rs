//! `coxswain diagnose` command
//!
//! Runs a saved tool log through the diagnostic pipeline without touching
//! CMake, which makes parser behavior inspectable (and scriptable) in
//! isolation.

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::DiagnoseArgs;
use crate::commands::{load_project, print_diagnostics, summarize_diagnostics};
use coxswain::util::fs::read_to_string;
use coxswain::{CompileOutputConsumer, ConfigureOutputConsumer, ResolvedDiagnostic};

pub fn execute(project: Option<PathBuf>, args: DiagnoseArgs) -> Result<()> {
    let config = load_project(project)?;
    let text = read_to_string(&args.log)?;

    let base_paths = if args.base_paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.base_paths.clone()
    };

    let diagnostics = if args.configure {
        parse_configure_log(&text, &base_paths)
    } else {
        let mut settings = config.settings.clone();
        if !args.parsers.is_empty() {
            settings.enabled_output_parsers = Some(args.parsers.clone());
        }
        let mut consumer = CompileOutputConsumer::from_settings(&settings);
        for line in text.lines() {
            consumer.error(line);
        }
        consumer.resolve_diagnostics(&base_paths)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        return Ok(());
    }

    print_diagnostics(&diagnostics);
    println!("{}", summarize_diagnostics(&diagnostics));
    Ok(())
}

fn parse_configure_log(text: &str, base_paths: &[PathBuf]) -> Vec<ResolvedDiagnostic> {
    let mut consumer = ConfigureOutputConsumer::new();
    for line in text.lines() {
        consumer.handle_line(line);
    }
    consumer.finish();
    consumer.resolve_diagnostics(base_paths)
}
