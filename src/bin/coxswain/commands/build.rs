//! `coxswain build` command

use std::path::PathBuf;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::BuildArgs;
use crate::commands::{load_project, print_diagnostics, summarize_diagnostics};
use coxswain::SessionManager;

pub fn execute(project: Option<PathBuf>, args: BuildArgs) -> Result<()> {
    let config = load_project(project)?;
    let manager = SessionManager::from_config(config);

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}%")
            .unwrap()
            .progress_chars("#>-"),
    );
    let progress_bar = bar.clone();
    manager.set_progress_callback(move |percent| progress_bar.set_position(percent as u64));

    let code = manager.build(&args.targets)?;
    bar.finish_and_clear();

    let diagnostics = manager.build_diagnostics();
    print_diagnostics(&diagnostics);
    if !diagnostics.is_empty() {
        eprintln!("{}", summarize_diagnostics(&diagnostics));
    }

    if code != 0 {
        bail!("build failed with exit code {}", code);
    }
    Ok(())
}
