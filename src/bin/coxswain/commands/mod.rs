//! Command implementations

use std::path::PathBuf;

use anyhow::{Context, Result};

use coxswain::util::config::{project_config_path, ProjectConfig};
use coxswain::{ResolvedDiagnostic, Severity};

pub mod build;
pub mod completions;
pub mod configure;
pub mod diagnose;
pub mod doctor;
pub mod targets;

/// Load the project configuration rooted at `--project` or the current
/// directory, defaulting the source directory to the project root.
pub fn load_project(project: Option<PathBuf>) -> Result<ProjectConfig> {
    let root = match project {
        Some(root) => root,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };

    let mut config = ProjectConfig::load_or_default(&project_config_path(&root));
    if config.settings.source_dir.is_none() {
        config.settings.source_dir = Some(root);
    }
    Ok(config)
}

/// Print diagnostics in a compiler-like `severity: file:line:col: message`
/// shape (1-based for human eyes).
pub fn print_diagnostics(diagnostics: &[ResolvedDiagnostic]) {
    for diag in diagnostics {
        eprintln!(
            "{}: {}:{}:{}: {} [{}]",
            diag.severity,
            diag.file.display(),
            diag.location.start.line + 1,
            diag.location.start.character + 1,
            diag.message.lines().next().unwrap_or_default(),
            diag.source,
        );
        for rel in &diag.related {
            eprintln!(
                "    note: {}:{}: {}",
                rel.file.display(),
                rel.location.start.line + 1,
                rel.message,
            );
        }
    }
}

/// One-line summary of a diagnostics snapshot.
pub fn summarize_diagnostics(diagnostics: &[ResolvedDiagnostic]) -> String {
    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    format!("{} error(s), {} warning(s)", errors, warnings)
}
