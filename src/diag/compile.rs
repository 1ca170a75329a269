//! Compile-output fan-out and diagnostic resolution.
//!
//! Every line of tool output, stdout and stderr alike, is offered to the
//! built-in vendor parsers in a fixed priority order; the first parser
//! that consumes a line owns it. User-supplied custom parsers are tried
//! only when no vendor grammar matched. Resolution is a terminal read:
//! raw diagnostics from enabled sources are resolved against a prioritized
//! base-directory list into a full [`ResolvedDiagnostic`] snapshot.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};

use crate::diag::custom::CustomParser;
use crate::diag::matchers::LineOutcome;
use crate::diag::vendors::{Vendor, VendorParser};
use crate::diag::{
    Range, RawDiagnostic, RelatedInformation, ResolvedDiagnostic, Severity, LINKER_PSEUDO_FILE,
};
use crate::util::config::ProjectSettings;
use crate::util::fs::write_string;

/// Name of the synthesized report file for file-less linker diagnostics.
pub const LINKER_REPORT_FILE: &str = "linkerrors.txt";

/// Header lines preceding the first report entry (5-line banner + blank).
const LINKER_REPORT_HEADER_LINES: u32 = 6;

/// Fans tool output across the diagnostic parsers and resolves the result.
///
/// One consumer instance corresponds to one configure/build invocation;
/// parser state is never reused across runs.
pub struct CompileOutputConsumer {
    vendors: Vec<VendorParser>,
    custom: Vec<CustomParser>,
    enabled: HashSet<Vendor>,
}

impl CompileOutputConsumer {
    /// Create a consumer with every built-in vendor enabled and no custom
    /// parsers.
    pub fn new() -> Self {
        CompileOutputConsumer {
            vendors: Vendor::ALL.iter().map(|v| VendorParser::new(*v)).collect(),
            custom: Vec::new(),
            enabled: Vendor::ALL.iter().copied().collect(),
        }
    }

    /// Create a consumer configured from project settings: enabled vendor
    /// set plus custom matchers. Unknown vendor names are warned about and
    /// skipped.
    pub fn from_settings(settings: &ProjectSettings) -> Self {
        let enabled: HashSet<Vendor> = match &settings.enabled_output_parsers {
            Some(names) => names
                .iter()
                .filter_map(|name| match name.parse::<Vendor>() {
                    Ok(vendor) => Some(vendor),
                    Err(e) => {
                        tracing::warn!("{}", e);
                        None
                    }
                })
                .collect(),
            None => Vendor::ALL.iter().copied().collect(),
        };

        CompileOutputConsumer {
            vendors: Vendor::ALL.iter().map(|v| VendorParser::new(*v)).collect(),
            custom: CustomParser::from_config(&settings.custom_diagnostics),
            enabled,
        }
    }

    /// Feed a stdout line. Compiler front-ends write diagnostics to either
    /// stream, so both feeds share one handler.
    pub fn output(&mut self, line: &str) {
        self.error(line);
    }

    /// Feed a stderr line.
    pub fn error(&mut self, line: &str) {
        for parser in &mut self.vendors {
            if parser.handle_line(line) == LineOutcome::Consumed {
                return;
            }
        }
        for parser in &mut self.custom {
            if parser.handle_line(line) == LineOutcome::Consumed {
                return;
            }
        }
    }

    /// Resolve all accumulated diagnostics from enabled sources against the
    /// base-directory priority list.
    ///
    /// File-less linker diagnostics are first materialized into a report
    /// file inside the first base path so every diagnostic ends up with an
    /// on-disk location; failure to write that file is logged and the
    /// affected ranges are simply left unrewritten. The output is a full
    /// snapshot in source-then-emission order; calling this twice on
    /// unchanged parser state yields identical snapshots.
    pub fn resolve_diagnostics(&self, base_paths: &[PathBuf]) -> Vec<ResolvedDiagnostic> {
        let report = self.prepare_linker_report(base_paths);
        let mut pseudo_index: u32 = 0;
        let mut resolved = Vec::new();

        for parser in self.enabled_vendors() {
            let source = parser.vendor().as_str();
            for diag in parser.diagnostics() {
                resolved.extend(self.resolve_one(
                    diag,
                    source,
                    base_paths,
                    report.as_ref(),
                    &mut pseudo_index,
                ));
            }
        }
        for parser in &self.custom {
            for diag in parser.diagnostics() {
                resolved.extend(self.resolve_one(
                    diag,
                    parser.name(),
                    base_paths,
                    report.as_ref(),
                    &mut pseudo_index,
                ));
            }
        }

        resolved
    }

    fn enabled_vendors(&self) -> impl Iterator<Item = &VendorParser> {
        self.vendors
            .iter()
            .filter(|p| self.enabled.contains(&p.vendor()))
    }

    fn resolve_one(
        &self,
        diag: &RawDiagnostic,
        source: &str,
        base_paths: &[PathBuf],
        report: Option<&LinkerReport>,
        pseudo_index: &mut u32,
    ) -> Option<ResolvedDiagnostic> {
        let (file, location) = if diag.file == LINKER_PSEUDO_FILE {
            // Entry numbering must match the written report even when a
            // later diagnostic gets dropped for its severity.
            let entry = *pseudo_index;
            *pseudo_index += 1;
            match report {
                Some(report) if report.written => (
                    report.path.clone(),
                    Range::point(LINKER_REPORT_HEADER_LINES + 3 * entry, 0),
                ),
                Some(report) => (report.path.clone(), diag.location),
                None => (PathBuf::from(&diag.file), diag.location),
            }
        } else {
            (resolve_file(&diag.file, base_paths), diag.location)
        };

        let Some(severity) = Severity::from_token(&diag.severity) else {
            tracing::warn!(
                "dropping diagnostic with unrecognized severity '{}': {}",
                diag.severity,
                diag.full
            );
            return None;
        };

        let related = diag
            .related
            .iter()
            .map(|rel| RelatedInformation {
                file: resolve_file(&rel.file, base_paths),
                location: rel.location,
                message: rel.message.clone(),
            })
            .collect();

        Some(ResolvedDiagnostic {
            file,
            severity,
            location,
            message: diag.message.clone(),
            source: source.to_string(),
            code: diag.code.clone(),
            related,
        })
    }

    /// Write the linker report when at least one file-less diagnostic is
    /// pending. Returns `None` when there is nothing to report or nowhere
    /// to put it.
    fn prepare_linker_report(&self, base_paths: &[PathBuf]) -> Option<LinkerReport> {
        let entries: Vec<(&str, &RawDiagnostic)> = self
            .enabled_vendors()
            .flat_map(|p| {
                p.diagnostics()
                    .iter()
                    .map(move |d| (p.vendor().as_str(), d))
            })
            .chain(
                self.custom
                    .iter()
                    .flat_map(|p| p.diagnostics().iter().map(move |d| (p.name(), d))),
            )
            .filter(|(_, d)| d.file == LINKER_PSEUDO_FILE)
            .collect();

        if entries.is_empty() {
            return None;
        }
        let base = base_paths.first()?;
        let path = base.join(LINKER_REPORT_FILE);

        match write_linker_report(&path, &entries) {
            Ok(()) => Some(LinkerReport {
                path,
                written: true,
            }),
            Err(e) => {
                tracing::warn!("failed to write {}: {}", path.display(), e);
                Some(LinkerReport {
                    path,
                    written: false,
                })
            }
        }
    }
}

impl Default for CompileOutputConsumer {
    fn default() -> Self {
        Self::new()
    }
}

struct LinkerReport {
    path: PathBuf,
    written: bool,
}

/// Deterministic layout: a 5-line banner (rule, title, timestamp, count,
/// rule) and a blank line, then three lines per entry in encounter order:
/// `[code] (source)`, the message, a blank. Overwritten on every
/// resolution pass.
fn write_linker_report(path: &Path, entries: &[(&str, &RawDiagnostic)]) -> Result<()> {
    let rule = "=".repeat(72);
    let mut lines = vec![
        rule.clone(),
        "Linker diagnostics without a backing source file".to_string(),
        format!(
            "Generated: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        format!("Entries: {}", entries.len()),
        rule,
        String::new(),
    ];

    for (source, diag) in entries {
        let code = diag.code.as_deref().unwrap_or(&diag.severity);
        lines.push(format!("[{}] ({})", code, source));
        lines.push(diag.message.clone());
        lines.push(String::new());
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    write_string(path, &contents)
}

/// Resolve a vendor-relative file string against the base-path priority
/// list: the first base where the candidate exists wins, otherwise the
/// first base is used unconditionally. Absolute paths pass through.
pub(crate) fn resolve_file(file: &str, base_paths: &[PathBuf]) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    for base in base_paths {
        let candidate = base.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    match base_paths.first() {
        Some(base) => base.join(path),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::CustomPatternConfig;
    use tempfile::TempDir;

    fn settings_with_custom(pattern: &str) -> ProjectSettings {
        ProjectSettings {
            custom_diagnostics: vec![CustomPatternConfig {
                name: Some("lint".to_string()),
                pattern: Some(pattern.to_string()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_gcc_example_resolution() {
        let mut consumer = CompileOutputConsumer::new();
        consumer.error("main.cpp:10:5: error: 'x' was not declared in this scope");

        let resolved = consumer.resolve_diagnostics(&[PathBuf::from(".")]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].file, PathBuf::from("./main.cpp"));
        assert_eq!(resolved[0].severity, Severity::Error);
        assert_eq!(resolved[0].location.start.line, 9);
        assert_eq!(resolved[0].location.start.character, 4);
        assert_eq!(resolved[0].source, "gcc");
    }

    #[test]
    fn test_stdout_and_stderr_share_one_handler() {
        let mut consumer = CompileOutputConsumer::new();
        consumer.output("a.c:1:1: error: via stdout");
        consumer.error("a.c:2:1: error: via stderr");

        let resolved = consumer.resolve_diagnostics(&[PathBuf::from(".")]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_custom_parser_only_sees_unconsumed_lines() {
        let mut consumer = CompileOutputConsumer::from_settings(&settings_with_custom(
            r"^(?P<file>.+?)\|(?P<line>\d+)\|(?P<message>.+)$",
        ));
        consumer.error("app.c|3|flagged by lint");
        consumer.error("app.c:4:1: warning: vendor line");

        let resolved = consumer.resolve_diagnostics(&[PathBuf::from(".")]);
        let sources: Vec<_> = resolved.iter().map(|d| d.source.as_str()).collect();
        // Vendor diagnostics come first in the snapshot.
        assert_eq!(sources, vec!["gcc", "lint"]);
    }

    #[test]
    fn test_disabled_vendor_is_excluded_from_resolution() {
        let settings = ProjectSettings {
            enabled_output_parsers: Some(vec!["msvc".to_string()]),
            ..Default::default()
        };
        let mut consumer = CompileOutputConsumer::from_settings(&settings);
        consumer.error("a.c:1:1: error: gcc-style, vendor disabled");

        assert!(consumer.resolve_diagnostics(&[PathBuf::from(".")]).is_empty());
    }

    #[test]
    fn test_unknown_severity_is_dropped_not_fatal() {
        let settings = settings_with_custom(
            r"^(?P<file>\S+):(?P<line>\d+):(?P<severity>\w+):(?P<message>.+)$",
        );
        let mut consumer = CompileOutputConsumer::from_settings(&settings);
        consumer.error("a.c:1:oddity:strange severity token");
        consumer.error("a.c:2:warning:fine");

        let resolved = consumer.resolve_diagnostics(&[PathBuf::from(".")]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].severity, Severity::Warning);
    }

    #[test]
    fn test_first_existing_base_path_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(second.path().join("main.c"), "int main;").unwrap();

        let mut consumer = CompileOutputConsumer::new();
        consumer.error("main.c:1:1: error: something");

        let bases = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let resolved = consumer.resolve_diagnostics(&bases);
        assert_eq!(resolved[0].file, second.path().join("main.c"));
    }

    #[test]
    fn test_nonexistent_file_falls_back_to_first_base() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let mut consumer = CompileOutputConsumer::new();
        consumer.error("ghost.c:1:1: error: nowhere on disk");

        let bases = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let resolved = consumer.resolve_diagnostics(&bases);
        assert_eq!(resolved[0].file, first.path().join("ghost.c"));
    }

    #[test]
    fn test_linker_report_layout_and_ranges() {
        let tmp = TempDir::new().unwrap();
        let mut consumer = CompileOutputConsumer::new();
        consumer.error("foo.obj : error LNK2019: unresolved external symbol _start");
        consumer.error("LINK : fatal error LNK1120: 1 unresolved externals");

        let resolved = consumer.resolve_diagnostics(&[tmp.path().to_path_buf()]);
        let report_path = tmp.path().join(LINKER_REPORT_FILE);
        let contents = std::fs::read_to_string(&report_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        // 5-line banner + blank + 3 lines per entry
        assert_eq!(lines.len(), 6 + 3 * 2);
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "[LNK2019] (msvc)");
        assert_eq!(lines[7], "unresolved external symbol _start");
        assert_eq!(lines[9], "[LNK1120] (msvc)");

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].file, report_path);
        assert_eq!(resolved[0].location.start.line, 6);
        assert_eq!(resolved[1].location.start.line, 9);
    }

    #[test]
    fn test_no_report_without_pseudo_diagnostics() {
        let tmp = TempDir::new().unwrap();
        let mut consumer = CompileOutputConsumer::new();
        consumer.error("main.c:1:1: error: plain compiler error");

        consumer.resolve_diagnostics(&[tmp.path().to_path_buf()]);
        assert!(!tmp.path().join(LINKER_REPORT_FILE).exists());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut consumer = CompileOutputConsumer::new();
        consumer.error("main.c:3:7: warning: shadowed declaration");
        consumer.error("foo.obj : error LNK2019: unresolved external symbol _start");

        let bases = vec![tmp.path().to_path_buf()];
        let first = consumer.resolve_diagnostics(&bases);
        let second = consumer.resolve_diagnostics(&bases);
        assert_eq!(first, second);
    }

    #[test]
    fn test_related_locations_are_resolved() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("decl.h"), "").unwrap();

        let mut consumer = CompileOutputConsumer::new();
        consumer.error("main.c:9:2: error: conflicting types for 'run'");
        consumer.error("decl.h:4:1: note: previous declaration here");

        let resolved = consumer.resolve_diagnostics(&[tmp.path().to_path_buf()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].related.len(), 1);
        assert_eq!(resolved[0].related[0].file, tmp.path().join("decl.h"));
    }
}
