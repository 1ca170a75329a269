//! MSVC compiler and linker diagnostic grammars.
//!
//! Two independent grammars appear on the same stream: compiler
//! diagnostics (`file(line,col): severity CODE: message`) and linker
//! diagnostics (`[N>] [file :] severity LNKnnnn: message`), tried in that
//! order. Both may carry an MSBuild project-number prefix (`1>`). A linker
//! match whose file token is missing, is the literal `LINK`, or names a
//! build artifact rather than a source file takes the linker pseudo-file.

use std::sync::LazyLock;

use regex::Regex;

use crate::diag::matchers::{first_match, CaptureMap, DiagPattern, DiagnosticBag, LineOutcome};
use crate::diag::{Range, RawDiagnostic, LINKER_PSEUDO_FILE};

static COMPILER_PATTERNS: LazyLock<Vec<DiagPattern>> = LazyLock::new(|| {
    vec![DiagPattern::new(
        r"^\s*(?:\d+>)?\s*([^>\s].*?)\((\d+)(?:,(\d+))?\)\s*:\s+((?:fatal\s+)?error|warning|info|note)\s+([A-Z]{1,3}\d{2,5})\s*:\s*(.+)$",
        CaptureMap {
            file: Some(1),
            line: Some(2),
            column: Some(3),
            severity: Some(4),
            code: Some(5),
            message: 6,
            default_severity: None,
        },
    )]
});

static LINKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\s*\d+>)?\s*(?:(.+?)\s*:\s+)?((?:fatal\s+)?error|warning)\s+(LNK\d+)\s*:\s*(.+)$",
    )
    .expect("linker pattern")
});

/// Artifact extensions that do not count as a real source file.
const ARTIFACT_EXTENSIONS: [&str; 4] = [".obj", ".lib", ".dll", ".exe"];

fn is_real_source(file: &str) -> bool {
    if file.eq_ignore_ascii_case("LINK") {
        return false;
    }
    let lower = file.to_lowercase();
    !ARTIFACT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// MSVC output parser.
#[derive(Debug, Default)]
pub struct Parser {
    bag: DiagnosticBag,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        if let Some(diag) = first_match(&COMPILER_PATTERNS, line) {
            self.bag.accept(diag);
            return LineOutcome::Consumed;
        }

        if let Some(caps) = LINKER.captures(line) {
            let file = match caps.get(1).map(|m| m.as_str().trim()) {
                Some(f) if is_real_source(f) => f.to_string(),
                _ => LINKER_PSEUDO_FILE.to_string(),
            };

            self.bag.accept(RawDiagnostic {
                full: line.to_string(),
                file,
                location: Range::point(0, 0),
                severity: caps[2].to_string(),
                message: caps[4].trim().to_string(),
                code: Some(caps[3].to_string()),
                related: Vec::new(),
            });
            return LineOutcome::Consumed;
        }

        LineOutcome::NotMine
    }

    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        self.bag.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_diagnostic() {
        let mut parser = Parser::new();
        let outcome = parser
            .handle_line(r"C:\src\main.cpp(10,5): error C2065: 'x': undeclared identifier");

        assert_eq!(outcome, LineOutcome::Consumed);
        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, r"C:\src\main.cpp");
        assert_eq!(diag.location.start.line, 9);
        assert_eq!(diag.location.start.character, 4);
        assert_eq!(diag.severity, "error");
        assert_eq!(diag.code.as_deref(), Some("C2065"));
    }

    #[test]
    fn test_compiler_diagnostic_without_column() {
        let mut parser = Parser::new();
        parser.handle_line(r"util.c(88): warning C4244: conversion from 'double' to 'int'");

        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.location.start.line, 87);
        assert_eq!(diag.location.start.character, 0);
        assert_eq!(diag.severity, "warning");
    }

    #[test]
    fn test_project_prefix_is_stripped() {
        let mut parser = Parser::new();
        parser.handle_line(r"2>C:\src\app.cpp(3,1): error C1004: unexpected end of file");

        assert_eq!(parser.diagnostics()[0].file, r"C:\src\app.cpp");
    }

    #[test]
    fn test_linker_artifact_takes_pseudo_file() {
        let mut parser = Parser::new();
        parser.handle_line("foo.obj : error LNK2019: unresolved external symbol");

        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, LINKER_PSEUDO_FILE);
        assert_eq!(diag.severity, "error");
        assert_eq!(diag.code.as_deref(), Some("LNK2019"));
        assert_eq!(diag.message, "unresolved external symbol");
    }

    #[test]
    fn test_linker_link_tag_takes_pseudo_file() {
        let mut parser = Parser::new();
        parser.handle_line("LINK : fatal error LNK1120: 1 unresolved externals");

        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, LINKER_PSEUDO_FILE);
        assert_eq!(diag.severity, "fatal error");
    }

    #[test]
    fn test_linker_without_file_token() {
        let mut parser = Parser::new();
        parser.handle_line("error LNK1104: cannot open file 'widgets.lib'");

        assert_eq!(parser.diagnostics()[0].file, LINKER_PSEUDO_FILE);
    }

    #[test]
    fn test_foreign_line_is_not_mine() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.handle_line("main.cpp:10:5: error: gcc-style line"),
            LineOutcome::NotMine
        );
    }
}
