//! GNU linker diagnostic grammar.
//!
//! Linker output varies by platform and does not reliably carry a severity
//! keyword or even a source file, so the grammar is an ordered fallback of
//! five shapes, from fully-located lines down to a bare
//! `severity: message`. File-less shapes take the linker pseudo-file;
//! shapes without a severity keyword default to `error`.

use std::sync::LazyLock;

use crate::diag::matchers::{first_match, CaptureMap, DiagPattern, DiagnosticBag, LineOutcome};
use crate::diag::RawDiagnostic;

static PATTERNS: LazyLock<Vec<DiagPattern>> = LazyLock::new(|| {
    vec![
        // file:line:col: severity: message
        DiagPattern::new(
            r"^(.+?):(\d+):(\d+):\s+(error|warning|note):\s+(.+)$",
            CaptureMap::standard(),
        ),
        // file:line: severity: message
        DiagPattern::new(
            r"^(.+?):(\d+):\s+(error|warning|note):\s+(.+)$",
            CaptureMap {
                file: Some(1),
                line: Some(2),
                column: None,
                severity: Some(3),
                code: None,
                message: 4,
                default_severity: None,
            },
        ),
        // file:line: message  (classic "undefined reference" shape). The
        // file token must be colon- and space-free so MSVC linker lines
        // ("foo.obj : error LNK2019: ...") are left for the MSVC grammar.
        DiagPattern::new(
            r"^([^:\s]+):(\d+):\s+(.+[^:])$",
            CaptureMap {
                file: Some(1),
                line: Some(2),
                column: None,
                severity: None,
                code: None,
                message: 3,
                default_severity: Some("error"),
            },
        ),
        // ld/collect2 prefix with severity, no source file
        DiagPattern::new(
            r"^(?:[^:]*(?:\bld|collect2)(?:\.exe)?):\s+(error|warning|note):\s+(.+)$",
            CaptureMap {
                file: None,
                line: None,
                column: None,
                severity: Some(1),
                code: None,
                message: 2,
                default_severity: None,
            },
        ),
        // bare severity: message
        DiagPattern::new(
            r"^(error|warning|note):\s+(.+)$",
            CaptureMap {
                file: None,
                line: None,
                column: None,
                severity: Some(1),
                code: None,
                message: 2,
                default_severity: None,
            },
        ),
    ]
});

/// GNU linker output parser.
#[derive(Debug, Default)]
pub struct Parser {
    bag: DiagnosticBag,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        match first_match(&PATTERNS, line) {
            Some(diag) => {
                self.bag.accept(diag);
                LineOutcome::Consumed
            }
            None => LineOutcome::NotMine,
        }
    }

    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        self.bag.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::LINKER_PSEUDO_FILE;

    #[test]
    fn test_undefined_reference_defaults_to_error() {
        let mut parser = Parser::new();
        let outcome = parser.handle_line("main.c:12: undefined reference to `helper'");

        assert_eq!(outcome, LineOutcome::Consumed);
        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, "main.c");
        assert_eq!(diag.location.start.line, 11);
        assert_eq!(diag.severity, "error");
        assert_eq!(diag.message, "undefined reference to `helper'");
    }

    #[test]
    fn test_located_severity_line() {
        let mut parser = Parser::new();
        parser.handle_line("crt0.s:44:2: warning: section .boot is deprecated");

        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.severity, "warning");
        assert_eq!(diag.location.start.character, 1);
    }

    #[test]
    fn test_ld_prefix_takes_pseudo_file() {
        let mut parser = Parser::new();
        parser.handle_line("/usr/bin/ld: error: duplicate symbol: init");
        parser.handle_line("collect2: error: ld returned 1 exit status");

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.file == LINKER_PSEUDO_FILE));
    }

    #[test]
    fn test_bare_severity_line() {
        let mut parser = Parser::new();
        parser.handle_line("error: cannot find -lwidgets");

        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, LINKER_PSEUDO_FILE);
        assert_eq!(diag.message, "cannot find -lwidgets");
    }

    #[test]
    fn test_trailing_colon_context_line_is_not_mine() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.handle_line("/usr/bin/ld: main.o: in function `main':"),
            LineOutcome::NotMine
        );
        assert!(parser.diagnostics().is_empty());
    }
}
