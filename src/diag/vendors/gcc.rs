//! GCC/Clang diagnostic grammar.
//!
//! Beyond the single-line `file:line:col: severity: message` shape, GCC
//! prints template-instantiation context *before* the diagnostic it
//! annotates: an "In instantiation of" line opens a backtrace, "required
//! from" lines extend it, and the next ordinary diagnostic absorbs the
//! accumulated frames as related locations.

use std::sync::LazyLock;

use regex::Regex;

use crate::diag::matchers::{first_match, CaptureMap, DiagPattern, DiagnosticBag, LineOutcome};
use crate::diag::{oneless, Range, RawDiagnostic, RawRelated, Severity};

static PATTERNS: LazyLock<Vec<DiagPattern>> = LazyLock::new(|| {
    vec![DiagPattern::new(
        r"^(.+?):(\d+):(\d+):\s+((?:fatal\s+)?[a-z]+):\s+(.+)$",
        CaptureMap::standard(),
    )]
});

static INSTANTIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(?:\d+:\d+:)?\s+In instantiation of\b.*$").expect("instantiation pattern")
});

static REQUIRED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(\d+):\s+(required (?:from|by).*)$").expect("required-from pattern")
});

/// GCC/Clang output parser.
#[derive(Debug, Default)]
pub struct Parser {
    bag: DiagnosticBag,
    backtrace: Vec<RawRelated>,
    in_instantiation: bool,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        if INSTANTIATION.is_match(line) {
            self.in_instantiation = true;
            return LineOutcome::Consumed;
        }

        if self.in_instantiation {
            if let Some(caps) = REQUIRED_FROM.captures(line) {
                let line_no = caps[2].parse::<u32>().unwrap_or(1);
                let column = caps[3].parse::<u32>().unwrap_or(1);
                self.backtrace.push(RawRelated {
                    file: caps[1].to_string(),
                    location: Range::point(oneless(line_no), oneless(column)),
                    message: caps[4].trim().to_string(),
                });
                return LineOutcome::Consumed;
            }
        }

        if let Some(mut diag) = first_match(&PATTERNS, line) {
            if !Severity::is_followup_token(&diag.severity) {
                diag.related.append(&mut self.backtrace);
                self.in_instantiation = false;
            }
            self.bag.accept(diag);
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

    fn feed(parser: &mut Parser, lines: &[&str]) -> Vec<LineOutcome> {
        lines.iter().map(|l| parser.handle_line(l)).collect()
    }

    #[test]
    fn test_simple_error() {
        let mut parser = Parser::new();
        let outcome =
            parser.handle_line("main.cpp:10:5: error: 'x' was not declared in this scope");

        assert_eq!(outcome, LineOutcome::Consumed);
        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "main.cpp");
        assert_eq!(diags[0].severity, "error");
        assert_eq!(diags[0].location.start.line, 9);
        assert_eq!(diags[0].location.start.character, 4);
    }

    #[test]
    fn test_fatal_error_severity() {
        let mut parser = Parser::new();
        parser.handle_line("main.c:1:10: fatal error: missing.h: No such file or directory");

        assert_eq!(parser.diagnostics()[0].severity, "fatal error");
    }

    #[test]
    fn test_unmatched_line_leaves_state_alone() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.handle_line("[ 50%] Building CXX object foo.o"),
            LineOutcome::NotMine
        );
        assert_eq!(
            parser.handle_line("-- Configuring done"),
            LineOutcome::NotMine
        );
        assert!(parser.diagnostics().is_empty());
    }

    #[test]
    fn test_note_folds_into_previous() {
        let mut parser = Parser::new();
        feed(
            &mut parser,
            &[
                "widget.cpp:42:13: warning: unused variable 'n' [-Wunused-variable]",
                "widget.cpp:40:9: note: declared here",
            ],
        );

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].related.len(), 1);
        assert_eq!(diags[0].related[0].message, "declared here");
    }

    #[test]
    fn test_instantiation_backtrace_attaches_to_next_diagnostic() {
        let mut parser = Parser::new();
        let outcomes = feed(
            &mut parser,
            &[
                "vec.hpp: In instantiation of 'void grow(T&) [with T = Vec<int>]':",
                "main.cpp:12:7:   required from here",
                "vec.hpp:33:18: error: no matching function for call to 'resize'",
            ],
        );

        assert!(outcomes.iter().all(|o| *o == LineOutcome::Consumed));
        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, "error");
        assert_eq!(diags[0].related.len(), 1);
        assert_eq!(diags[0].related[0].file, "main.cpp");
        assert_eq!(diags[0].related[0].location.start.line, 11);
        assert_eq!(diags[0].related[0].message, "required from here");

        // Backtrace is cleared once absorbed
        parser.handle_line("vec.hpp:40:3: error: another error");
        assert!(parser.diagnostics()[1].related.is_empty());
    }

    #[test]
    fn test_required_from_without_instantiation_is_not_mine() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.handle_line("main.cpp:12:7:   required from here"),
            LineOutcome::NotMine
        );
    }
}
