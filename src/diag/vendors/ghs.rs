//! Green Hills compiler diagnostic grammar.
//!
//! GHS diagnostics span several lines and cannot be matched by a single
//! expression: a source excerpt ends with a caret marker line, a coded
//! header follows (`"file", line N: severity #code: message`), and the
//! message continues on indented lines. The first flush-left line ends the
//! diagnostic and is re-evaluated as the potential start of the next one.

use std::sync::LazyLock;

use regex::Regex;

use crate::diag::matchers::{DiagnosticBag, LineOutcome};
use crate::diag::{oneless, Range, RawDiagnostic};

static CARET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\^\s*$").expect("caret pattern"));

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(.+)",\s+line\s+(\d+):\s+((?:fatal\s+)?[a-z]+)\s+#([\w.-]+):\s*(.*)$"#)
        .expect("header pattern")
});

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the caret marker that closes a source excerpt.
    #[default]
    Scan,
    /// Caret seen; the next line should be the coded header.
    AwaitHeader,
    /// Header seen; indented lines extend the message.
    Message,
}

/// Green Hills output parser.
#[derive(Debug, Default)]
pub struct Parser {
    bag: DiagnosticBag,
    state: State,
    pending: Option<RawDiagnostic>,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        match self.state {
            State::Scan => self.scan(line),
            State::AwaitHeader => {
                if let Some(caps) = HEADER.captures(line) {
                    let line_no = caps[2].parse::<u32>().unwrap_or(1);
                    self.pending = Some(RawDiagnostic {
                        full: line.to_string(),
                        file: caps[1].to_string(),
                        location: Range::point(oneless(line_no), 0),
                        severity: caps[3].to_string(),
                        message: caps[5].trim().to_string(),
                        code: Some(caps[4].to_string()),
                        related: Vec::new(),
                    });
                    self.state = State::Message;
                    LineOutcome::Consumed
                } else {
                    // Not the expected header; fall back to scanning this line.
                    self.state = State::Scan;
                    self.scan(line)
                }
            }
            State::Message => {
                let continues = line.starts_with(char::is_whitespace) && !line.trim().is_empty();
                if continues {
                    if let Some(pending) = self.pending.as_mut() {
                        if !pending.message.is_empty() {
                            pending.message.push(' ');
                        }
                        pending.message.push_str(line.trim());
                    }
                    LineOutcome::Consumed
                } else {
                    // A flush-left line both terminates the diagnostic and
                    // starts the next evaluation.
                    self.commit();
                    self.scan(line)
                }
            }
        }
    }

    fn scan(&mut self, line: &str) -> LineOutcome {
        if CARET.is_match(line) {
            self.state = State::AwaitHeader;
            LineOutcome::Consumed
        } else {
            LineOutcome::NotMine
        }
    }

    fn commit(&mut self) {
        if let Some(diag) = self.pending.take() {
            self.bag.accept(diag);
        }
        self.state = State::Scan;
    }

    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        self.bag.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_stage_diagnostic() {
        let mut parser = Parser::new();
        let lines = [
            "      val = count;",
            "            ^",
            "\"driver.c\", line 87: warning #68-D: integer conversion resulted",
            "          in a change of sign",
            "",
        ];
        let outcomes: Vec<_> = lines.iter().map(|l| parser.handle_line(l)).collect();

        // Source excerpt is indented, so the machine treats it as foreign
        // until the caret arrives.
        assert_eq!(outcomes[0], LineOutcome::NotMine);
        assert_eq!(outcomes[1], LineOutcome::Consumed);
        assert_eq!(outcomes[2], LineOutcome::Consumed);
        assert_eq!(outcomes[3], LineOutcome::Consumed);
        assert_eq!(outcomes[4], LineOutcome::NotMine);

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "driver.c");
        assert_eq!(diags[0].location.start.line, 86);
        assert_eq!(diags[0].severity, "warning");
        assert_eq!(diags[0].code.as_deref(), Some("68-D"));
        assert_eq!(
            diags[0].message,
            "integer conversion resulted in a change of sign"
        );
    }

    #[test]
    fn test_terminating_line_is_reevaluated_as_next_caret() {
        let mut parser = Parser::new();
        for line in [
            "    ^",
            "\"a.c\", line 3: error #100: first",
            "^", // terminates and immediately opens the next diagnostic
            "\"a.c\", line 9: error #200: second",
            "done",
        ] {
            parser.handle_line(line);
        }

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].message, "first");
        assert_eq!(diags[1].code.as_deref(), Some("200"));
    }

    #[test]
    fn test_header_miss_resets_to_scan() {
        let mut parser = Parser::new();
        parser.handle_line("   ^");
        assert_eq!(
            parser.handle_line("not a header at all"),
            LineOutcome::NotMine
        );
        assert!(parser.diagnostics().is_empty());
    }

    #[test]
    fn test_remark_folds_into_previous() {
        let mut parser = Parser::new();
        for line in [
            "  ^",
            "\"a.c\", line 3: error #100: broken call",
            "",
            "  ^",
            "\"a.c\", line 1: remark #300: declared here",
            "eof",
        ] {
            parser.handle_line(line);
        }

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].related.len(), 1);
        assert_eq!(diags[0].related[0].message, "declared here");
    }
}
