//! Wind River Diab compiler diagnostic grammar.

use std::sync::LazyLock;

use crate::diag::matchers::{first_match, CaptureMap, DiagPattern, DiagnosticBag, LineOutcome};
use crate::diag::RawDiagnostic;

static PATTERNS: LazyLock<Vec<DiagPattern>> = LazyLock::new(|| {
    vec![
        // "file", line N: severity (dcc:NNNN): message
        DiagPattern::new(
            r#"^"(.+)",\s+line\s+(\d+):\s+((?:fatal\s+)?[a-z]+(?:\s[a-z]+)?)\s+\((dcc:\d+)\):\s*(.+)$"#,
            CaptureMap {
                file: Some(1),
                line: Some(2),
                column: None,
                severity: Some(3),
                code: Some(4),
                message: 5,
                default_severity: None,
            },
        ),
        // driver-level failures carry no source location
        DiagPattern::new(
            r"^(catastrophic error):\s+(.+)$",
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

/// Diab output parser.
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
