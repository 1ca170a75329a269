//! IAR Embedded Workbench diagnostic grammar.

use std::sync::LazyLock;

use crate::diag::matchers::{first_match, CaptureMap, DiagPattern, DiagnosticBag, LineOutcome};
use crate::diag::RawDiagnostic;

static PATTERNS: LazyLock<Vec<DiagPattern>> = LazyLock::new(|| {
    vec![
        // "file",N  Severity[Code]: message
        DiagPattern::new(
            r#"^"(.+)",(\d+)\s+([A-Za-z]+(?:\s[a-z]+)?)\[(\w+)\]:\s*(.+)$"#,
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
    ]
});

/// IAR output parser.
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

    #[test]
    fn test_warning_with_code() {
        let mut parser = Parser::new();
        let outcome = parser.handle_line(
            r#""C:\proj\adc.c",144  Warning[Pe223]: function "init_adc" declared implicitly"#,
        );

        assert_eq!(outcome, LineOutcome::Consumed);
        let diag = &parser.diagnostics()[0];
        assert_eq!(diag.file, r"C:\proj\adc.c");
        assert_eq!(diag.location.start.line, 143);
        assert_eq!(diag.severity, "Warning");
        assert_eq!(diag.code.as_deref(), Some("Pe223"));
    }

    #[test]
    fn test_fatal_error_severity_token() {
        let mut parser = Parser::new();
        parser.handle_line(r#""main.c",1  Fatal error[Pe1696]: cannot open source file"#);

        assert_eq!(parser.diagnostics()[0].severity, "Fatal error");
    }

    #[test]
    fn test_remark_folds_into_previous() {
        let mut parser = Parser::new();
        parser.handle_line(r#""adc.c",10  Error[Pe020]: identifier "foo" is undefined"#);
        parser.handle_line(r#""adc.c",2  Remark[Pe826]: declared here"#);

        let diags = parser.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].related.len(), 1);
        assert_eq!(diags[0].related[0].file, "adc.c");
    }

    #[test]
    fn test_foreign_line() {
        let mut parser = Parser::new();
        assert_eq!(
            parser.handle_line("adc.c:10: error: not IAR output"),
            LineOutcome::NotMine
        );
    }
}
