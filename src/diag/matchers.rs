//! Ordered pattern tables for line-oriented diagnostic grammars.
//!
//! Each vendor grammar is a list of [`DiagPattern`]s tried in order; the
//! first pattern that matches a line wins and later patterns are not
//! consulted. A pattern pairs a regular expression with a [`CaptureMap`]
//! describing which capture group carries which diagnostic field.

use regex::Regex;

use crate::diag::{oneless, Range, RawDiagnostic, RawRelated, Severity, LINKER_PSEUDO_FILE};

/// Outcome of feeding one line to a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line belonged to this parser's grammar.
    Consumed,
    /// The line is not this parser's to interpret.
    NotMine,
}

/// Which capture group carries which diagnostic field.
///
/// A `None` file group marks a file-less shape; such diagnostics take the
/// linker pseudo-file so the resolution shim covers them uniformly.
#[derive(Debug, Clone, Copy)]
pub struct CaptureMap {
    pub file: Option<usize>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub severity: Option<usize>,
    pub code: Option<usize>,
    pub message: usize,
    /// Severity used when the severity group is absent or did not match
    pub default_severity: Option<&'static str>,
}

impl CaptureMap {
    /// The common `file, line, column, severity, message` layout.
    pub fn standard() -> Self {
        CaptureMap {
            file: Some(1),
            line: Some(2),
            column: Some(3),
            severity: Some(4),
            code: None,
            message: 5,
            default_severity: None,
        }
    }
}

/// A compiled grammar pattern with its field mapping.
#[derive(Debug)]
pub struct DiagPattern {
    regex: Regex,
    map: CaptureMap,
}

impl DiagPattern {
    /// Compile a built-in pattern. Panics on a malformed expression, which
    /// is a programming error in a static table.
    pub fn new(pattern: &str, map: CaptureMap) -> Self {
        DiagPattern {
            regex: Regex::new(pattern).expect("built-in diagnostic pattern must compile"),
            map,
        }
    }

    /// Apply this pattern to a line, producing a diagnostic on match.
    pub fn apply(&self, line: &str) -> Option<RawDiagnostic> {
        let caps = self.regex.captures(line)?;

        let group = |idx: Option<usize>| {
            idx.and_then(|i| caps.get(i)).map(|m| m.as_str().to_string())
        };
        let number = |idx: Option<usize>| {
            idx.and_then(|i| caps.get(i))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };

        let severity = group(self.map.severity)
            .or_else(|| self.map.default_severity.map(str::to_string))?;

        let file = group(self.map.file).unwrap_or_else(|| LINKER_PSEUDO_FILE.to_string());
        let line_no = number(self.map.line).unwrap_or(1);
        let column = number(self.map.column).unwrap_or(1);
        let message = caps
            .get(self.map.message)
            .map(|m| m.as_str().trim().to_string())?;

        Some(RawDiagnostic {
            full: line.to_string(),
            file,
            location: Range::point(oneless(line_no), oneless(column)),
            severity,
            message,
            code: group(self.map.code),
            related: Vec::new(),
        })
    }
}

/// Try an ordered pattern list; the first match wins.
pub fn first_match(patterns: &[DiagPattern], line: &str) -> Option<RawDiagnostic> {
    patterns.iter().find_map(|p| p.apply(line))
}

/// Accumulator for completed diagnostics with follow-up folding.
///
/// A diagnostic whose severity is a follow-up token (`note`, `info`,
/// `remark`) is folded into the previous diagnostic's `related` list when
/// one exists, modeling compiler notes that continue a just-emitted
/// diagnostic.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    completed: Vec<RawDiagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    /// Accept a completed diagnostic, folding follow-ups into the previous
    /// diagnostic when possible.
    pub fn accept(&mut self, diag: RawDiagnostic) {
        if Severity::is_followup_token(&diag.severity) {
            if let Some(prev) = self.completed.last_mut() {
                prev.related.push(RawRelated {
                    file: diag.file,
                    location: diag.location,
                    message: diag.message,
                });
                return;
            }
        }
        self.completed.push(diag);
    }

    /// All completed diagnostics in emission order.
    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        &self.completed
    }
}
