//! User-pattern-driven diagnostic parser.
//!
//! Callers can register `{name, pattern}` pairs to recognize output from
//! tools no built-in vendor grammar covers. Patterns use named capture
//! groups: `file`, `line`, `column`, `severity` and `message`; `file` and
//! `message` are required for a line to produce a diagnostic, the rest
//! default sensibly.

use regex::Regex;

use crate::diag::matchers::{DiagnosticBag, LineOutcome};
use crate::diag::{oneless, Range, RawDiagnostic};
use crate::util::config::CustomPatternConfig;

/// A parser built from one user-supplied matcher.
#[derive(Debug)]
pub struct CustomParser {
    name: String,
    regex: Regex,
    bag: DiagnosticBag,
}

impl CustomParser {
    /// Build parsers from configuration entries, skipping invalid ones.
    ///
    /// An entry with a missing name, a missing pattern, or a pattern that
    /// fails to compile is dropped; user configuration must never poison
    /// the whole parser set.
    pub fn from_config(entries: &[CustomPatternConfig]) -> Vec<CustomParser> {
        entries
            .iter()
            .filter_map(|entry| {
                let name = entry.name.as_deref().filter(|n| !n.is_empty())?;
                let pattern = entry.pattern.as_deref().filter(|p| !p.is_empty())?;
                match Regex::new(pattern) {
                    Ok(regex) => Some(CustomParser {
                        name: name.to_string(),
                        regex,
                        bag: DiagnosticBag::new(),
                    }),
                    Err(e) => {
                        tracing::debug!("skipping custom matcher '{}': {}", name, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// The name reported as the diagnostic source.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        let Some(caps) = self.regex.captures(line) else {
            return LineOutcome::NotMine;
        };

        let Some(file) = caps.name("file").map(|m| m.as_str().to_string()) else {
            return LineOutcome::NotMine;
        };
        let Some(message) = caps.name("message").map(|m| m.as_str().trim().to_string()) else {
            return LineOutcome::NotMine;
        };

        let number = |group: &str| {
            caps.name(group)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(1)
        };
        let severity = caps
            .name("severity")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "error".to_string());

        self.bag.accept(RawDiagnostic {
            full: line.to_string(),
            file,
            location: Range::point(oneless(number("line")), oneless(number("column"))),
            severity,
            message,
            code: None,
            related: Vec::new(),
        });
        LineOutcome::Consumed
    }

    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        self.bag.diagnostics()
    }
}
