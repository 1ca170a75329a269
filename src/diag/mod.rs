//! Diagnostic model shared by all output parsers.
//!
//! Vendors report locations 1-based; the model is 0-based throughout, with
//! [`oneless`] as the single conversion point. A [`RawDiagnostic`] carries
//! the vendor-relative file string exactly as printed; resolution against
//! base directories happens in [`compile::CompileOutputConsumer`].

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub mod build;
pub mod compile;
pub mod configure;
pub mod custom;
pub mod matchers;
pub mod vendors;

pub use build::BuildOutputConsumer;
pub use compile::CompileOutputConsumer;
pub use configure::ConfigureOutputConsumer;

/// Reserved filename standing in for "no real source file".
///
/// Linker diagnostics that reference no source file carry this tag until
/// resolution materializes a report file for them.
pub const LINKER_PSEUDO_FILE: &str = "<linker>";

/// Normalized severity of a resolved diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl Severity {
    /// Map a raw vendor severity token to a normalized severity.
    ///
    /// Returns `None` for unrecognized tokens; the consumer drops such
    /// diagnostics with a warning rather than aborting resolution.
    pub fn from_token(token: &str) -> Option<Severity> {
        match token.trim().to_lowercase().as_str() {
            "warning" => Some(Severity::Warning),
            "error" | "fatal error" | "catastrophic error" => Some(Severity::Error),
            "note" | "info" | "remark" => Some(Severity::Information),
            _ => None,
        }
    }

    /// Whether a raw token marks a follow-up line that continues the
    /// previous diagnostic rather than starting a new one.
    pub fn is_followup_token(token: &str) -> bool {
        matches!(
            token.trim().to_lowercase().as_str(),
            "note" | "info" | "remark"
        )
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Information => write!(f, "info"),
        }
    }
}

/// Convert a 1-based line or column to 0-based, flooring at 0.
pub fn oneless(value: u32) -> u32 {
    value.saturating_sub(1)
}

/// A 0-based line/character position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

/// A half-open 0-based source range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// A zero-width range at the given position.
    pub fn point(line: u32, character: u32) -> Self {
        let pos = Position::new(line, character);
        Range {
            start: pos,
            end: pos,
        }
    }
}

/// A secondary location attached to a diagnostic ("required from here",
/// "note: ...").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRelated {
    /// Vendor-relative file string
    pub file: String,

    /// Location within `file`
    pub location: Range,

    /// Message text
    pub message: String,
}

/// An unresolved diagnostic as accumulated by a parser.
///
/// Immutable once emitted; owned by the parser's diagnostics list until the
/// consumer reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    /// The full matched line
    pub full: String,

    /// Vendor-relative file string (may be [`LINKER_PSEUDO_FILE`])
    pub file: String,

    /// Location within `file`
    pub location: Range,

    /// Raw severity token as printed by the tool
    pub severity: String,

    /// Message text
    pub message: String,

    /// Vendor diagnostic code (e.g. `LNK2019`, `Pe223`)
    pub code: Option<String>,

    /// Follow-up locations
    pub related: Vec<RawRelated>,
}

/// A resolved secondary location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedInformation {
    /// Resolved file path
    pub file: PathBuf,

    /// Location within `file`
    pub location: Range,

    /// Message text
    pub message: String,
}

/// A diagnostic with its file resolved against the base directories,
/// ready for presentation.
///
/// The collection produced by a resolution pass is a full snapshot: callers
/// replace any prior snapshot rather than patching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDiagnostic {
    /// Resolved file path, grouped on by the presentation layer
    pub file: PathBuf,

    /// Normalized severity
    pub severity: Severity,

    /// Location within `file`
    pub location: Range,

    /// Message text
    pub message: String,

    /// Producing parser: a vendor tag or a custom parser name
    pub source: String,

    /// Vendor diagnostic code
    pub code: Option<String>,

    /// Resolved follow-up locations
    pub related: Vec<RelatedInformation>,
}
