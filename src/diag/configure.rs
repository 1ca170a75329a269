//! Configure-stage output consumer.
//!
//! CMake's own diagnostics use a different grammar from compiler output: a
//! `CMake <Level> at <file>:<line> (<command>):` header, a two-space
//! indented message body terminated by blank-line run-length, and an
//! optional call-stack section. A small finite-state machine tracks the
//! current section; unrelated status phrases (debugger-client wait) are
//! collected on the side regardless of state.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::diag::compile::resolve_file;
use crate::diag::{
    oneless, Range, RawDiagnostic, RawRelated, RelatedInformation, ResolvedDiagnostic, Severity,
};

static DIAG_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CMake\s+(Warning|Deprecation Warning|Error)(?:\s+\(dev\))?\s+at\s+(.+?):(\d+)\s+\((.+)\):\s*$")
        .expect("diagnostic header pattern")
});

static CALL_STACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Call Stack \(most recent call first\):\s*$").expect("call stack pattern")
});

static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(.+?):(\d+)\s+\((.+)\)\s*$").expect("stack frame pattern"));

/// Lines aimed at project developers close the diagnostic body.
const DEV_WARNING_TERMINATOR: &str = "This warning is for project developers";

/// Operational states signalled by the tool, independent of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    /// The tool is blocked waiting for a debugger client to attach.
    DebuggerClientWaiting,
}

const STATUS_PHRASES: [(&str, StatusSignal); 1] = [(
    "Waiting for debugger client",
    StatusSignal::DebuggerClientWaiting,
)];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Init,
    Diag,
    Stack,
}

#[derive(Debug)]
struct PendingDiag {
    raw: Vec<String>,
    file: String,
    location: Range,
    severity: String,
    body: Vec<String>,
    related: Vec<RawRelated>,
    blank_pending: bool,
}

/// Consumer for the build tool's own configuration-stage output.
#[derive(Debug, Default)]
pub struct ConfigureOutputConsumer {
    state: State,
    pending: Option<PendingDiag>,
    diagnostics: Vec<RawDiagnostic>,
    signals: Vec<StatusSignal>,
}

impl ConfigureOutputConsumer {
    pub fn new() -> Self {
        ConfigureOutputConsumer::default()
    }

    /// Feed one line of configure output (either stream).
    pub fn handle_line(&mut self, line: &str) {
        for (phrase, signal) in STATUS_PHRASES {
            if line.contains(phrase) {
                self.signals.push(signal);
            }
        }

        match self.state {
            State::Init => self.start(line),
            State::Diag => self.continue_body(line),
            State::Stack => self.continue_stack(line),
        }
    }

    /// Commit any in-flight diagnostic once the stream has ended.
    pub fn finish(&mut self) {
        self.commit();
    }

    /// Diagnostics committed so far, in emission order.
    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        &self.diagnostics
    }

    /// Status signals observed so far, in emission order.
    pub fn signals(&self) -> &[StatusSignal] {
        &self.signals
    }

    /// Resolve committed diagnostics against the base-path priority list.
    pub fn resolve_diagnostics(&self, base_paths: &[PathBuf]) -> Vec<ResolvedDiagnostic> {
        self.diagnostics
            .iter()
            .filter_map(|diag| {
                let severity = match Severity::from_token(&diag.severity) {
                    Some(severity) => severity,
                    None => {
                        tracing::warn!(
                            "dropping diagnostic with unrecognized severity '{}': {}",
                            diag.severity,
                            diag.full
                        );
                        return None;
                    }
                };
                Some(ResolvedDiagnostic {
                    file: resolve_file(&diag.file, base_paths),
                    severity,
                    location: diag.location,
                    message: diag.message.clone(),
                    source: "cmake".to_string(),
                    code: None,
                    related: diag
                        .related
                        .iter()
                        .map(|rel| RelatedInformation {
                            file: resolve_file(&rel.file, base_paths),
                            location: rel.location,
                            message: rel.message.clone(),
                        })
                        .collect(),
                })
            })
            .collect()
    }

    fn start(&mut self, line: &str) {
        if let Some(caps) = DIAG_START.captures(line) {
            let severity = match &caps[1] {
                "Error" => "error",
                // Deprecation warnings surface as ordinary warnings.
                _ => "warning",
            };
            let line_no = caps[3].parse::<u32>().unwrap_or(1);
            self.pending = Some(PendingDiag {
                raw: vec![line.to_string()],
                file: caps[2].to_string(),
                location: Range::point(oneless(line_no), 0),
                severity: severity.to_string(),
                body: Vec::new(),
                related: Vec::new(),
                blank_pending: false,
            });
            self.state = State::Diag;
        }
    }

    fn continue_body(&mut self, line: &str) {
        if line.trim().is_empty() {
            let ends = self
                .pending
                .as_mut()
                .map(|p| {
                    let ends = p.blank_pending;
                    p.blank_pending = true;
                    ends
                })
                .unwrap_or(true);
            if ends {
                self.commit();
            }
            return;
        }

        if CALL_STACK.is_match(line) {
            if let Some(pending) = self.pending.as_mut() {
                pending.raw.push(line.to_string());
                pending.blank_pending = false;
            }
            self.state = State::Stack;
            return;
        }

        if line.contains(DEV_WARNING_TERMINATOR) {
            self.commit();
            return;
        }

        // A new header while a body is open starts the next diagnostic.
        if DIAG_START.is_match(line) {
            self.commit();
            self.start(line);
            return;
        }

        if let Some(pending) = self.pending.as_mut() {
            if pending.blank_pending {
                pending.body.push(String::new());
                pending.blank_pending = false;
            }
            pending.raw.push(line.to_string());
            let content = line.strip_prefix("  ").unwrap_or(line);
            pending.body.push(content.to_string());
        }
    }

    fn continue_stack(&mut self, line: &str) {
        if line.trim().is_empty() {
            let ends = self
                .pending
                .as_mut()
                .map(|p| {
                    let ends = p.blank_pending;
                    p.blank_pending = true;
                    ends
                })
                .unwrap_or(true);
            if ends {
                self.commit();
            }
            return;
        }

        if line.contains(DEV_WARNING_TERMINATOR) {
            self.commit();
            return;
        }

        if let Some(caps) = STACK_FRAME.captures(line) {
            if let Some(pending) = self.pending.as_mut() {
                pending.raw.push(line.to_string());
                pending.blank_pending = false;
                let line_no = caps[2].parse::<u32>().unwrap_or(1);
                pending.related.push(RawRelated {
                    file: caps[1].to_string(),
                    location: Range::point(oneless(line_no), 0),
                    message: caps[3].to_string(),
                });
            }
            return;
        }

        // Anything else closes the diagnostic and may open the next one.
        self.commit();
        self.start(line);
    }

    fn commit(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.diagnostics.push(RawDiagnostic {
                full: pending.raw.join("\n"),
                file: pending.file,
                location: pending.location,
                severity: pending.severity,
                message: pending.body.join("\n"),
                code: None,
                related: pending.related,
            });
        }
        self.state = State::Init;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(consumer: &mut ConfigureOutputConsumer, lines: &[&str]) {
        for line in lines {
            consumer.handle_line(line);
        }
    }

    #[test]
    fn test_warning_with_body() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "-- Detecting C compiler ABI info",
                "CMake Warning at CMakeLists.txt:12 (message):",
                "  Building without tests.",
                "  Pass -DWITH_TESTS=ON to enable them.",
                "",
                "",
                "-- Configuring done",
            ],
        );

        let diags = consumer.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "CMakeLists.txt");
        assert_eq!(diags[0].location.start.line, 11);
        assert_eq!(diags[0].severity, "warning");
        assert_eq!(
            diags[0].message,
            "Building without tests.\nPass -DWITH_TESTS=ON to enable them."
        );
    }

    #[test]
    fn test_single_blank_line_is_tolerated() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Error at cmake/deps.cmake:3 (find_package):",
                "  Could not find a package configuration file provided by",
                "",
                "  \"Widgets\".",
                "",
                "",
            ],
        );

        let diags = consumer.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, "error");
        assert_eq!(
            diags[0].message,
            "Could not find a package configuration file provided by\n\n\"Widgets\"."
        );
    }

    #[test]
    fn test_call_stack_becomes_related_information() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Warning at cmake/util.cmake:7 (message):",
                "  Deprecated helper in use.",
                "Call Stack (most recent call first):",
                "  cmake/module.cmake:22 (warn_deprecated)",
                "  CMakeLists.txt:5 (include)",
                "",
                "",
            ],
        );

        let diags = consumer.diagnostics();
        assert_eq!(diags.len(), 1);
        let related = &diags[0].related;
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].file, "cmake/module.cmake");
        assert_eq!(related[0].location.start.line, 21);
        assert_eq!(related[0].message, "warn_deprecated");
        assert_eq!(related[1].file, "CMakeLists.txt");
    }

    #[test]
    fn test_deprecation_warning_maps_to_warning() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Deprecation Warning at CMakeLists.txt:1 (cmake_minimum_required):",
                "  Compatibility with CMake < 3.10 will be removed.",
                "",
                "",
            ],
        );

        assert_eq!(consumer.diagnostics()[0].severity, "warning");
    }

    #[test]
    fn test_dev_warning_terminator_commits() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Warning (dev) at CMakeLists.txt:9 (target_link_libraries):",
                "  Link keywords are mixed.",
                "This warning is for project developers.  Use -Wno-dev to suppress it.",
                "CMake Warning at CMakeLists.txt:20 (message):",
                "  Second diagnostic.",
                "",
                "",
            ],
        );

        let diags = consumer.diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].message, "Link keywords are mixed.");
        assert_eq!(diags[1].message, "Second diagnostic.");
    }

    #[test]
    fn test_finish_commits_pending_diagnostic() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Error at CMakeLists.txt:2 (project):",
                "  No CMAKE_CXX_COMPILER could be found.",
            ],
        );
        assert!(consumer.diagnostics().is_empty());

        consumer.finish();
        assert_eq!(consumer.diagnostics().len(), 1);
    }

    #[test]
    fn test_status_phrase_accumulates_in_any_state() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "Waiting for debugger client to connect...",
                "CMake Warning at CMakeLists.txt:1 (message):",
                "  Waiting for debugger client again",
                "",
                "",
            ],
        );

        assert_eq!(
            consumer.signals(),
            &[
                StatusSignal::DebuggerClientWaiting,
                StatusSignal::DebuggerClientWaiting
            ]
        );
    }

    #[test]
    fn test_resolution_uses_cmake_source() {
        let mut consumer = ConfigureOutputConsumer::new();
        feed(
            &mut consumer,
            &[
                "CMake Error at CMakeLists.txt:4 (add_subdirectory):",
                "  The source directory does not exist.",
                "",
                "",
            ],
        );

        let resolved = consumer.resolve_diagnostics(&[PathBuf::from(".")]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].source, "cmake");
        assert_eq!(resolved[0].severity, Severity::Error);
        assert_eq!(resolved[0].file, PathBuf::from("./CMakeLists.txt"));
    }
}
