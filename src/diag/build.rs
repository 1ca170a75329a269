//! Build-output consumer.
//!
//! Wraps [`CompileOutputConsumer`] and additionally extracts percentage
//! progress from the build tool's status lines: `[ 42%]` from Makefiles
//! generators and `[12/345]` from Ninja. Progress is reported through a
//! caller-supplied sink, forward-only.

use std::sync::LazyLock;

use regex::Regex;

use crate::diag::compile::CompileOutputConsumer;

static MAKE_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\s*(\d+)%\]").expect("make progress pattern"));

static NINJA_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)/(\d+)\]").expect("ninja progress pattern"));

/// Callback receiving build progress as a 0-100 percentage.
pub type ProgressSink = Box<dyn Fn(u32) + Send>;

/// Consumer for build-stage output: compiler diagnostics plus progress.
pub struct BuildOutputConsumer {
    compile: CompileOutputConsumer,
    sink: Option<ProgressSink>,
    last_percent: Option<u32>,
}

impl BuildOutputConsumer {
    /// Wrap a compile consumer.
    pub fn new(compile: CompileOutputConsumer) -> Self {
        BuildOutputConsumer {
            compile,
            sink: None,
            last_percent: None,
        }
    }

    /// Attach a progress sink.
    pub fn with_progress(mut self, sink: impl Fn(u32) + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Feed a stdout line.
    pub fn output(&mut self, line: &str) {
        self.extract_progress(line);
        self.compile.output(line);
    }

    /// Feed a stderr line.
    pub fn error(&mut self, line: &str) {
        self.extract_progress(line);
        self.compile.error(line);
    }

    /// Access the wrapped compile consumer for diagnostic resolution.
    pub fn compile(&self) -> &CompileOutputConsumer {
        &self.compile
    }

    /// Last progress percentage observed, if any.
    pub fn percent(&self) -> Option<u32> {
        self.last_percent
    }

    fn extract_progress(&mut self, line: &str) {
        let percent = if let Some(caps) = MAKE_PROGRESS.captures(line) {
            caps[1].parse::<u32>().ok()
        } else if let Some(caps) = NINJA_PROGRESS.captures(line) {
            let current = caps[1].parse::<u64>().ok();
            let total = caps[2].parse::<u64>().ok();
            match (current, total) {
                (Some(current), Some(total)) if total > 0 => {
                    Some((current * 100 / total).min(100) as u32)
                }
                _ => None,
            }
        } else {
            None
        };

        if let Some(percent) = percent.map(|p| p.min(100)) {
            if self.last_percent.map_or(true, |last| percent > last) {
                self.last_percent = Some(percent);
                if let Some(sink) = &self.sink {
                    sink(percent);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_consumer() -> (BuildOutputConsumer, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let consumer = BuildOutputConsumer::new(CompileOutputConsumer::new())
            .with_progress(move |p| sink_seen.lock().unwrap().push(p));
        (consumer, seen)
    }

    #[test]
    fn test_make_style_progress() {
        let (mut consumer, seen) = recording_consumer();
        consumer.output("[  5%] Building C object CMakeFiles/app.dir/main.c.o");
        consumer.output("[ 50%] Building C object CMakeFiles/app.dir/util.c.o");
        consumer.output("[100%] Linking C executable app");

        assert_eq!(*seen.lock().unwrap(), vec![5, 50, 100]);
        assert_eq!(consumer.percent(), Some(100));
    }

    #[test]
    fn test_ninja_style_progress() {
        let (mut consumer, seen) = recording_consumer();
        consumer.output("[1/4] Building C object main.c.o");
        consumer.output("[2/4] Building C object util.c.o");
        consumer.output("[4/4] Linking C executable app");

        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 100]);
    }

    #[test]
    fn test_progress_is_forward_only() {
        let (mut consumer, seen) = recording_consumer();
        consumer.output("[ 60%] Building C object a.o");
        consumer.output("[ 40%] Building C object b.o");
        consumer.output("[ 60%] Building C object c.o");
        consumer.output("[ 70%] Building C object d.o");

        assert_eq!(*seen.lock().unwrap(), vec![60, 70]);
    }

    #[test]
    fn test_diagnostics_still_flow_through() {
        let (mut consumer, _) = recording_consumer();
        consumer.output("[ 50%] Building C object main.c.o");
        consumer.error("main.c:3:1: error: expected ';'");

        let resolved = consumer
            .compile()
            .resolve_diagnostics(&[std::path::PathBuf::from(".")]);
        assert_eq!(resolved.len(), 1);
    }
}
