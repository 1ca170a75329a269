//! Shared CMake invocation for the concrete drivers.
//!
//! Argument assembly, line-order output streaming and cooperative
//! cancellation are identical across communication modes; drivers differ
//! in what they do around the invocation (query files, target discovery),
//! not in how the process is driven.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer};
use crate::driver::{ConfigureRequest, ProgressEvent};
use crate::util::fs::ensure_dir;
use crate::util::process::{ProcessBuilder, ProcessHandle};

/// Configure phase markers with their position on the progress scale.
const PHASE_MARKS: [(&str, u32); 2] = [("-- Configuring done", 2), ("-- Generating done", 3)];

/// Final position on the configure progress scale.
const PHASE_MAX: u32 = 4;

/// Drives cmake processes for one session.
pub struct CMakeInvoker {
    cmake: PathBuf,
    source_dir: PathBuf,
    binary_dir: PathBuf,
    current: Mutex<Option<ProcessHandle>>,
}

impl CMakeInvoker {
    pub fn new(cmake: PathBuf, source_dir: PathBuf, binary_dir: PathBuf) -> Self {
        CMakeInvoker {
            cmake,
            source_dir,
            binary_dir,
            current: Mutex::new(None),
        }
    }

    pub fn cmake_path(&self) -> &Path {
        &self.cmake
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn binary_dir(&self) -> &Path {
        &self.binary_dir
    }

    /// Arguments for a configure invocation.
    pub fn configure_args(&self, request: &ConfigureRequest) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            self.source_dir.display().to_string(),
            "-B".to_string(),
            self.binary_dir.display().to_string(),
        ];

        // Cache replay re-runs from the existing cache, so generator and
        // definitions must not be repeated.
        if !request.cache_only {
            if let Some(generator) = &request.generator {
                args.push("-G".to_string());
                args.push(generator.clone());
            }
            for (name, value) in &request.cache_variables {
                args.push(format!("-D{}={}", name, value));
            }
            args.extend(request.extra_args.iter().cloned());
        }

        args
    }

    /// The full configure command line, for display.
    pub fn configure_command(&self, request: &ConfigureRequest) -> String {
        ProcessBuilder::new(&self.cmake)
            .args(self.configure_args(request))
            .display_command()
    }

    /// Run a configure pass, streaming every line into the consumer and
    /// reporting phase progress.
    pub fn run_configure(
        &self,
        request: &ConfigureRequest,
        consumer: &mut ConfigureOutputConsumer,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<i32> {
        ensure_dir(&self.binary_dir)?;

        let builder = ProcessBuilder::new(&self.cmake).args(self.configure_args(request));

        progress(ProgressEvent::new(0, 0, PHASE_MAX));
        let code = self.run(builder, |line| {
            for (mark, position) in PHASE_MARKS {
                if line.contains(mark) {
                    progress(ProgressEvent::new(position, 0, PHASE_MAX));
                }
            }
            consumer.handle_line(line);
        })?;
        consumer.finish();

        if code == 0 {
            progress(ProgressEvent::new(PHASE_MAX, 0, PHASE_MAX));
        }
        Ok(code)
    }

    /// Run a build pass, streaming every line into the consumer.
    pub fn run_build(
        &self,
        targets: &[String],
        extra_args: &[String],
        consumer: &mut BuildOutputConsumer,
    ) -> Result<i32> {
        let mut builder = ProcessBuilder::new(&self.cmake)
            .arg("--build")
            .arg(&self.binary_dir);

        if !targets.is_empty() {
            builder = builder.arg("--target").args(targets);
        }
        builder = builder.args(extra_args);

        self.run(builder, |line| consumer.output(line))
    }

    /// Terminate the in-flight process, if any.
    pub fn stop(&self) {
        let handle = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handle) = handle {
            handle.kill();
        }
    }

    fn run(&self, builder: ProcessBuilder, mut on_line: impl FnMut(&str)) -> Result<i32> {
        tracing::debug!("running `{}`", builder.display_command());

        let child = builder.spawn_streaming()?;
        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(child.handle());

        let status = child.wait(|_, line| on_line(line));

        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        // A signal-terminated process has no exit code; report the
        // conventional interrupted status instead of the -1 sentinel.
        Ok(status?.code().unwrap_or(130))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn invoker() -> CMakeInvoker {
        CMakeInvoker::new(
            PathBuf::from("cmake"),
            PathBuf::from("/proj"),
            PathBuf::from("/proj/build"),
        )
    }

    #[test]
    fn test_configure_args_full() {
        let mut cache_variables = BTreeMap::new();
        cache_variables.insert("CMAKE_BUILD_TYPE".to_string(), "Debug".to_string());
        let request = ConfigureRequest {
            generator: Some("Ninja".to_string()),
            cache_variables,
            extra_args: vec!["--fresh".to_string()],
            cache_only: false,
        };

        let args = invoker().configure_args(&request);
        assert_eq!(
            args,
            vec![
                "-S",
                "/proj",
                "-B",
                "/proj/build",
                "-G",
                "Ninja",
                "-DCMAKE_BUILD_TYPE=Debug",
                "--fresh",
            ]
        );
    }

    #[test]
    fn test_cache_only_suppresses_settings() {
        let mut cache_variables = BTreeMap::new();
        cache_variables.insert("CMAKE_BUILD_TYPE".to_string(), "Debug".to_string());
        let request = ConfigureRequest {
            generator: Some("Ninja".to_string()),
            cache_variables,
            extra_args: vec!["--fresh".to_string()],
            cache_only: true,
        };

        let args = invoker().configure_args(&request);
        assert_eq!(args, vec!["-S", "/proj", "-B", "/proj/build"]);
    }

    #[test]
    fn test_configure_command_display() {
        let request = ConfigureRequest::default();
        assert_eq!(
            invoker().configure_command(&request),
            "cmake -S /proj -B /proj/build"
        );
    }
}
