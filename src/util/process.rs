//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{bail, Context, Result};

/// Which stream a captured line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    env_remove: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl AsRef<str>) -> Self {
        self.env_remove.push(key.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        for key in &self.env_remove {
            cmd.env_remove(key);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion, capturing output.
    pub fn exec(&self) -> Result<Output> {
        let output = self
            .build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Spawn the process with both output streams piped for line streaming.
    pub fn spawn_streaming(&self) -> Result<StreamingChild> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();

        if let Some(stdout) = stdout {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                pump_lines(stdout, OutputStream::Stdout, tx);
            }));
        }
        if let Some(stderr) = stderr {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                pump_lines(stderr, OutputStream::Stderr, tx);
            }));
        }
        drop(tx);

        Ok(StreamingChild {
            child: Arc::new(Mutex::new(Some(child))),
            rx,
            readers,
            program: self.program.clone(),
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn pump_lines(
    reader: impl std::io::Read,
    stream: OutputStream,
    tx: mpsc::Sender<(OutputStream, String)>,
) {
    let reader = BufReader::new(reader);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// A spawned process whose output is delivered line-by-line.
pub struct StreamingChild {
    child: Arc<Mutex<Option<Child>>>,
    rx: mpsc::Receiver<(OutputStream, String)>,
    readers: Vec<thread::JoinHandle<()>>,
    program: PathBuf,
}

impl StreamingChild {
    /// Get a handle that can terminate the process from another thread.
    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle {
            child: Arc::clone(&self.child),
        }
    }

    /// Drain output lines in arrival order, then reap the process.
    ///
    /// Lines from stdout and stderr are interleaved in the order they were
    /// read, matching how a terminal would have shown them.
    pub fn wait(mut self, mut on_line: impl FnMut(OutputStream, &str)) -> Result<ExitStatus> {
        for (stream, line) in self.rx.iter() {
            on_line(stream, &line);
        }

        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }

        let child = self
            .child
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();

        match child {
            Some(mut child) => child
                .wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display())),
            None => bail!("process `{}` already reaped", self.program.display()),
        }
    }
}

/// Handle for terminating a streamed process.
#[derive(Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    /// Send a kill signal to the process, if it is still running.
    pub fn kill(&self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.kill();
            }
        }
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find CMake.
pub fn find_cmake() -> Option<PathBuf> {
    find_executable("cmake")
}
