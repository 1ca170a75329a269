//! Session lifecycle management.
//!
//! At most one live [`Driver`] exists per manager. All lifecycle
//! transitions run through a single-flight critical section: concurrent
//! callers either observe the in-progress creation's result or the already
//! live driver, never a duplicate construction, and teardown is never
//! raced against a fresh creation. Configuration changes (kit, preset,
//! generator, communication mode) tear the session down; the next
//! `get_driver` lazily recreates it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use miette::Diagnostic;
use thiserror::Error;

use crate::diag::compile::CompileOutputConsumer;
use crate::diag::configure::StatusSignal;
use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer, ResolvedDiagnostic};
use crate::driver::capabilities::{
    minimum_supported_version, negotiate, parse_mode_setting, probe, CommunicationMode,
};
use crate::driver::file_api::FileApiDriver;
use crate::driver::legacy::LegacyDriver;
use crate::driver::server_api::ServerApiDriver;
use crate::driver::{BuildTarget, ConfigureRequest, Driver, ProgressEvent};
use crate::util::config::{ConfigurePreset, Kit, ProjectConfig, ProjectSettings};
use crate::util::fs::{copy_file, remove_dir_all_if_exists, remove_file_if_exists};
use crate::util::hash::Fingerprint;
use crate::util::process::{find_cmake, find_executable};

/// Kind of configure pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureType {
    /// Full configure with generator, definitions and extra arguments
    Normal,
    /// Delete the cache and re-configure from scratch
    Clean,
    /// Fast-path replay of cached settings, without progress reporting
    Cache,
    /// Only report the command line that would run
    ShowCommandOnly,
}

/// Classified session-construction failures.
///
/// Everything except [`SessionError::Other`] has a guided remediation and
/// is reported rather than propagated; unknown failures must reach the
/// caller.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("no kit is selected")]
    #[diagnostic(
        code(coxswain::session::no_kit),
        help("Select a kit in .coxswain/config.toml before configuring")
    )]
    NoKitSelected,

    #[error("no configure preset is selected")]
    #[diagnostic(
        code(coxswain::session::no_preset),
        help("Select a configure preset or disable `use_presets`")
    )]
    NoPresetSelected,

    #[error("cmake executable not found")]
    #[diagnostic(
        code(coxswain::session::cmake_not_found),
        help("Install CMake or set `cmake_path` in .coxswain/config.toml")
    )]
    CMakeNotFound,

    #[error("build directory was configured for a different source tree (cached: {cached})")]
    #[diagnostic(
        code(coxswain::session::mismatched_source),
        help("Run `coxswain configure --clean` to re-initialize the build directory")
    )]
    MismatchedSourceDirectory { cached: String },

    #[error("no usable generator found")]
    #[diagnostic(
        code(coxswain::session::no_generator),
        help("Install ninja or make, or set a generator in the kit, preset or settings")
    )]
    NoUsableGenerator,

    #[error(transparent)]
    #[diagnostic(code(coxswain::session::unknown))]
    Other(#[from] anyhow::Error),
}

impl SessionError {
    /// Whether this failure has a guided remediation path.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Other(_))
    }
}

/// Rebases raw `(current, minimum, maximum)` events to a 0-100 scale and
/// reports only forward increments.
pub struct ProgressRebaser {
    last: AtomicI64,
}

impl ProgressRebaser {
    pub fn new() -> Self {
        ProgressRebaser {
            last: AtomicI64::new(-1),
        }
    }

    /// Rebase an event; `None` when it would not move the bar forward.
    pub fn rebase(&self, event: ProgressEvent) -> Option<u32> {
        let span = event.maximum.checked_sub(event.minimum)?;
        if span == 0 {
            return None;
        }
        let offset = event.current.checked_sub(event.minimum)?;
        let percent = ((offset as u64 * 100) / span as u64).min(100) as u32;

        let previous = self.last.fetch_max(percent as i64, Ordering::SeqCst);
        (percent as i64 > previous).then_some(percent)
    }
}

impl Default for ProgressRebaser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
enum SessionState {
    #[default]
    NoDriver,
    Creating,
    Live(Arc<dyn Driver>),
}

/// Configuration inputs that shape a session.
#[derive(Debug, Clone, Default)]
struct Inputs {
    settings: ProjectSettings,
    kit: Option<Kit>,
    preset: Option<ConfigurePreset>,
}

type ProgressCallback = Arc<dyn Fn(u32) + Send + Sync>;
type ConfigureHook = Box<dyn Fn(&Path) + Send + Sync>;

/// Owns the single live driver and serializes access to it.
pub struct SessionManager {
    inputs: Mutex<Inputs>,
    state: Mutex<SessionState>,
    state_changed: Condvar,
    build_gate: Mutex<()>,
    driver_fingerprint: Mutex<Option<String>>,
    progress: Mutex<Option<ProgressCallback>>,
    configure_hooks: Mutex<Vec<ConfigureHook>>,
    configure_diagnostics: Mutex<Vec<ResolvedDiagnostic>>,
    build_diagnostics: Mutex<Vec<ResolvedDiagnostic>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionManager {
    /// Create a manager from bare settings, with no kit or preset selected.
    pub fn new(settings: ProjectSettings) -> Self {
        Self::with_inputs(Inputs {
            settings,
            kit: None,
            preset: None,
        })
    }

    /// Create a manager from a loaded project configuration.
    pub fn from_config(config: ProjectConfig) -> Self {
        Self::with_inputs(Inputs {
            settings: config.settings,
            kit: config.kit,
            preset: config.preset,
        })
    }

    fn with_inputs(inputs: Inputs) -> Self {
        SessionManager {
            inputs: Mutex::new(inputs),
            state: Mutex::new(SessionState::NoDriver),
            state_changed: Condvar::new(),
            build_gate: Mutex::new(()),
            driver_fingerprint: Mutex::new(None),
            progress: Mutex::new(None),
            configure_hooks: Mutex::new(Vec::new()),
            configure_diagnostics: Mutex::new(Vec::new()),
            build_diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Register a 0-100 progress callback shared by configure and build.
    pub fn set_progress_callback(&self, callback: impl Fn(u32) + Send + Sync + 'static) {
        *lock(&self.progress) = Some(Arc::new(callback));
    }

    /// Register a hook run with the binary directory after every
    /// successful configure (test rediscovery and the like).
    pub fn on_configure_success(&self, hook: impl Fn(&Path) + Send + Sync + 'static) {
        lock(&self.configure_hooks).push(Box::new(hook));
    }

    /// Diagnostics snapshot from the most recent configure pass.
    pub fn configure_diagnostics(&self) -> Vec<ResolvedDiagnostic> {
        lock(&self.configure_diagnostics).clone()
    }

    /// Diagnostics snapshot from the most recent build pass.
    pub fn build_diagnostics(&self) -> Vec<ResolvedDiagnostic> {
        lock(&self.build_diagnostics).clone()
    }

    /// Select a kit. A change tears the live session down.
    pub fn set_kit(&self, kit: Kit) {
        self.update_inputs(|inputs| inputs.kit = Some(kit));
    }

    /// Select a configure preset. A change tears the live session down.
    pub fn set_preset(&self, preset: ConfigurePreset) {
        self.update_inputs(|inputs| inputs.preset = Some(preset));
    }

    /// Override the generator. A change tears the live session down.
    pub fn set_generator(&self, generator: Option<String>) {
        self.update_inputs(|inputs| inputs.settings.generator = generator);
    }

    /// Override the communication mode. A change tears the live session
    /// down.
    pub fn set_communication_mode(&self, mode: Option<String>) {
        self.update_inputs(|inputs| inputs.settings.communication_mode = mode);
    }

    /// Replace the whole settings block. A change tears the live session
    /// down.
    pub fn update_settings(&self, settings: ProjectSettings) {
        self.update_inputs(|inputs| inputs.settings = settings);
    }

    fn update_inputs(&self, apply: impl FnOnce(&mut Inputs)) {
        let changed = {
            let mut inputs = lock(&self.inputs);
            apply(&mut inputs);
            let current = inputs_fingerprint(&inputs);
            let live = lock(&self.driver_fingerprint).clone();
            live.map(|fp| fp != current).unwrap_or(false)
        };

        if changed {
            tracing::info!("session inputs changed, disposing the live driver");
            self.teardown();
        }
    }

    /// Tear down the live driver, if any. The next `get_driver` call
    /// recreates the session lazily; nothing is recreated eagerly.
    pub fn teardown(&self) {
        let driver = {
            let mut state = lock(&self.state);
            loop {
                match &*state {
                    SessionState::Creating => {
                        state = self
                            .state_changed
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    SessionState::NoDriver => return,
                    SessionState::Live(_) => break,
                }
            }
            // Hold the Creating slot while the driver shuts down so no
            // fresh creation races the disposal.
            match std::mem::replace(&mut *state, SessionState::Creating) {
                SessionState::Live(driver) => driver,
                _ => unreachable!("state checked above"),
            }
        };

        if let Err(e) = driver.shutdown() {
            tracing::warn!("error while shutting down driver: {}", e);
        }
        *lock(&self.driver_fingerprint) = None;

        *lock(&self.state) = SessionState::NoDriver;
        self.state_changed.notify_all();
    }

    /// Get the live driver, creating it if necessary.
    ///
    /// Concurrent callers during creation block until the one in-flight
    /// construction settles and then observe its result.
    pub fn get_driver(&self) -> Result<Arc<dyn Driver>, SessionError> {
        {
            let mut state = lock(&self.state);
            loop {
                match &*state {
                    SessionState::Live(driver) => return Ok(Arc::clone(driver)),
                    SessionState::Creating => {
                        state = self
                            .state_changed
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    SessionState::NoDriver => break,
                }
            }
            *state = SessionState::Creating;
        }

        let result = self.create_driver();

        let mut state = lock(&self.state);
        match result {
            Ok(driver) => {
                *state = SessionState::Live(Arc::clone(&driver));
                self.state_changed.notify_all();
                Ok(driver)
            }
            Err(e) => {
                *state = SessionState::NoDriver;
                self.state_changed.notify_all();
                Err(e)
            }
        }
    }

    fn create_driver(&self) -> Result<Arc<dyn Driver>, SessionError> {
        let inputs = lock(&self.inputs).clone();

        if inputs.settings.use_presets {
            if inputs.preset.is_none() {
                return Err(SessionError::NoPresetSelected);
            }
        } else if inputs.kit.is_none() {
            return Err(SessionError::NoKitSelected);
        }

        let cmake = match &inputs.settings.cmake_path {
            Some(path) => path.clone(),
            None => find_cmake().ok_or(SessionError::CMakeNotFound)?,
        };

        let caps = probe(&cmake).map_err(|e| {
            tracing::warn!("cannot probe `{}`: {}", cmake.display(), e);
            SessionError::CMakeNotFound
        })?;
        if caps.below_minimum() {
            tracing::warn!(
                "cmake {} is older than the supported minimum {}",
                caps.version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                minimum_supported_version()
            );
        }

        let requested = parse_mode_setting(inputs.settings.communication_mode.as_deref());
        let mode = negotiate(&caps, requested);

        let source_dir = source_dir_of(&inputs);
        let binary_dir = binary_dir_of(&inputs);
        check_cached_source_dir(&binary_dir, &source_dir)?;

        // Validated here so generator problems classify as a session
        // construction failure, not a mid-configure surprise.
        resolve_generator(&inputs, &binary_dir)?;

        let build_args = inputs.settings.build_args.clone();
        let driver: Arc<dyn Driver> = match mode {
            CommunicationMode::FileApi => Arc::new(FileApiDriver::new(
                cmake, source_dir, binary_dir, build_args,
            )),
            CommunicationMode::ServerApi => Arc::new(ServerApiDriver::new(
                cmake, source_dir, binary_dir, build_args,
            )),
            CommunicationMode::Legacy => Arc::new(LegacyDriver::new(
                cmake, source_dir, binary_dir, build_args,
            )),
        };

        *lock(&self.driver_fingerprint) = Some(inputs_fingerprint(&inputs));
        tracing::info!(
            "created {} driver for {}",
            mode,
            driver.source_dir().display()
        );
        Ok(driver)
    }

    /// The command line a configure pass would run.
    pub fn configure_command(&self, extra_args: &[String]) -> anyhow::Result<String> {
        let driver = self.get_driver().map_err(anyhow::Error::from)?;
        let request = self.configure_request(ConfigureType::Normal, extra_args)?;
        Ok(driver.configure_command(&request))
    }

    /// Run a configure pass.
    ///
    /// Returns `0` on success, the tool's own exit status on failure, or
    /// `-1` when the operation could not even be attempted. Unknown
    /// session-construction failures propagate as errors.
    pub fn configure(
        &self,
        configure_type: ConfigureType,
        extra_args: &[String],
    ) -> anyhow::Result<i32> {
        if configure_type == ConfigureType::Clean {
            let binary_dir = binary_dir_of(&lock(&self.inputs));
            if let Err(e) = remove_file_if_exists(&binary_dir.join("CMakeCache.txt"))
                .and_then(|_| remove_dir_all_if_exists(&binary_dir.join("CMakeFiles")))
            {
                tracing::warn!("failed to clean build directory: {}", e);
            }
        }

        let driver = match self.get_driver() {
            Ok(driver) => driver,
            Err(SessionError::Other(e)) => return Err(e),
            Err(e) => {
                report_recoverable("configure", &e);
                return Ok(-1);
            }
        };

        let source_dir = driver.source_dir();
        if !source_dir.exists() {
            tracing::error!("source directory {} does not exist", source_dir.display());
            return Ok(-1);
        }
        if !source_dir.join("CMakeLists.txt").exists() {
            tracing::error!(
                "no CMakeLists.txt found in {}",
                source_dir.display()
            );
            return Ok(-1);
        }

        let request = self.configure_request(configure_type, extra_args)?;

        if configure_type == ConfigureType::ShowCommandOnly {
            tracing::info!("configure command: {}", driver.configure_command(&request));
            return Ok(0);
        }

        let mut consumer = ConfigureOutputConsumer::new();
        let rebaser = ProgressRebaser::new();
        let callback = lock(&self.progress).clone();
        let report_progress = configure_type != ConfigureType::Cache;

        let code = driver.configure(&request, &mut consumer, &|event| {
            if report_progress {
                if let (Some(percent), Some(callback)) = (rebaser.rebase(event), &callback) {
                    callback(percent);
                }
            }
        })?;

        if consumer
            .signals()
            .contains(&StatusSignal::DebuggerClientWaiting)
        {
            tracing::info!("the tool is waiting for a debugger client to connect");
        }

        let bases = vec![
            driver.binary_dir().to_path_buf(),
            driver.source_dir().to_path_buf(),
        ];
        *lock(&self.configure_diagnostics) = consumer.resolve_diagnostics(&bases);

        if code == 0 {
            self.refresh_compile_commands(driver.binary_dir());
            for hook in lock(&self.configure_hooks).iter() {
                hook(driver.binary_dir());
            }
        }
        Ok(code)
    }

    /// Run a build pass. Builds are serialized: a second request blocks
    /// until the first settles rather than being rejected.
    pub fn build(&self, targets: &[String]) -> anyhow::Result<i32> {
        let _gate = lock(&self.build_gate);

        let driver = match self.get_driver() {
            Ok(driver) => driver,
            Err(SessionError::Other(e)) => return Err(e),
            Err(e) => {
                report_recoverable("build", &e);
                return Ok(-1);
            }
        };

        let settings = lock(&self.inputs).settings.clone();
        let mut consumer =
            BuildOutputConsumer::new(CompileOutputConsumer::from_settings(&settings));
        if let Some(callback) = lock(&self.progress).clone() {
            consumer = consumer.with_progress(move |percent| callback(percent));
        }

        let code = driver.build(targets, &mut consumer)?;

        let bases = vec![
            driver.binary_dir().to_path_buf(),
            driver.source_dir().to_path_buf(),
        ];
        *lock(&self.build_diagnostics) = consumer.compile().resolve_diagnostics(&bases);
        Ok(code)
    }

    /// Cancel an in-flight build or configure by terminating the tool
    /// process. The pending call settles once termination is observed; the
    /// driver itself survives.
    pub fn stop(&self) {
        if let SessionState::Live(driver) = &*lock(&self.state) {
            driver.stop();
        }
    }

    /// Build targets discovered by the live session.
    pub fn targets(&self) -> Result<Vec<BuildTarget>, SessionError> {
        Ok(self.get_driver()?.targets())
    }

    fn configure_request(
        &self,
        configure_type: ConfigureType,
        extra_args: &[String],
    ) -> anyhow::Result<ConfigureRequest> {
        let inputs = lock(&self.inputs).clone();
        let binary_dir = binary_dir_of(&inputs);
        let generator = resolve_generator(&inputs, &binary_dir).map_err(anyhow::Error::from)?;

        let cache_variables = if inputs.settings.use_presets {
            inputs
                .preset
                .as_ref()
                .map(|p| p.cache_variables.clone())
                .unwrap_or_default()
        } else {
            inputs
                .kit
                .as_ref()
                .map(|k| k.cache_entries())
                .unwrap_or_default()
        };

        let mut args = inputs.settings.configure_args.clone();
        args.extend(extra_args.iter().cloned());

        Ok(ConfigureRequest {
            generator,
            cache_variables,
            extra_args: args,
            cache_only: configure_type == ConfigureType::Cache,
        })
    }

    /// Best-effort copy of the compilation database to the configured
    /// destination; failures are logged and swallowed.
    fn refresh_compile_commands(&self, binary_dir: &Path) {
        let destination = lock(&self.inputs).settings.copy_compile_commands.clone();
        let Some(destination) = destination else {
            return;
        };
        let source = binary_dir.join("compile_commands.json");
        if !source.exists() {
            tracing::debug!("{} not present, skipping copy", source.display());
            return;
        }
        if let Err(e) = copy_file(&source, &destination) {
            tracing::warn!("failed to copy compilation database: {}", e);
        }
    }
}

fn report_recoverable(operation: &str, error: &SessionError) {
    tracing::error!("cannot {}: {}", operation, error);
    if let Some(help) = error.help() {
        tracing::info!("{}", help);
    }
}

fn source_dir_of(inputs: &Inputs) -> PathBuf {
    inputs
        .settings
        .source_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn binary_dir_of(inputs: &Inputs) -> PathBuf {
    if inputs.settings.use_presets {
        if let Some(dir) = inputs.preset.as_ref().and_then(|p| p.binary_dir.clone()) {
            return dir;
        }
    }
    inputs
        .settings
        .binary_dir
        .clone()
        .unwrap_or_else(|| source_dir_of(inputs).join("build"))
}

fn resolve_generator(inputs: &Inputs, binary_dir: &Path) -> Result<Option<String>, SessionError> {
    if let Some(generator) = &inputs.settings.generator {
        return Ok(Some(generator.clone()));
    }

    let selected = if inputs.settings.use_presets {
        inputs.preset.as_ref().and_then(|p| p.generator.clone())
    } else {
        inputs.kit.as_ref().and_then(|k| k.generator.clone())
    };
    if selected.is_some() {
        return Ok(selected);
    }

    // An initialized cache already knows its generator.
    if binary_dir.join("CMakeCache.txt").exists() {
        return Ok(None);
    }

    if find_executable("ninja").is_some() {
        return Ok(Some("Ninja".to_string()));
    }
    if cfg!(windows) {
        if find_executable("nmake").is_some() {
            return Ok(Some("NMake Makefiles".to_string()));
        }
    } else if find_executable("make").is_some() {
        return Ok(Some("Unix Makefiles".to_string()));
    }

    Err(SessionError::NoUsableGenerator)
}

/// Detect a build directory initialized for a different source tree by
/// reading the cached home directory out of the tool's cache file.
fn check_cached_source_dir(binary_dir: &Path, source_dir: &Path) -> Result<(), SessionError> {
    let cache = binary_dir.join("CMakeCache.txt");
    let Ok(contents) = std::fs::read_to_string(&cache) else {
        return Ok(());
    };

    for line in contents.lines() {
        if let Some(cached) = line.strip_prefix("CMAKE_HOME_DIRECTORY:INTERNAL=") {
            if !same_path(Path::new(cached), source_dir) {
                return Err(SessionError::MismatchedSourceDirectory {
                    cached: cached.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canonical_a = a.canonicalize().unwrap_or_else(|_| a.to_path_buf());
    let canonical_b = b.canonicalize().unwrap_or_else(|_| b.to_path_buf());
    canonical_a == canonical_b
}

fn inputs_fingerprint(inputs: &Inputs) -> String {
    let mut fp = Fingerprint::new();

    let settings = &inputs.settings;
    fp.update_opt(settings.source_dir.as_deref().and_then(Path::to_str));
    fp.update_opt(settings.binary_dir.as_deref().and_then(Path::to_str));
    fp.update_opt(settings.generator.as_deref());
    fp.update_opt(settings.communication_mode.as_deref());
    fp.update_bool(settings.use_presets);

    match &inputs.kit {
        Some(kit) => {
            fp.update_str(&kit.name);
            fp.update_opt(kit.generator.as_deref());
            for (name, value) in kit.cache_entries() {
                fp.update_str(&name).update_str(&value);
            }
        }
        None => {
            fp.update_opt(None);
        }
    }

    match &inputs.preset {
        Some(preset) => {
            fp.update_str(&preset.name);
            fp.update_opt(preset.generator.as_deref());
            fp.update_opt(preset.binary_dir.as_deref().and_then(Path::to_str));
            for (name, value) in &preset.cache_variables {
                fp.update_str(name).update_str(value);
            }
        }
        None => {
            fp.update_opt(None);
        }
    }

    fp.finish()
}
