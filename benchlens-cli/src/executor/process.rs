//! Process Execution
//!
//! Spawns the toolchain (or a compiled harness), streams its stdout through
//! the result parser and collects stderr, without ever letting either pipe
//! fill up.

use super::capture::ProfileCapture;
use super::error::{CaptureWarning, ExecutionError};
use super::interrupt::{Interrupter, interrupted};
use super::metadata::{render_command, toolchain_version};
use super::{RunOptions, RunOutcome};
use crate::storage::RunStore;
use benchlens_output::OutputParser;
use benchlens_profile::ProfileAnalyzer;
use benchlens_report::{BenchmarkResult, BenchmarkRun, format_duration};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one toolchain process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Spawned,
    Streaming,
    Completed,
    Failed,
}

/// What a successful process run produced
#[derive(Debug)]
pub struct StreamOutput {
    pub results: Vec<BenchmarkResult>,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs one child process with its stdout streamed into an [`OutputParser`]
#[derive(Debug)]
pub struct ProcessRunner {
    state: ExecutorState,
    interrupter: Interrupter,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::with_interrupter(Interrupter::new())
    }

    /// A runner whose child is killed when `interrupter` fires
    pub fn with_interrupter(interrupter: Interrupter) -> Self {
        Self {
            state: ExecutorState::Idle,
            interrupter,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    fn transition(&mut self, next: ExecutorState) {
        debug!(from = ?self.state, to = ?next, "executor state");
        self.state = next;
    }

    /// Spawn `command`, stream its stdout through `parser` and wait for it.
    ///
    /// Both pipes are drained on scoped threads before the child is waited
    /// on. An unsuccessful exit is an error, and so is a run that printed
    /// no result lines or one that was interrupted.
    pub fn run(
        &mut self,
        command: &mut Command,
        command_line: &str,
        parser: OutputParser<'_>,
    ) -> Result<StreamOutput, ExecutionError> {
        let result = self.run_inner(command, command_line, parser);
        self.transition(match result {
            Ok(_) => ExecutorState::Completed,
            Err(_) => ExecutorState::Failed,
        });
        result
    }

    fn run_inner(
        &mut self,
        command: &mut Command,
        command_line: &str,
        mut parser: OutputParser<'_>,
    ) -> Result<StreamOutput, ExecutionError> {
        self.interrupter.check()?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| ExecutionError::ExecutionFailed {
                cause: format!("failed to spawn `{}`: {}", command_line, e),
                diagnostics: String::new(),
            })?;
        self.transition(ExecutorState::Spawned);

        let (Some(stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecutionError::ExecutionFailed {
                cause: "child process pipes were not captured".to_string(),
                diagnostics: String::new(),
            });
        };
        self.interrupter.track(child);
        self.transition(ExecutorState::Streaming);

        let (stdout_result, stderr_result) = std::thread::scope(|scope| {
            let errors = scope.spawn(move || drain(&mut stderr));
            let results = scope.spawn(|| {
                let results = parser.stream(BufReader::new(stdout))?;
                let tail: Vec<String> = parser.recent_lines().map(str::to_string).collect();
                Ok::<_, std::io::Error>((results, tail))
            });
            (results.join(), errors.join())
        });

        let mut child = self
            .interrupter
            .release()
            .ok_or_else(|| ExecutionError::ExecutionFailed {
                cause: "child process handle was lost".to_string(),
                diagnostics: String::new(),
            })?;

        let (results, tail, stderr_text) = match (stdout_result, stderr_result) {
            (Ok(Ok((results, tail))), Ok(Ok(stderr_text))) => (results, tail, stderr_text),
            (Ok(Err(e)), _) | (_, Ok(Err(e))) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionError::Io(e));
            }
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionError::ExecutionFailed {
                    cause: "output reader thread panicked".to_string(),
                    diagnostics: String::new(),
                });
            }
        };

        let status = child.wait()?;
        let elapsed = start.elapsed();
        debug!(?status, elapsed_ms = elapsed.as_millis() as u64, "process exited");

        if self.interrupter.is_interrupted() {
            return Err(interrupted(stderr_text));
        }

        if !status.success() {
            // go test reports benchmark failures on stdout
            let diagnostics = if stderr_text.trim().is_empty() {
                tail.join("\n")
            } else {
                stderr_text
            };
            return Err(ExecutionError::ExecutionFailed {
                cause: describe_exit(status),
                diagnostics,
            });
        }

        if results.is_empty() {
            return Err(ExecutionError::NoResultsFound {
                command: command_line.to_string(),
            });
        }

        Ok(StreamOutput {
            results,
            stderr: stderr_text,
            elapsed,
        })
    }
}

fn drain(pipe: &mut impl Read) -> std::io::Result<String> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Exit status and collected output of a non-streaming child
pub(crate) struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion with both pipes collected, killing it when
/// `interrupter` fires.
pub(crate) fn run_captured(
    command: &mut Command,
    interrupter: &Interrupter,
) -> Result<CapturedOutput, ExecutionError> {
    interrupter.check()?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(ExecutionError::ExecutionFailed {
            cause: "child process pipes were not captured".to_string(),
            diagnostics: String::new(),
        });
    };
    interrupter.track(child);

    let (stdout_result, stderr_result) = std::thread::scope(|scope| {
        let errors = scope.spawn(move || drain(&mut stderr));
        let output = scope.spawn(move || drain(&mut stdout));
        (output.join(), errors.join())
    });

    let mut child = interrupter
        .release()
        .ok_or_else(|| ExecutionError::ExecutionFailed {
            cause: "child process handle was lost".to_string(),
            diagnostics: String::new(),
        })?;
    let status = child.wait()?;

    let (stdout, stderr) = match (stdout_result, stderr_result) {
        (Ok(stdout), Ok(stderr)) => (stdout?, stderr?),
        _ => {
            return Err(ExecutionError::ExecutionFailed {
                cause: "output reader thread panicked".to_string(),
                diagnostics: String::new(),
            });
        }
    };

    if interrupter.is_interrupted() {
        return Err(interrupted(stderr));
    }

    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {}", signal);
        }
    }
    "terminated abnormally".to_string()
}

/// Run `command` with live feedback: raw passthrough when verbose,
/// otherwise a spinner counting parsed results.
pub(crate) fn stream_with_progress(
    command: &mut Command,
    command_line: &str,
    verbose: bool,
    interrupter: &Interrupter,
) -> Result<StreamOutput, ExecutionError> {
    let mut runner = ProcessRunner::with_interrupter(interrupter.clone());
    if verbose {
        let parser = OutputParser::new().verbose(std::io::stderr());
        return runner.run(command, command_line, parser);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} results {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let progress = pb.clone();
    let parser = OutputParser::new().on_result(move |result| {
        progress.inc(1);
        progress.set_message(format!(
            "{} {}",
            result.name,
            format_duration(result.ns_per_op)
        ));
    });
    let output = runner.run(command, command_line, parser);
    pb.finish_and_clear();
    output
}

/// A ready-to-spawn toolchain invocation plus its profiling state
pub(crate) struct Invocation {
    pub command: Command,
    pub command_line: String,
    pub capture: Option<ProfileCapture>,
    pub warnings: Vec<CaptureWarning>,
}

/// Run an invocation and turn its output into a [`BenchmarkRun`].
pub(crate) fn execute(
    invocation: Invocation,
    options: &RunOptions,
    analyzer: &ProfileAnalyzer,
    store: &dyn RunStore,
    started: DateTime<Utc>,
) -> Result<RunOutcome, ExecutionError> {
    let Invocation {
        mut command,
        command_line,
        capture,
        mut warnings,
    } = invocation;

    info!(command = %command_line, "running benchmarks");
    let output = stream_with_progress(
        &mut command,
        &command_line,
        options.verbose,
        &options.interrupter,
    )?;
    if !output.stderr.trim().is_empty() {
        debug!(stderr = %output.stderr.trim_end(), "toolchain stderr");
    }
    info!(
        results = output.results.len(),
        elapsed_ms = output.elapsed.as_millis() as u64,
        "benchmarks complete"
    );

    let mut run = BenchmarkRun {
        id: BenchmarkRun::id_for(started),
        timestamp: started,
        package_path: options.package.clone(),
        toolchain_version: toolchain_version(&options.toolchain),
        results: output.results,
        command: command_line,
        duration: output.elapsed,
        cpu_profile_ref: None,
        memory_profile_ref: None,
        profile_summary: None,
    };

    if let Some(capture) = capture {
        warnings.extend(capture.finish(&mut run, store, analyzer));
    }

    Ok(RunOutcome { run, warnings })
}

/// Default strategy: delegate to `go test -bench`
pub struct ProcessExecutor {
    options: RunOptions,
    analyzer: ProfileAnalyzer,
}

impl ProcessExecutor {
    pub fn new(options: RunOptions, analyzer: ProfileAnalyzer) -> Self {
        Self { options, analyzer }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Arguments passed to the toolchain, after the executable name
    pub fn build_args(&self, capture: Option<&ProfileCapture>) -> Vec<String> {
        let opts = &self.options;
        let mut args: Vec<String> = vec![
            "test".into(),
            "-run".into(),
            "^$".into(),
            "-bench".into(),
            opts.filter.clone(),
        ];
        if opts.benchmem {
            args.push("-benchmem".into());
        }
        if let Some(cpu) = opts.cpu_arg() {
            args.push("-cpu".into());
            args.push(cpu);
        }
        if let Some(benchtime) = &opts.benchtime {
            args.push("-benchtime".into());
            args.push(benchtime.clone());
        }
        if let Some(count) = opts.count {
            args.push("-count".into());
            args.push(count.to_string());
        }
        if let Some(capture) = capture {
            if let Some(path) = capture.cpu_path() {
                args.push("-cpuprofile".into());
                args.push(path.display().to_string());
            }
            if let Some(path) = capture.memory_path() {
                args.push("-memprofile".into());
                args.push(path.display().to_string());
            }
            // Profiling leaves the test binary behind; keep it out of the package dir
            args.push("-o".into());
            args.push(capture.dir().join("bench.test").display().to_string());
        }
        args.push(opts.package.clone());
        args
    }

    /// Run the benchmarks and, when requested, capture and analyze profiles
    pub fn run(&self, store: &dyn RunStore) -> Result<RunOutcome, ExecutionError> {
        let started = Utc::now();
        let mut warnings = Vec::new();

        let modes = self.options.profile;
        let capture = if modes.any() && is_multi_package(&self.options.package) {
            for kind in modes.kinds() {
                let warning = CaptureWarning::ProfileCapture {
                    kind,
                    reason: format!(
                        "go test cannot profile multiple packages ({})",
                        self.options.package
                    ),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
            None
        } else {
            ProfileCapture::start(modes, &mut warnings)
        };

        let args = self.build_args(capture.as_ref());
        let command_line = render_command(&self.options.toolchain, &args);
        let mut command = Command::new(&self.options.toolchain);
        command.args(&args).current_dir(&self.options.work_dir);

        execute(
            Invocation {
                command,
                command_line,
                capture,
                warnings,
            },
            &self.options,
            &self.analyzer,
            store,
            started,
        )
    }
}

fn is_multi_package(package: &str) -> bool {
    package == "..." || package.ends_with("/...")
}
