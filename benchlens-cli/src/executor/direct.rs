//! Direct Execution
//!
//! Scans the package for benchmark functions, generates a harness program
//! that calls them, builds it inside the module and runs the binary through
//! the same streaming runner `go test` uses.

use super::capture::ProfileCapture;
use super::error::ExecutionError;
use super::harness::{HarnessEntry, generate_harness};
use super::metadata::render_command;
use super::process::{Invocation, execute, run_captured};
use super::scanner::{SourceScanner, filter_benchmarks};
use super::{RunOptions, RunOutcome};
use crate::storage::RunStore;
use benchlens_profile::ProfileAnalyzer;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Prefix of the scratch build directory; `./...` patterns skip `_` dirs
pub const HARNESS_DIR_PREFIX: &str = "_benchlens_harness";

/// Walk up from `start` to the directory holding `go.mod`
pub fn find_build_root(start: &Path) -> Result<PathBuf, ExecutionError> {
    let mut dir = start
        .canonicalize()
        .map_err(|_| ExecutionError::BuildRootNotFound {
            start: start.to_path_buf(),
        })?;
    loop {
        if dir.join("go.mod").is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    Err(ExecutionError::BuildRootNotFound {
        start: start.to_path_buf(),
    })
}

/// The `module` path declared by a `go.mod` file
pub fn read_module_path(go_mod: &Path) -> Result<String, ExecutionError> {
    let content = std::fs::read_to_string(go_mod)?;
    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if let Some(rest) = line.strip_prefix("module") {
            let path = rest.trim().trim_matches(|c| c == '"' || c == '`');
            if !path.is_empty() && rest.starts_with(char::is_whitespace) {
                return Ok(path.to_string());
            }
        }
    }
    Err(ExecutionError::InvalidManifest {
        path: go_mod.to_path_buf(),
        reason: "missing module directive".to_string(),
    })
}

/// Import path of the package in `dir`, a directory inside `root`
pub fn import_path_for(root: &Path, module: &str, dir: &Path) -> Result<String, ExecutionError> {
    let outside = || ExecutionError::PackageOutsideModule {
        dir: dir.to_path_buf(),
        root: root.to_path_buf(),
    };
    let dir = dir.canonicalize()?;
    let relative = dir.strip_prefix(root).map_err(|_| outside())?;

    let mut path = module.to_string();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                path.push('/');
                path.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    Ok(path)
}

/// Alternative strategy: compile and run a generated harness
pub struct DirectExecutor {
    options: RunOptions,
    analyzer: ProfileAnalyzer,
}

impl DirectExecutor {
    pub fn new(options: RunOptions, analyzer: ProfileAnalyzer) -> Self {
        Self { options, analyzer }
    }

    /// Harness entries for the benchmarks selected by the filter.
    ///
    /// Benchmarks declared in `_test.go` files are skipped with a warning;
    /// a selection made only of those is `BenchmarksInTestFiles`.
    pub fn select(&self, root: &Path, module: &str) -> Result<Vec<HarnessEntry>, ExecutionError> {
        let scanner = SourceScanner::new(&self.options.work_dir);
        let selected = filter_benchmarks(scanner.scan(&self.options.package)?, &self.options.filter)?;
        let (importable, in_tests): (Vec<_>, Vec<_>) =
            selected.into_iter().partition(|func| func.is_importable());
        let skipped: Vec<String> = in_tests.into_iter().map(|func| func.name).collect();

        if importable.is_empty() {
            return Err(ExecutionError::BenchmarksInTestFiles {
                benchmarks: skipped,
            });
        }
        if !skipped.is_empty() {
            warn!(
                skipped = %skipped.join(", "),
                "benchmarks in _test.go files cannot run directly; run them without --direct"
            );
        }

        importable
            .iter()
            .map(|func| {
                Ok(HarnessEntry {
                    import_path: import_path_for(root, module, &func.dir)?,
                    function: func.name.clone(),
                })
            })
            .collect()
    }

    /// Arguments passed to the compiled harness
    pub fn harness_args(&self, capture: Option<&ProfileCapture>) -> Vec<String> {
        let opts = &self.options;
        let mut args = Vec::new();
        if let Some(cpu) = opts.cpu_arg() {
            args.push("-cpu".to_string());
            args.push(cpu);
        }
        if let Some(benchtime) = &opts.benchtime {
            args.push("-benchtime".to_string());
            args.push(benchtime.clone());
        }
        if let Some(count) = opts.count {
            args.push("-count".to_string());
            args.push(count.to_string());
        }
        if let Some(path) = capture.and_then(|c| c.cpu_path()) {
            args.push("-cpuprofile".to_string());
            args.push(path.display().to_string());
        }
        if let Some(path) = capture.and_then(|c| c.memory_path()) {
            args.push("-memprofile".to_string());
            args.push(path.display().to_string());
        }
        args
    }

    pub fn run(&self, store: &dyn RunStore) -> Result<RunOutcome, ExecutionError> {
        let started = Utc::now();
        let root = find_build_root(&self.options.work_dir)?;
        let module = read_module_path(&root.join("go.mod"))?;
        let entries = self.select(&root, &module)?;
        info!(
            benchmarks = entries.len(),
            module = %module,
            "generating benchmark harness"
        );

        let source = generate_harness(&entries);
        let build_dir = tempfile::Builder::new()
            .prefix(HARNESS_DIR_PREFIX)
            .tempdir_in(&root)?;
        std::fs::write(build_dir.path().join("main.go"), &source)?;
        let binary = build_dir
            .path()
            .join(format!("harness{}", std::env::consts::EXE_SUFFIX));
        self.compile(build_dir.path(), &binary, &source)?;

        let mut warnings = Vec::new();
        let capture = ProfileCapture::start(self.options.profile, &mut warnings);
        let args = self.harness_args(capture.as_ref());
        let command_line = render_command(&binary.display().to_string(), &args);
        let mut command = Command::new(&binary);
        command.args(&args).current_dir(&self.options.work_dir);

        // `build_dir` outlives the run; dropping it removes the binary, also
        // when the run was interrupted
        let outcome = execute(
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
        );
        drop(build_dir);
        outcome
    }

    fn compile(&self, dir: &Path, binary: &Path, source: &str) -> Result<(), ExecutionError> {
        let mut command = Command::new(&self.options.toolchain);
        command
            .arg("build")
            .arg("-o")
            .arg(binary)
            .arg(".")
            .current_dir(dir);
        debug!(dir = %dir.display(), "compiling harness");

        let output = run_captured(&mut command, &self.options.interrupter).map_err(|e| match e {
            ExecutionError::Io(e) => ExecutionError::ExecutionFailed {
                cause: format!("failed to spawn `{} build`: {}", self.options.toolchain, e),
                diagnostics: String::new(),
            },
            other => other,
        })?;
        if !output.status.success() {
            let diagnostics = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            return Err(ExecutionError::CompileFailed {
                diagnostics,
                harness_source: source.to_string(),
            });
        }
        Ok(())
    }
}
