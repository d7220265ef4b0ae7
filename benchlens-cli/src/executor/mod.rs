//! Benchmark Execution
//!
//! Two strategies produce a [`BenchmarkRun`](benchlens_report::BenchmarkRun)
//! from a Go package:
//!
//! ```text
//! ProcessExecutor:  go test -bench ──┐
//!                                    ├─► ProcessRunner ─► OutputParser ─► BenchmarkRun
//! DirectExecutor:   SourceScanner    │        (stdout/stderr drained       │
//!                     ─► generate_harness     on scoped threads)           │
//!                     ─► go build ───┘                                     ▼
//!                                                      ProfileCapture::finish (optional)
//!                                                        ─► RunStore::save_profile
//!                                                        ─► ProfileAnalyzer
//! ```

mod capture;
mod direct;
mod error;
mod formatting;
mod harness;
mod interrupt;
mod metadata;
mod process;
mod scanner;

pub use capture::{ProfileCapture, ProfileModes};
pub use direct::{
    DirectExecutor, HARNESS_DIR_PREFIX, find_build_root, import_path_for, read_module_path,
};
pub use error::{CaptureWarning, ExecutionError};
pub use formatting::{format_human_output, format_profile_summary};
pub use harness::{HarnessEntry, generate_harness};
pub use interrupt::Interrupter;
pub use metadata::{render_command, toolchain_version};
pub use process::{ExecutorState, ProcessExecutor, ProcessRunner, StreamOutput};
pub use scanner::{BenchmarkFunc, SourceScanner, filter_benchmarks, scan_source};

use benchlens_report::BenchmarkRun;
use std::path::PathBuf;

/// Inputs shared by both execution strategies
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Toolchain executable (`go`)
    pub toolchain: String,
    /// Package path relative to `work_dir`; a trailing `/...` recurses
    pub package: String,
    /// Benchmark name filter (regex)
    pub filter: String,
    /// GOMAXPROCS values; empty means the toolchain default
    pub cpu: Vec<u32>,
    /// Run time per benchmark, passed through verbatim
    pub benchtime: Option<String>,
    /// Repetitions per benchmark
    pub count: Option<u32>,
    /// Report allocation statistics
    pub benchmem: bool,
    /// Profiles to capture
    pub profile: ProfileModes,
    /// Pass raw toolchain output through to stderr
    pub verbose: bool,
    /// Directory the toolchain runs in
    pub work_dir: PathBuf,
    /// Cancels the running child when triggered
    pub interrupter: Interrupter,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            toolchain: "go".to_string(),
            package: ".".to_string(),
            filter: ".".to_string(),
            cpu: Vec::new(),
            benchtime: None,
            count: None,
            benchmem: true,
            profile: ProfileModes::default(),
            verbose: false,
            work_dir: PathBuf::from("."),
            interrupter: Interrupter::new(),
        }
    }
}

impl RunOptions {
    /// `-cpu` argument value, if any
    pub fn cpu_arg(&self) -> Option<String> {
        if self.cpu.is_empty() {
            None
        } else {
            Some(
                self.cpu
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        }
    }
}

/// A completed run plus the non-fatal problems met while enriching it
#[derive(Debug)]
pub struct RunOutcome {
    pub run: BenchmarkRun,
    pub warnings: Vec<CaptureWarning>,
}
