#![warn(missing_docs)]
//! # benchlens
//!
//! Runs Go benchmarks, captures their CPU and heap profiles and turns the
//! raw numbers into a ranked, actionable report.
//!
//! - **Two execution strategies**: delegate to `go test -bench`, or compile
//!   a generated harness that calls the benchmark functions directly
//! - **Streaming results**: result lines are parsed as the toolchain prints
//!   them, with live progress
//! - **Profile analysis**: hot functions, hot call paths, leak candidates
//!   and optimization suggestions from pprof profiles
//! - **Run history**: every run is saved as JSON next to its raw profiles
//!
//! ## Quick Start
//!
//! ```text
//! benchlens -p ./... --profile cpu,mem Encode
//! benchlens list -p ./...
//! benchlens analyze --cpu-profile cpu.pprof
//! benchlens runs
//! ```
//!
//! ## Library Use
//!
//! ```ignore
//! use benchlens::{FileStore, ProcessExecutor, ProfileAnalyzer, RunOptions};
//!
//! let options = RunOptions {
//!     package: "./codec".to_string(),
//!     profile: "cpu".parse()?,
//!     ..RunOptions::default()
//! };
//! let store = FileStore::new(".benchlens");
//! let outcome = ProcessExecutor::new(options, ProfileAnalyzer::default()).run(&store)?;
//! println!("{}", benchlens::format_human_output(&outcome.run));
//! ```

// Re-export data model
pub use benchlens_report::{
    BenchmarkResult, BenchmarkRun, FunctionProfile, HotPath, MemoryLeak, OutputFormat,
    ProfileSummary, Severity, Suggestion, SuggestionKind, format_bytes, format_duration,
    generate_json_report, generate_json_summary, parse_json_report,
};

// Re-export result parsing
pub use benchlens_output::{OutputParser, ParseError, parse_line, parse_output};

// Re-export profile analysis
pub use benchlens_profile::{
    AnalysisError, AnalysisThresholds, ProfileAnalyzer, SampleSet, StackSample, ValueType,
    analyze_profiles,
};

// Re-export execution, storage and CLI
pub use benchlens_cli::{
    BenchlensConfig, CaptureWarning, Cli, DirectExecutor, ExecutionError, FileStore, Interrupter,
    ProcessExecutor, ProfileCapture, ProfileKind, ProfileModes, RunOptions, RunOutcome, RunStore,
    SourceScanner, Strategy, format_human_output, format_profile_summary, generate_harness, run,
    run_with_cli,
};
