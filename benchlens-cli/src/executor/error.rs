use crate::storage::ProfileKind;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that prevent a `BenchmarkRun` from existing.
///
/// Toolchain diagnostics are carried verbatim; they are the primary
/// debugging signal for whoever invoked the run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no benchmarks found matching filter '{filter}'")]
    NoBenchmarksFound { filter: String },

    #[error(
        "benchmarks {} are declared in _test.go files, which the direct strategy cannot import; run them without --direct",
        benchmarks.join(", ")
    )]
    BenchmarksInTestFiles { benchmarks: Vec<String> },

    #[error("no benchmark results found in the output of `{command}`")]
    NoResultsFound { command: String },

    #[error("benchmark execution failed: {cause}\n{diagnostics}")]
    ExecutionFailed { cause: String, diagnostics: String },

    #[error(
        "failed to compile benchmark harness:\n{diagnostics}\n--- generated harness ---\n{harness_source}"
    )]
    CompileFailed {
        diagnostics: String,
        harness_source: String,
    },

    #[error("no go.mod found in {} or any parent directory", start.display())]
    BuildRootNotFound { start: PathBuf },

    #[error("invalid go.mod at {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("package directory {} is outside the module rooted at {}", dir.display(), root.display())]
    PackageOutsideModule { dir: PathBuf, root: PathBuf },

    #[error("invalid benchmark filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that only prevent enrichment of an otherwise valid run
#[derive(Debug, Error)]
pub enum CaptureWarning {
    #[error("{kind} profile capture failed: {reason}")]
    ProfileCapture { kind: ProfileKind, reason: String },

    #[error("profile analysis failed: {reason}")]
    Analysis { reason: String },
}
