#![warn(missing_docs)]
//! benchlens Report - Data Model and Serialization
//!
//! Shared types produced by the executors and the profile analyzer and
//! consumed by storage and output formatting:
//! - [`BenchmarkResult`] / [`BenchmarkRun`] for measurements
//! - [`ProfileSummary`] and its parts for profile findings
//! - JSON (machine-readable) encoding

#[allow(missing_docs)]
mod model;
mod json;

pub use json::{generate_json_report, generate_json_summary, parse_json_report};
pub use model::{
    BenchmarkResult, BenchmarkRun, FunctionProfile, HotPath, MemoryLeak, ProfileSummary, Severity,
    Suggestion, SuggestionKind,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Format a nanosecond quantity with an adaptive unit
pub fn format_duration(ns: f64) -> String {
    if ns >= 1_000_000_000.0 {
        format!("{:.2} s", ns / 1_000_000_000.0)
    } else if ns >= 1_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.2} µs", ns / 1_000.0)
    } else {
        format!("{:.2} ns", ns)
    }
}

/// Format a byte count with a binary unit
pub fn format_bytes(bytes: i64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b.abs() >= KIB * KIB * KIB {
        format!("{:.2} GiB", b / (KIB * KIB * KIB))
    } else if b.abs() >= KIB * KIB {
        format!("{:.2} MiB", b / (KIB * KIB))
    } else if b.abs() >= KIB {
        format!("{:.2} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}
