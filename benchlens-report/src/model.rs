//! Run and Profile Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One parsed benchmark result line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    /// Benchmark name without the `Benchmark` prefix, GOMAXPROCS suffix kept
    pub name: String,
    pub iterations: u64,
    pub ns_per_op: f64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub bytes_per_op: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub allocs_per_op: u64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub mb_per_sec: f64,
}

impl BenchmarkResult {
    /// Result with only the primary measurement set
    pub fn new(name: impl Into<String>, iterations: u64, ns_per_op: f64) -> Self {
        Self {
            name: name.into(),
            iterations,
            ns_per_op,
            bytes_per_op: 0,
            allocs_per_op: 0,
            mb_per_sec: 0.0,
        }
    }
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// A complete benchmark invocation and everything derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRun {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub package_path: String,
    pub toolchain_version: String,
    pub results: Vec<BenchmarkResult>,
    pub command: String,
    /// Wall-clock time from spawn to process exit
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_profile_ref: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_profile_ref: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_summary: Option<ProfileSummary>,
}

impl BenchmarkRun {
    /// Derive a run id from its start time.
    ///
    /// Millisecond resolution; two runs started within the same millisecond
    /// share an id and the later one overwrites the earlier in storage.
    pub fn id_for(timestamp: DateTime<Utc>) -> String {
        timestamp.format("%Y%m%d-%H%M%S%.3f").to_string()
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

/// Per-function share of one value stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionProfile {
    pub name: String,
    pub flat_percent: f64,
    pub cum_percent: f64,
    pub flat_value: i64,
    pub cum_value: i64,
}

/// A call stack carrying a disproportionate share of the samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotPath {
    /// Cleaned function names, root first
    pub path: Vec<String>,
    pub percentage: f64,
    pub occurrences: u64,
    pub description: String,
}

/// Finding severity, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

/// A function whose allocation behaviour trips the leak heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLeak {
    pub function: String,
    /// Allocated object count, 0 when the profile has no object stream
    pub allocations: i64,
    /// Allocated bytes
    pub bytes: i64,
    pub severity: Severity,
    pub description: String,
}

/// Area a suggestion is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Cpu,
    Memory,
    Algorithm,
    General,
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SuggestionKind::Cpu => "cpu",
            SuggestionKind::Memory => "memory",
            SuggestionKind::Algorithm => "algorithm",
            SuggestionKind::General => "general",
        })
    }
}

/// An actionable optimization hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub severity: Severity,
    pub function: String,
    pub issue: String,
    pub suggestion: String,
    pub impact: String,
}

/// Everything derived from one CPU and/or memory sample set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub cpu_top_functions: Vec<FunctionProfile>,
    pub memory_top_functions: Vec<FunctionProfile>,
    pub memory_leaks: Vec<MemoryLeak>,
    pub hot_paths: Vec<HotPath>,
    pub suggestions: Vec<Suggestion>,
    pub total_cpu_samples: i64,
    pub total_memory_bytes: i64,
}

impl ProfileSummary {
    /// True when no stream produced any finding
    pub fn is_empty(&self) -> bool {
        self.cpu_top_functions.is_empty()
            && self.memory_top_functions.is_empty()
            && self.memory_leaks.is_empty()
            && self.hot_paths.is_empty()
            && self.suggestions.is_empty()
    }
}
