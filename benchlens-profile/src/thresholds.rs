//! Heuristic Thresholds
//!
//! The cut-offs used by hot-path detection, leak flagging and suggestion
//! rules. Defaults are the historical values; they have no derivation
//! beyond that and are exposed so a project can tune them.

use serde::{Deserialize, Serialize};

const MIB: i64 = 1024 * 1024;

/// Tunable analysis constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisThresholds {
    /// Entries kept in each top-functions list
    pub top_functions: usize,
    /// Minimum share of total weight for a hot path
    pub hot_path_min_percent: f64,
    /// Maximum number of hot paths reported
    pub max_hot_paths: usize,
    /// A function is a leak candidate when allocated > ratio × in-use
    pub leak_ratio: f64,
    /// ...and allocated exceeds this many bytes
    pub leak_min_bytes: i64,
    /// Allocated bytes at or above which a leak is `medium`
    pub leak_medium_bytes: i64,
    /// Allocated bytes at or above which a leak is `high`
    pub leak_high_bytes: i64,
    /// Maximum number of leak candidates reported
    pub max_leaks: usize,
    /// Flat CPU share above which the top function gets a suggestion
    pub cpu_hotspot_percent: f64,
    /// Flat allocation share above which the top allocator gets a suggestion
    pub memory_hotspot_percent: f64,
    /// Share above which the hottest path gets a suggestion
    pub hot_path_suggestion_percent: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            top_functions: 10,
            hot_path_min_percent: 5.0,
            max_hot_paths: 5,
            leak_ratio: 2.0,
            leak_min_bytes: MIB,
            leak_medium_bytes: 5 * MIB,
            leak_high_bytes: 10 * MIB,
            max_leaks: 5,
            cpu_hotspot_percent: 30.0,
            memory_hotspot_percent: 40.0,
            hot_path_suggestion_percent: 25.0,
        }
    }
}
