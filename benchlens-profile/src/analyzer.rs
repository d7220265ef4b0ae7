//! Profile Analysis
//!
//! Turns CPU and memory sample sets into a [`ProfileSummary`].
//!
//! ## Pipeline
//!
//! ```text
//! CPU SampleSet ──► flat/cum per function ──► top N
//!              └──► weight per root-first path ──► hot paths (cutoff, cap)
//!
//! Memory SampleSet ──► alloc per function ──► top N
//!                 └──► alloc vs in-use per function ──► leak candidates
//!
//! summary so far ──► suggestion rules
//! ```
//!
//! Aggregation is flat maps keyed by cleaned function name (or joined path)
//! followed by a sort and a slice; ties break on the key so output is
//! deterministic.

use crate::leaks::{AllocationStats, detect_leaks};
use crate::names::clean_function_name;
use crate::sample_set::SampleSet;
use crate::suggestions::generate_suggestions;
use crate::thresholds::AnalysisThresholds;
use benchlens_report::{FunctionProfile, HotPath, MemoryLeak, ProfileSummary};
use fxhash::FxHashMap;

const ALLOC_SPACE: &str = "alloc_space";
const INUSE_SPACE: &str = "inuse_space";
const ALLOC_OBJECTS: &str = "alloc_objects";
const PATH_SEPARATOR: &str = " → ";

#[derive(Debug, Default, Clone, Copy)]
struct FunctionStats {
    flat: i64,
    cum: i64,
}

#[derive(Debug, Default)]
struct PathStats {
    path: Vec<String>,
    weight: i64,
    occurrences: u64,
}

/// CPU-side findings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuAnalysis {
    /// Sum of value slot 0 across all samples
    pub total: i64,
    /// Top functions by flat value
    pub top_functions: Vec<FunctionProfile>,
    /// Paths above the hot-path cutoff, heaviest first
    pub hot_paths: Vec<HotPath>,
}

/// Memory-side findings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryAnalysis {
    /// Sum of allocated bytes across all samples
    pub total_allocated: i64,
    /// Top functions by allocated bytes
    pub top_functions: Vec<FunctionProfile>,
    /// Leak candidates, most severe first
    pub leaks: Vec<MemoryLeak>,
}

/// Derives ranked findings from sample sets
#[derive(Debug, Clone, Default)]
pub struct ProfileAnalyzer {
    thresholds: AnalysisThresholds,
}

impl ProfileAnalyzer {
    /// Create an analyzer with the given thresholds
    pub fn new(thresholds: AnalysisThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in effect
    pub fn thresholds(&self) -> &AnalysisThresholds {
        &self.thresholds
    }

    /// Analyze whichever streams are present.
    ///
    /// An absent stream, or a memory profile without both `alloc_space` and
    /// `inuse_space`, leaves the corresponding fields empty.
    pub fn analyze(&self, cpu: Option<&SampleSet>, memory: Option<&SampleSet>) -> ProfileSummary {
        let mut summary = ProfileSummary::default();

        if let Some(set) = cpu {
            let cpu = self.analyze_cpu(set);
            summary.total_cpu_samples = cpu.total;
            summary.cpu_top_functions = cpu.top_functions;
            summary.hot_paths = cpu.hot_paths;
        }

        if let Some(mem) = memory.and_then(|set| self.analyze_memory(set)) {
            summary.total_memory_bytes = mem.total_allocated;
            summary.memory_top_functions = mem.top_functions;
            summary.memory_leaks = mem.leaks;
        }

        summary.suggestions = generate_suggestions(&summary, &self.thresholds);
        summary
    }

    /// Flat/cumulative attribution and hot paths over value slot 0
    pub fn analyze_cpu(&self, set: &SampleSet) -> CpuAnalysis {
        let total = set.total(0);
        let mut functions: FxHashMap<String, FunctionStats> = FxHashMap::default();
        let mut paths: FxHashMap<String, PathStats> = FxHashMap::default();

        for sample in set.samples() {
            let Some(&value) = sample.values.first() else {
                continue;
            };
            let frames: Vec<&str> = sample
                .frames
                .iter()
                .map(|f| clean_function_name(f))
                .collect();
            attribute(&mut functions, &frames, value);

            if frames.is_empty() {
                continue;
            }
            let root_first: Vec<String> = frames.iter().rev().map(|f| f.to_string()).collect();
            let key = root_first.join(PATH_SEPARATOR);
            let entry = paths.entry(key).or_insert_with(|| PathStats {
                path: root_first,
                ..Default::default()
            });
            entry.weight += value;
            entry.occurrences += 1;
        }

        CpuAnalysis {
            total,
            top_functions: rank_functions(functions, total, self.thresholds.top_functions),
            hot_paths: self.select_hot_paths(paths, total),
        }
    }

    fn select_hot_paths(&self, paths: FxHashMap<String, PathStats>, total: i64) -> Vec<HotPath> {
        let mut ranked: Vec<(String, PathStats)> = paths.into_iter().collect();
        ranked.sort_by(|a, b| b.1.weight.cmp(&a.1.weight).then_with(|| a.0.cmp(&b.0)));

        let mut hot = Vec::new();
        for (_, stats) in ranked {
            if hot.len() >= self.thresholds.max_hot_paths {
                break;
            }
            let percentage = percent(stats.weight, total);
            // Sorted descending: nothing after the first miss can qualify
            if percentage < self.thresholds.hot_path_min_percent {
                break;
            }
            let leaf = stats.path.last().cloned().unwrap_or_default();
            hot.push(HotPath {
                description: format!(
                    "{} reached through {} frame(s), {:.1}% of samples in {} occurrence(s)",
                    leaf,
                    stats.path.len(),
                    percentage,
                    stats.occurrences
                ),
                path: stats.path,
                percentage,
                occurrences: stats.occurrences,
            });
        }
        hot
    }

    /// Allocation ranking and leak detection.
    ///
    /// Returns `None` when the profile lacks an allocated or in-use stream.
    pub fn analyze_memory(&self, set: &SampleSet) -> Option<MemoryAnalysis> {
        let alloc_idx = set.value_index(ALLOC_SPACE)?;
        let inuse_idx = set.value_index(INUSE_SPACE)?;
        let objects_idx = set.value_index(ALLOC_OBJECTS);

        let total_allocated = set.total(alloc_idx);
        let mut functions: FxHashMap<String, FunctionStats> = FxHashMap::default();
        let mut allocations: FxHashMap<String, AllocationStats> = FxHashMap::default();

        for sample in set.samples() {
            let allocated = sample.values[alloc_idx];
            let frames: Vec<&str> = sample
                .frames
                .iter()
                .map(|f| clean_function_name(f))
                .collect();
            attribute(&mut functions, &frames, allocated);

            if let Some(leaf) = frames.first() {
                let entry = allocations.entry(leaf.to_string()).or_default();
                entry.allocated += allocated;
                entry.in_use += sample.values[inuse_idx];
                if let Some(idx) = objects_idx {
                    entry.objects += sample.values[idx];
                }
            }
        }

        let leaks = detect_leaks(
            allocations.iter().map(|(name, stats)| (name.as_str(), stats)),
            &self.thresholds,
        );

        Some(MemoryAnalysis {
            total_allocated,
            top_functions: rank_functions(functions, total_allocated, self.thresholds.top_functions),
            leaks,
        })
    }
}

/// Credit `value` to the leaf as flat and to every frame as cumulative.
///
/// A function that appears more than once on a stack is credited once per
/// appearance.
fn attribute(functions: &mut FxHashMap<String, FunctionStats>, frames: &[&str], value: i64) {
    let Some(leaf) = frames.first() else {
        return;
    };
    functions.entry(leaf.to_string()).or_default().flat += value;
    for frame in frames {
        functions.entry(frame.to_string()).or_default().cum += value;
    }
}

fn rank_functions(
    functions: FxHashMap<String, FunctionStats>,
    total: i64,
    limit: usize,
) -> Vec<FunctionProfile> {
    let mut ranked: Vec<(String, FunctionStats)> = functions.into_iter().collect();
    ranked.sort_by(|a, b| b.1.flat.cmp(&a.1.flat).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(name, stats)| FunctionProfile {
            name,
            flat_percent: percent(stats.flat, total),
            cum_percent: percent(stats.cum, total),
            flat_value: stats.flat,
            cum_value: stats.cum,
        })
        .collect()
}

fn percent(value: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / total as f64 * 100.0
    }
}
