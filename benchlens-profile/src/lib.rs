#![warn(missing_docs)]
//! benchlens Profile - Sample-Set Analysis
//!
//! Decodes pprof profiles and derives ranked, actionable findings:
//! - **Hot functions**: flat and cumulative share per function
//! - **Hot paths**: call stacks carrying a disproportionate share of samples
//! - **Leak candidates**: functions allocating far more than they retain
//! - **Suggestions**: templated hints triggered by the findings above

mod analyzer;
mod error;
mod leaks;
mod names;
pub mod proto;
mod sample_set;
mod suggestions;
mod thresholds;

pub use analyzer::{CpuAnalysis, MemoryAnalysis, ProfileAnalyzer};
pub use error::AnalysisError;
pub use leaks::{AllocationStats, detect_leaks, leak_severity};
pub use names::clean_function_name;
pub use sample_set::{SampleSet, StackSample, ValueType};
pub use suggestions::generate_suggestions;
pub use thresholds::AnalysisThresholds;

use benchlens_report::ProfileSummary;

/// Decode raw profile bytes and analyze them in one step
pub fn analyze_profiles(
    analyzer: &ProfileAnalyzer,
    cpu: Option<&[u8]>,
    memory: Option<&[u8]>,
) -> Result<ProfileSummary, AnalysisError> {
    let cpu = cpu.map(SampleSet::decode).transpose()?;
    let memory = memory.map(SampleSet::decode).transpose()?;
    Ok(analyzer.analyze(cpu.as_ref(), memory.as_ref()))
}
