//! JSON Output

use crate::model::{BenchmarkRun, ProfileSummary};

/// Generate a prettified JSON document for a run.
pub fn generate_json_report(run: &BenchmarkRun) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(run)
}

/// Generate a prettified JSON document for a standalone profile summary.
pub fn generate_json_summary(summary: &ProfileSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}

/// Parse a run previously written with [`generate_json_report`].
pub fn parse_json_report(json: &str) -> Result<BenchmarkRun, serde_json::Error> {
    serde_json::from_str(json)
}
