//! Suggestion Rules
//!
//! Independent, additive rules over an already-built summary. Rules never
//! suppress each other; a summary can yield anywhere from zero to several
//! suggestions.

use crate::thresholds::AnalysisThresholds;
use benchlens_report::{ProfileSummary, Severity, Suggestion, SuggestionKind, format_bytes};

/// Apply every rule to `summary`
pub fn generate_suggestions(
    summary: &ProfileSummary,
    thresholds: &AnalysisThresholds,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if let Some(top) = summary.cpu_top_functions.first() {
        if top.flat_percent > thresholds.cpu_hotspot_percent {
            suggestions.push(Suggestion {
                kind: SuggestionKind::Cpu,
                severity: Severity::High,
                function: top.name.clone(),
                issue: format!(
                    "{} spends {:.1}% of CPU time in its own body",
                    top.name, top.flat_percent
                ),
                suggestion: "Look for redundant work inside the function: hoist loop-invariant \
                             computation, cache repeated results, or switch to a cheaper algorithm."
                    .to_string(),
                impact: format!("Up to {:.1}% reduction in CPU time", top.flat_percent),
            });
        }
    }

    if let Some(top) = summary.memory_top_functions.first() {
        if top.flat_percent > thresholds.memory_hotspot_percent {
            suggestions.push(Suggestion {
                kind: SuggestionKind::Memory,
                severity: Severity::High,
                function: top.name.clone(),
                issue: format!(
                    "{} performs {:.1}% of all allocated bytes",
                    top.name, top.flat_percent
                ),
                suggestion: "Reuse buffers (sync.Pool or caller-owned scratch space), preallocate \
                             slices and maps to their final capacity, and avoid string/[]byte \
                             conversions on hot paths."
                    .to_string(),
                impact: format!(
                    "Up to {:.1}% fewer allocated bytes and less GC pressure",
                    top.flat_percent
                ),
            });
        }
    }

    for leak in summary
        .memory_leaks
        .iter()
        .filter(|l| l.severity == Severity::High)
    {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Memory,
            severity: Severity::High,
            function: leak.function.clone(),
            issue: leak.description.clone(),
            suggestion: "Check whether allocations outlive their use: caches without eviction, \
                         goroutines holding references, or slices and maps that only grow."
                .to_string(),
            impact: format!("{} allocated by this function", format_bytes(leak.bytes)),
        });
    }

    if let Some(path) = summary.hot_paths.first() {
        if path.percentage > thresholds.hot_path_suggestion_percent {
            let leaf = path.path.last().cloned().unwrap_or_default();
            suggestions.push(Suggestion {
                kind: SuggestionKind::Algorithm,
                severity: Severity::Medium,
                function: leaf,
                issue: format!(
                    "A single call path carries {:.1}% of samples: {}",
                    path.percentage,
                    path.path.join(" → ")
                ),
                suggestion: "Review the algorithm along this path: batch work, shorten the call \
                             chain, or replace repeated lookups with a precomputed structure."
                    .to_string(),
                impact: format!(
                    "Up to {:.1}% of CPU time concentrated on one path",
                    path.percentage
                ),
            });
        }
    }

    suggestions
}
