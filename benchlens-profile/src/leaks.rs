//! Leak Heuristic
//!
//! Flags functions that allocate far more than they keep alive. This is a
//! heuristic, not a proof of leakage: a high allocated/in-use ratio is just
//! as typical of legitimate short-lived churn (buffers, temporary strings)
//! as of retention. Findings are leads to inspect, nothing more.

use crate::thresholds::AnalysisThresholds;
use benchlens_report::{MemoryLeak, Severity, format_bytes};

/// Allocation totals for one function across its samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Bytes allocated over the profile's lifetime
    pub allocated: i64,
    /// Bytes still live at snapshot time
    pub in_use: i64,
    /// Objects allocated, 0 when the profile has no object stream
    pub objects: i64,
}

/// Severity bucket for an allocated-byte total
pub fn leak_severity(allocated: i64, thresholds: &AnalysisThresholds) -> Severity {
    if allocated >= thresholds.leak_high_bytes {
        Severity::High
    } else if allocated >= thresholds.leak_medium_bytes {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn is_candidate(stats: &AllocationStats, thresholds: &AnalysisThresholds) -> bool {
    stats.allocated as f64 > thresholds.leak_ratio * stats.in_use as f64
        && stats.allocated > thresholds.leak_min_bytes
}

/// Rank leak candidates: severity first, then allocated bytes, both descending.
pub fn detect_leaks<'a>(
    per_function: impl IntoIterator<Item = (&'a str, &'a AllocationStats)>,
    thresholds: &AnalysisThresholds,
) -> Vec<MemoryLeak> {
    let mut leaks: Vec<MemoryLeak> = per_function
        .into_iter()
        .filter(|(_, stats)| is_candidate(stats, thresholds))
        .map(|(function, stats)| MemoryLeak {
            function: function.to_string(),
            allocations: stats.objects,
            bytes: stats.allocated,
            severity: leak_severity(stats.allocated, thresholds),
            description: describe(function, stats),
        })
        .collect();

    leaks.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.bytes.cmp(&a.bytes))
            .then_with(|| a.function.cmp(&b.function))
    });
    leaks.truncate(thresholds.max_leaks);
    leaks
}

fn describe(function: &str, stats: &AllocationStats) -> String {
    let retained = if stats.in_use > 0 {
        format!(
            "{:.1}x more than the {} still in use",
            stats.allocated as f64 / stats.in_use as f64,
            format_bytes(stats.in_use)
        )
    } else {
        "none of it still in use".to_string()
    };
    format!(
        "{} allocated {}, {}; possible retention or heavy allocation churn",
        function,
        format_bytes(stats.allocated),
        retained
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: i64 = 1024 * 1024;

    fn stats(allocated: i64, in_use: i64) -> AllocationStats {
        AllocationStats {
            allocated,
            in_use,
            objects: 0,
        }
    }

    #[test]
    fn test_ten_mib_retaining_one_is_high() {
        let t = AnalysisThresholds::default();
        let s = stats(10 * MIB, MIB);
        let leaks = detect_leaks([("pkg.fill", &s)], &t);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].function, "pkg.fill");
        assert_eq!(leaks[0].severity, Severity::High);
        assert_eq!(leaks[0].bytes, 10 * MIB);
    }

    #[test]
    fn test_ratio_below_two_is_not_a_leak() {
        let t = AnalysisThresholds::default();
        let s = stats(MIB + MIB / 2, MIB);
        assert!(detect_leaks([("pkg.grow", &s)], &t).is_empty());
    }

    #[test]
    fn test_small_allocations_ignored() {
        let t = AnalysisThresholds::default();
        let s = stats(MIB, 0);
        assert!(detect_leaks([("pkg.tiny", &s)], &t).is_empty());
    }

    #[test]
    fn test_severity_buckets() {
        let t = AnalysisThresholds::default();
        assert_eq!(leak_severity(2 * MIB, &t), Severity::Low);
        assert_eq!(leak_severity(5 * MIB, &t), Severity::Medium);
        assert_eq!(leak_severity(9 * MIB, &t), Severity::Medium);
        assert_eq!(leak_severity(10 * MIB, &t), Severity::High);
    }

    #[test]
    fn test_sorted_by_severity_then_bytes_and_capped() {
        let t = AnalysisThresholds::default();
        let entries = [
            ("low", stats(2 * MIB, 0)),
            ("medium", stats(6 * MIB, 0)),
            ("high_small", stats(11 * MIB, 0)),
            ("high_big", stats(40 * MIB, 0)),
            ("low_big", stats(4 * MIB, 0)),
            ("medium_big", stats(8 * MIB, 0)),
        ];
        let leaks = detect_leaks(entries.iter().map(|(n, s)| (*n, s)), &t);
        let names: Vec<_> = leaks.iter().map(|l| l.function.as_str()).collect();
        assert_eq!(
            names,
            vec!["high_big", "high_small", "medium_big", "medium", "low_big"]
        );
    }
}
