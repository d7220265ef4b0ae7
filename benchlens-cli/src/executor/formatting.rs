//! Output Formatting
//!
//! Human-readable output formatting for benchmark runs.
//!
//! Generates terminal-friendly output with:
//! - Run header (id, package, toolchain, duration)
//! - A result table with per-op time, throughput and allocations
//! - Profile findings: hot functions, hot paths, leak candidates and
//!   suggestions

use benchlens_report::{BenchmarkRun, ProfileSummary, format_bytes, format_duration};

/// Format a run for human-readable terminal display
pub fn format_human_output(run: &BenchmarkRun) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("benchlens Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!("Run:       {}\n", run.id));
    output.push_str(&format!("Package:   {}\n", run.package_path));
    output.push_str(&format!("Toolchain: {}\n", run.toolchain_version));
    output.push_str(&format!(
        "Duration:  {}\n\n",
        format_duration(run.duration.as_nanos() as f64)
    ));

    let name_width = run
        .results
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(9)
        .max(9);

    output.push_str(&format!(
        "  {:<width$}  {:>12}  {:>14}  {:>12}  {:>12}\n",
        "Benchmark",
        "Iterations",
        "Time/op",
        "Bytes/op",
        "Allocs/op",
        width = name_width
    ));
    output.push_str(&format!("  {}\n", "-".repeat(name_width + 60)));

    for result in &run.results {
        output.push_str(&format!(
            "  {:<width$}  {:>12}  {:>14}  {:>12}  {:>12}\n",
            result.name,
            result.iterations,
            format_duration(result.ns_per_op),
            format_bytes(result.bytes_per_op as i64),
            result.allocs_per_op,
            width = name_width
        ));
        if result.mb_per_sec > 0.0 {
            output.push_str(&format!(
                "  {:<width$}  throughput: {:.2} MB/s\n",
                "",
                result.mb_per_sec,
                width = name_width
            ));
        }
    }

    if let Some(path) = &run.cpu_profile_ref {
        output.push_str(&format!("\nCPU profile:    {}\n", path.display()));
    }
    if let Some(path) = &run.memory_profile_ref {
        output.push_str(&format!("Memory profile: {}\n", path.display()));
    }

    if let Some(summary) = &run.profile_summary {
        output.push_str(&format_profile_summary(summary));
    }

    output
}

/// Format profile findings
pub fn format_profile_summary(summary: &ProfileSummary) -> String {
    let mut output = String::new();

    if summary.is_empty() {
        output.push_str("\nNo profile findings.\n");
        return output;
    }

    if !summary.cpu_top_functions.is_empty() {
        output.push_str("\nTop CPU Functions\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "  {:>7}  {:>7}  {}\n",
            "flat%", "cum%", "function"
        ));
        for f in &summary.cpu_top_functions {
            output.push_str(&format!(
                "  {:>6.2}%  {:>6.2}%  {}\n",
                f.flat_percent, f.cum_percent, f.name
            ));
        }
        output.push_str(&format!(
            "  total samples: {}\n",
            summary.total_cpu_samples
        ));
    }

    if !summary.hot_paths.is_empty() {
        output.push_str("\nHot Paths\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for path in &summary.hot_paths {
            output.push_str(&format!(
                "  {:>6.2}%  {}\n",
                path.percentage,
                path.path.join(" → ")
            ));
        }
    }

    if !summary.memory_top_functions.is_empty() {
        output.push_str("\nTop Allocators\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for f in &summary.memory_top_functions {
            output.push_str(&format!(
                "  {:>6.2}%  {:>12}  {}\n",
                f.flat_percent,
                format_bytes(f.flat_value),
                f.name
            ));
        }
        output.push_str(&format!(
            "  total allocated: {}\n",
            format_bytes(summary.total_memory_bytes)
        ));
    }

    if !summary.memory_leaks.is_empty() {
        output.push_str("\nPossible Leaks\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for leak in &summary.memory_leaks {
            output.push_str(&format!(
                "  [{}] {}: {}\n",
                leak.severity, leak.function, leak.description
            ));
        }
    }

    if !summary.suggestions.is_empty() {
        output.push_str("\nSuggestions\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for s in &summary.suggestions {
            output.push_str(&format!(
                "  [{}/{}] {}: {}\n",
                s.kind, s.severity, s.function, s.issue
            ));
            output.push_str(&format!("      {}\n", s.suggestion));
            output.push_str(&format!("      impact: {}\n", s.impact));
        }
    }

    output
}
