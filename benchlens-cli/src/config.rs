//! Configuration loading from benchlens.toml
//!
//! benchlens configuration can be specified in a `benchlens.toml` file in the
//! project root. The configuration is automatically discovered by walking up
//! from the current directory. Command-line flags override file values.

use benchlens_profile::AnalysisThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// benchlens configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchlensConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Profile capture configuration
    #[serde(default)]
    pub profile: ProfileConfig,
    /// Analysis heuristics
    #[serde(default)]
    pub analysis: AnalysisThresholds,
    /// Run storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// How benchmarks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Delegate to `go test -bench` (default)
    #[default]
    Process,
    /// Generate, compile and run a dedicated harness program
    Direct,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Process => "process",
            Strategy::Direct => "direct",
        })
    }
}

/// Runner configuration for benchmark execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Toolchain executable
    #[serde(default = "default_toolchain")]
    pub toolchain: String,
    /// Package path to benchmark; a trailing `/...` recurses
    #[serde(default = "default_package")]
    pub package: String,
    /// Run time per benchmark (e.g., "1s", "500ms", "100x")
    #[serde(default)]
    pub benchtime: Option<String>,
    /// Repetitions per benchmark
    #[serde(default)]
    pub count: Option<u32>,
    /// Comma-separated GOMAXPROCS values (e.g., "1,2,4")
    #[serde(default)]
    pub cpu: Option<String>,
    /// Report allocation statistics
    #[serde(default = "default_benchmem")]
    pub benchmem: bool,
    /// Execution strategy: "process" or "direct"
    #[serde(default)]
    pub strategy: Strategy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            toolchain: default_toolchain(),
            package: default_package(),
            benchtime: None,
            count: None,
            cpu: None,
            benchmem: default_benchmem(),
            strategy: Strategy::default(),
        }
    }
}

fn default_toolchain() -> String {
    "go".to_string()
}
fn default_package() -> String {
    ".".to_string()
}
fn default_benchmem() -> bool {
    true
}

/// Profile capture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Comma-separated profile kinds: "cpu", "mem"
    #[serde(default)]
    pub modes: String,
}

/// Run storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding saved runs and profiles
    #[serde(default = "default_storage_dir")]
    pub directory: String,
    /// Save each run after it completes
    #[serde(default = "default_save")]
    pub save: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
            save: default_save(),
        }
    }
}

fn default_storage_dir() -> String {
    ".benchlens".to_string()
}
fn default_save() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

/// A parsed `-benchtime` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchTime {
    /// Target wall time per benchmark, in nanoseconds
    Duration(u64),
    /// Exact iteration count (`100x`)
    Iterations(u64),
}

impl BenchlensConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(&dir)
    }

    /// Walk up from `start` looking for `benchlens.toml`
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join("benchlens.toml");
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "loaded configuration");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "ignoring invalid {}: {}",
                            config_path.display(),
                            e
                        );
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# benchlens Configuration

[runner]
# Toolchain executable
toolchain = "go"
# Package to benchmark; "./..." includes every subpackage
package = "."
# Run time per benchmark, or an exact iteration count like "100x" (uncomment to enable)
# benchtime = "1s"
# Repetitions per benchmark (uncomment to enable)
# count = 5
# GOMAXPROCS values to run each benchmark with (uncomment to enable)
# cpu = "1,2,4"
# Report allocation statistics
benchmem = true
# Execution strategy: "process" (go test) or "direct" (generated harness)
strategy = "process"

[profile]
# Profiles to capture: "cpu", "mem", or "cpu,mem"; empty disables profiling
modes = ""

[analysis]
# Functions listed per profile
top_functions = 10
# Hot paths below this share of CPU samples are dropped
hot_path_min_percent = 5.0
max_hot_paths = 5
# Allocated bytes must exceed in-use bytes by this factor to flag a leak
leak_ratio = 2.0
leak_min_bytes = 1048576
leak_medium_bytes = 5242880
leak_high_bytes = 10485760
max_leaks = 5
# Suggestion triggers, in percent
cpu_hotspot_percent = 30.0
memory_hotspot_percent = 40.0
hot_path_suggestion_percent = 25.0

[storage]
# Where runs and profiles are saved
directory = ".benchlens"
save = true

[output]
# Default output format: human or json
format = "human"
"#
        .to_string()
    }

    /// Parse a `-benchtime` value (e.g., "3s", "500ms", "2m", "100x")
    pub fn parse_benchtime(s: &str) -> anyhow::Result<BenchTime> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty benchtime string"));
        }

        if let Some(count) = s.strip_suffix('x') {
            let n: u64 = count
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid iteration count: {}", count))?;
            if n == 0 {
                return Err(anyhow::anyhow!("Iteration count must be positive"));
            }
            return Ok(BenchTime::Iterations(n));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, ""));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let multiplier: u64 = match unit_part {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(anyhow::anyhow!("Missing unit in duration: {}", s)),
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(BenchTime::Duration((value * multiplier as f64) as u64))
    }

    /// Parse a comma-separated GOMAXPROCS list (e.g., "1,2,4")
    pub fn parse_cpu_list(s: &str) -> anyhow::Result<Vec<u32>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(anyhow::anyhow!("Invalid cpu count: {}", part)),
            })
            .collect()
    }
}
