//! Source Scanner
//!
//! Finds benchmark functions in Go source without compiling it. A function
//! qualifies when it is declared at top level as `func Benchmark<X>(b
//! *testing.B)` with `X` not starting with a lowercase letter, which is the
//! rule `go test` applies.

use super::error::ExecutionError;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

const BENCHMARK_PREFIX: &str = "Benchmark";

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^package\s+(?P<name>\w+)").expect("package clause regex")
});

static BENCH_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+(?P<name>Benchmark\w*)\s*\(\s*(?:\w+\s+)?\*testing\.B\s*\)")
        .expect("benchmark func regex")
});

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex"));

/// A benchmark function found in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkFunc {
    /// Full function name, including the `Benchmark` prefix
    pub name: String,
    /// Package clause name
    pub package: String,
    /// Directory of the package
    pub dir: PathBuf,
    /// Declaring file
    pub file: PathBuf,
    /// 1-based line of the declaration
    pub line: usize,
    /// Declared in a `_test.go` file, which only `go test` can compile
    pub in_test_file: bool,
}

impl BenchmarkFunc {
    /// Whether a separately built program can import this function
    pub fn is_importable(&self) -> bool {
        !self.in_test_file
    }
}

/// Extract the package name and `(function, line)` pairs from one Go file
pub fn scan_source(text: &str) -> (Option<String>, Vec<(String, usize)>) {
    // Blank out block comments but keep their newlines so line numbers hold
    let stripped = BLOCK_COMMENT_RE.replace_all(text, |caps: &regex::Captures| {
        caps[0].chars().filter(|&c| c == '\n').collect::<String>()
    });

    let package = PACKAGE_RE
        .captures(&stripped)
        .map(|caps| caps["name"].to_string());

    let funcs = BENCH_FUNC_RE
        .captures_iter(&stripped)
        .filter_map(|caps| {
            let m = caps.name("name")?;
            let name = m.as_str();
            let rest = &name[BENCHMARK_PREFIX.len()..];
            if rest.chars().next().is_some_and(char::is_lowercase) {
                return None;
            }
            let line = stripped[..m.start()].matches('\n').count() + 1;
            Some((name.to_string(), line))
        })
        .collect();

    (package, funcs)
}

/// Keep the functions whose full or unprefixed name matches `pattern`.
///
/// An empty result is `NoBenchmarksFound`.
pub fn filter_benchmarks(
    funcs: Vec<BenchmarkFunc>,
    pattern: &str,
) -> Result<Vec<BenchmarkFunc>, ExecutionError> {
    let re = Regex::new(pattern).map_err(|source| ExecutionError::InvalidFilter {
        pattern: pattern.to_string(),
        source,
    })?;

    let selected: Vec<_> = funcs
        .into_iter()
        .filter(|f| {
            let bare = f.name.strip_prefix(BENCHMARK_PREFIX).unwrap_or(&f.name);
            re.is_match(&f.name) || re.is_match(bare)
        })
        .collect();

    if selected.is_empty() {
        return Err(ExecutionError::NoBenchmarksFound {
            filter: pattern.to_string(),
        });
    }
    Ok(selected)
}

/// Walks package directories relative to a working directory
#[derive(Debug, Clone)]
pub struct SourceScanner {
    work_dir: PathBuf,
}

impl SourceScanner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Directories named by a package path; `dir/...` expands recursively
    pub fn package_dirs(&self, package: &str) -> Result<Vec<PathBuf>, ExecutionError> {
        let (base, recursive) = match package.strip_suffix("...") {
            Some(prefix) if prefix.is_empty() || prefix.ends_with('/') => {
                (self.work_dir.join(prefix.trim_end_matches('/')), true)
            }
            _ => (self.work_dir.join(package), false),
        };

        if !base.is_dir() {
            return Err(ExecutionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("package directory not found: {}", base.display()),
            )));
        }
        if !recursive {
            return Ok(vec![base]);
        }

        let mut dirs = Vec::new();
        let walker = WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry.path()));
        for entry in walker {
            let entry = entry.map_err(|e| ExecutionError::Io(e.into()))?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    /// Every benchmark under `package`, coalesced by name in path order
    pub fn scan(&self, package: &str) -> Result<Vec<BenchmarkFunc>, ExecutionError> {
        let mut files = Vec::new();
        for dir in self.package_dirs(package)? {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if is_scannable(&path) {
                    files.push((dir.clone(), path));
                }
            }
        }
        files.sort();

        let scanned = files
            .par_iter()
            .map(|(dir, path)| {
                let text = std::fs::read_to_string(path)?;
                Ok((dir, path, scan_source(&text)))
            })
            .collect::<Result<Vec<_>, std::io::Error>>()?;

        let mut seen = HashSet::new();
        let mut funcs = Vec::new();
        for (dir, path, (package_name, found)) in scanned {
            let Some(package_name) = package_name else {
                continue;
            };
            for (name, line) in found {
                if !seen.insert(name.clone()) {
                    debug!(%name, file = %path.display(), "duplicate benchmark ignored");
                    continue;
                }
                funcs.push(BenchmarkFunc {
                    name,
                    package: package_name.clone(),
                    dir: dir.clone(),
                    file: path.clone(),
                    line,
                    in_test_file: is_test_file(path),
                });
            }
        }

        debug!(files = files.len(), benchmarks = funcs.len(), "source scan complete");
        Ok(funcs)
    }
}

/// Directories the go tool skips when expanding `./...`
fn is_ignored_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            name.starts_with('.') || name.starts_with('_') || name == "testdata" || name == "vendor"
        })
}

fn is_scannable(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "go")
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_test.go"))
}
