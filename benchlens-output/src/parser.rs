//! Benchmark Result Line Parsing
//!
//! Recognizes the line shape printed by `go test -bench` and by the
//! direct-execution harness:
//!
//! ```text
//! BenchmarkName-8   1000   100.0 ns/op   12.50 MB/s   64 B/op   1 allocs/op
//! └─ name ───────┘  └ N ┘  └ time ───┘   └ optional fields, fixed order ┘
//! ```
//!
//! Everything else (`PASS`, `goos: linux`, `ok pkg 1.2s`) is ignored.

use benchlens_report::BenchmarkResult;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;
use thiserror::Error;

/// Number of non-result lines retained for diagnostics
pub const TAIL_LINES: usize = 20;

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Benchmark(?P<name>\S+)\s+(?P<iters>\d+)\s+(?P<value>\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)\s+(?P<unit>ns|us|µs|ms|s)/op(?:\s+(?P<mbs>\S+)\s+MB/s)?(?:\s+(?P<bytes>\S+)\s+B/op)?(?:\s+(?P<allocs>\S+)\s+allocs/op)?",
    )
    .expect("result line regex is valid")
});

/// Errors from batch parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no benchmark results found in output")]
    NoResultsFound,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Parse a single line, returning `None` for anything that is not a result.
pub fn parse_line(line: &str) -> Option<BenchmarkResult> {
    let caps = RESULT_LINE.captures(line.trim())?;

    let iterations: u64 = caps["iters"].parse().ok()?;
    let value: f64 = caps["value"].parse().ok()?;
    let ns_per_op = value * unit_to_nanos(&caps["unit"]);

    // Optional fields degrade to zero; the timing is still valid
    let mb_per_sec = caps
        .name("mbs")
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    let bytes_per_op = caps
        .name("bytes")
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);
    let allocs_per_op = caps
        .name("allocs")
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);

    Some(BenchmarkResult {
        name: caps["name"].to_string(),
        iterations,
        ns_per_op,
        bytes_per_op,
        allocs_per_op,
        mb_per_sec,
    })
}

fn unit_to_nanos(unit: &str) -> f64 {
    match unit {
        "us" | "µs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        _ => 1.0,
    }
}

/// Parse a complete output blob.
///
/// Fails with [`ParseError::NoResultsFound`] when no line matched.
pub fn parse_output(text: &str) -> Result<Vec<BenchmarkResult>, ParseError> {
    let results: Vec<_> = text.lines().filter_map(parse_line).collect();
    if results.is_empty() {
        return Err(ParseError::NoResultsFound);
    }
    Ok(results)
}

type ResultCallback<'a> = Box<dyn FnMut(&BenchmarkResult) + Send + 'a>;
type VerboseSink<'a> = Box<dyn Write + Send + 'a>;

/// Streaming parser over a live pipe.
///
/// The result callback and the verbose passthrough are independent and
/// can be combined.
#[derive(Default)]
pub struct OutputParser<'a> {
    on_result: Option<ResultCallback<'a>>,
    verbose: Option<VerboseSink<'a>>,
    tail: VecDeque<String>,
}

impl<'a> OutputParser<'a> {
    /// Parser with no callback and no passthrough
    pub fn new() -> Self {
        Self {
            on_result: None,
            verbose: None,
            tail: VecDeque::with_capacity(TAIL_LINES),
        }
    }

    /// Invoke `callback` once per parsed result, as soon as its line arrives
    pub fn on_result(mut self, callback: impl FnMut(&BenchmarkResult) + Send + 'a) -> Self {
        self.on_result = Some(Box::new(callback));
        self
    }

    /// Copy every raw line, matching or not, to `sink`
    pub fn verbose(mut self, sink: impl Write + Send + 'a) -> Self {
        self.verbose = Some(Box::new(sink));
        self
    }

    /// Process one line of output
    pub fn feed_line(&mut self, line: &str) -> io::Result<Option<BenchmarkResult>> {
        if let Some(sink) = self.verbose.as_mut() {
            writeln!(sink, "{}", line)?;
            sink.flush()?;
        }

        match parse_line(line) {
            Some(result) => {
                if let Some(callback) = self.on_result.as_mut() {
                    callback(&result);
                }
                Ok(Some(result))
            }
            None => {
                if !line.trim().is_empty() {
                    if self.tail.len() == TAIL_LINES {
                        self.tail.pop_front();
                    }
                    self.tail.push_back(line.to_string());
                }
                Ok(None)
            }
        }
    }

    /// Drain `reader` to end of stream, returning every parsed result.
    ///
    /// Invalid UTF-8 is replaced rather than treated as an error.
    pub fn stream<R: BufRead>(&mut self, mut reader: R) -> io::Result<Vec<BenchmarkResult>> {
        let mut results = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(result) = self.feed_line(line)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// The most recent non-result lines, oldest first
    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.tail.iter().map(String::as_str)
    }
}
