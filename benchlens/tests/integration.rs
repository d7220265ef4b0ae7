//! Integration tests for benchlens
//!
//! These tests drive the pipeline end to end without a Go toolchain: result
//! text is fed to the parser, synthetic pprof profiles are built with prost
//! and gzipped the way the Go runtime writes them, and a stand-in toolchain
//! script plays the part of `go test`.

use benchlens::{
    BenchmarkRun, CaptureWarning, DirectExecutor, ExecutionError, FileStore, ProcessExecutor,
    ProfileAnalyzer, ProfileKind, RunOptions, RunStore, Severity, SuggestionKind,
    analyze_profiles, format_human_output, parse_output,
};
use benchlens_profile::proto;
use flate2::Compression;
use flate2::write::GzEncoder;
use prost::Message;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

const MIB: i64 = 1024 * 1024;

/// Builds pprof profiles with one location per function
#[derive(Default)]
struct ProfileBuilder {
    profile: proto::Profile,
    strings: HashMap<String, i64>,
    locations: HashMap<String, u64>,
}

impl ProfileBuilder {
    fn new(types: &[(&str, &str)]) -> Self {
        let mut builder = Self::default();
        builder.intern("");
        for (kind, unit) in types {
            let vt = proto::ValueType {
                r#type: builder.intern(kind),
                unit: builder.intern(unit),
            };
            builder.profile.sample_type.push(vt);
        }
        builder
    }

    fn intern(&mut self, s: &str) -> i64 {
        if let Some(&idx) = self.strings.get(s) {
            return idx;
        }
        let idx = self.profile.string_table.len() as i64;
        self.profile.string_table.push(s.to_string());
        self.strings.insert(s.to_string(), idx);
        idx
    }

    fn location(&mut self, function: &str) -> u64 {
        if let Some(&id) = self.locations.get(function) {
            return id;
        }
        let id = self.profile.location.len() as u64 + 1;
        let name = self.intern(function);
        self.profile.function.push(proto::Function {
            id,
            name,
            system_name: name,
            ..Default::default()
        });
        self.profile.location.push(proto::Location {
            id,
            address: 0x1000 + id,
            line: vec![proto::Line {
                function_id: id,
                line: 1,
            }],
            ..Default::default()
        });
        self.locations.insert(function.to_string(), id);
        id
    }

    /// `stack` is leaf first, as pprof stores it
    fn sample(mut self, stack: &[&str], value: Vec<i64>) -> Self {
        let location_id = stack.iter().map(|f| self.location(f)).collect();
        self.profile.sample.push(proto::Sample { location_id, value });
        self
    }

    fn gzipped(self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&self.profile.encode_to_vec())
            .unwrap();
        encoder.finish().unwrap()
    }
}

fn cpu_profile() -> Vec<u8> {
    ProfileBuilder::new(&[("samples", "count"), ("cpu", "nanoseconds")])
        .sample(
            &[
                "github.com/acme/lens/codec.encodeBlock",
                "github.com/acme/lens/codec.(*Encoder).Encode",
                "main.run",
            ],
            vec![35, 350_000_000],
        )
        .sample(
            &[
                "runtime.mallocgc",
                "github.com/acme/lens/codec.(*Encoder).Encode",
                "main.run",
            ],
            vec![25, 250_000_000],
        )
        .sample(
            &["github.com/acme/lens/codec.checksum", "main.run"],
            vec![20, 200_000_000],
        )
        .sample(&["runtime.memmove", "main.run"], vec![20, 200_000_000])
        .gzipped()
}

fn heap_profile() -> Vec<u8> {
    ProfileBuilder::new(&[
        ("alloc_objects", "count"),
        ("alloc_space", "bytes"),
        ("inuse_objects", "count"),
        ("inuse_space", "bytes"),
    ])
    .sample(
        &["github.com/acme/lens/cache.(*Cache).fill", "main.run"],
        vec![100, 20 * MIB, 5, MIB],
    )
    .sample(
        &["github.com/acme/lens/codec.encodeBlock", "main.run"],
        vec![40, 4 * MIB, 30, 3 * MIB],
    )
    .gzipped()
}

/// Test realistic `go test -bench` output end to end through the parser
#[test]
fn test_parse_go_test_output() {
    let output = "goos: linux\n\
                  goarch: amd64\n\
                  pkg: github.com/acme/lens/codec\n\
                  cpu: AMD Ryzen 9 7950X 16-Core Processor\n\
                  BenchmarkEncode-32         \t 1000000\t      1043 ns/op\t 981.78 MB/s\t     256 B/op\t       4 allocs/op\n\
                  BenchmarkDecode/small-32   \t 5000000\t     241.5 ns/op\t      32 B/op\t       1 allocs/op\n\
                  PASS\n\
                  ok  \tgithub.com/acme/lens/codec\t3.012s\n";

    let results = parse_output(output).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Encode-32");
    assert_eq!(results[0].mb_per_sec, 981.78);
    assert_eq!(results[0].allocs_per_op, 4);
    assert_eq!(results[1].name, "Decode/small-32");
    assert_eq!(results[1].ns_per_op, 241.5);
    assert_eq!(results[1].mb_per_sec, 0.0);
    assert_eq!(results[1].bytes_per_op, 32);
}

/// Test analysis of gzipped CPU and heap profiles
#[test]
fn test_analyze_gzipped_profiles() {
    let cpu = cpu_profile();
    let heap = heap_profile();
    let summary =
        analyze_profiles(&ProfileAnalyzer::default(), Some(cpu.as_slice()), Some(heap.as_slice()))
            .unwrap();

    assert_eq!(summary.total_cpu_samples, 100);
    let top = &summary.cpu_top_functions[0];
    assert_eq!(top.name, "codec.encodeBlock");
    assert_eq!(top.flat_percent, 35.0);
    let encode = summary
        .cpu_top_functions
        .iter()
        .find(|f| f.name == "codec.(*Encoder).Encode")
        .unwrap();
    assert_eq!(encode.flat_value, 0);
    assert_eq!(encode.cum_percent, 60.0);

    let hottest = &summary.hot_paths[0];
    assert_eq!(
        hottest.path,
        vec!["main.run", "codec.(*Encoder).Encode", "codec.encodeBlock"]
    );
    assert_eq!(hottest.percentage, 35.0);
    assert!(summary.hot_paths.len() <= 5);

    assert_eq!(summary.total_memory_bytes, 24 * MIB);
    assert_eq!(summary.memory_top_functions[0].name, "cache.(*Cache).fill");
    assert_eq!(summary.memory_leaks.len(), 1);
    assert_eq!(summary.memory_leaks[0].function, "cache.(*Cache).fill");
    assert_eq!(summary.memory_leaks[0].severity, Severity::High);
    assert_eq!(summary.memory_leaks[0].allocations, 100);

    let count = |kind: SuggestionKind, severity: Severity| {
        summary
            .suggestions
            .iter()
            .filter(|s| s.kind == kind && s.severity == severity)
            .count()
    };
    assert_eq!(count(SuggestionKind::Cpu, Severity::High), 1);
    assert_eq!(count(SuggestionKind::Memory, Severity::High), 2);
    assert_eq!(count(SuggestionKind::Algorithm, Severity::Medium), 1);
    assert_eq!(summary.suggestions.len(), 4);
}

/// Test that a CPU-only capture still yields a summary
#[test]
fn test_analyze_cpu_only() {
    let cpu = cpu_profile();
    let summary = analyze_profiles(&ProfileAnalyzer::default(), Some(cpu.as_slice()), None).unwrap();
    assert!(summary.memory_top_functions.is_empty());
    assert!(summary.memory_leaks.is_empty());
    assert!(!summary.cpu_top_functions.is_empty());
}

#[cfg(unix)]
fn fake_toolchain(dir: &Path, stdout: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let cpu = dir.join("fixture-cpu.pprof");
    let heap = dir.join("fixture-mem.pprof");
    std::fs::write(&cpu, cpu_profile()).unwrap();
    std::fs::write(&heap, heap_profile()).unwrap();

    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo "go version go1.22.0 linux/amd64"
  exit 0
fi
while [ $# -gt 0 ]; do
  case "$1" in
    -cpuprofile) cp '{cpu}' "$2"; shift ;;
    -memprofile) cp '{heap}' "$2"; shift ;;
  esac
  shift
done
printf '{stdout}'
"#,
        cpu = cpu.display(),
        heap = heap.display(),
        stdout = stdout,
    );
    let path = dir.join("fake-go");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// Test the default strategy against a stand-in toolchain, with profiling
#[cfg(unix)]
#[test]
fn test_process_executor_with_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = fake_toolchain(
        dir.path(),
        r"goos: linux\nBenchmarkEncode-8 \t 1000000\t 1043 ns/op\t 256 B/op\t 4 allocs/op\nPASS\n",
    );
    let options = RunOptions {
        toolchain,
        package: "./codec".to_string(),
        profile: "cpu,mem".parse().unwrap(),
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));

    let outcome = ProcessExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap();
    let run = &outcome.run;

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(run.toolchain_version, "go1.22.0");
    assert_eq!(run.package_path, "./codec");
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].name, "Encode-8");
    assert!(run.command.contains("-bench . -benchmem"));
    assert!(run.command.ends_with("./codec"));

    let cpu_ref = run.cpu_profile_ref.as_ref().unwrap();
    assert_eq!(cpu_ref, &store.cpu_profile_path(&run.id));
    assert!(cpu_ref.exists());
    assert!(run.memory_profile_ref.as_ref().unwrap().exists());

    let summary = run.profile_summary.as_ref().unwrap();
    assert_eq!(summary.cpu_top_functions[0].name, "codec.encodeBlock");
    assert_eq!(summary.memory_leaks[0].severity, Severity::High);

    // Persist and read back
    store.save(run).unwrap();
    let loaded: BenchmarkRun = store.load(&run.id).unwrap();
    assert_eq!(loaded.id, run.id);
    assert_eq!(loaded.results, run.results);
    assert_eq!(loaded.cpu_profile_ref, run.cpu_profile_ref);
    assert_eq!(
        loaded.profile_summary.as_ref().unwrap().memory_leaks.len(),
        summary.memory_leaks.len()
    );
    let text = format_human_output(&loaded);
    assert!(text.contains("Encode-8"));
    assert!(text.contains("Possible Leaks"));
}

/// Test that a toolchain exit with only a PASS line reports no results
#[cfg(unix)]
#[test]
fn test_process_executor_no_results() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = fake_toolchain(dir.path(), r"PASS\nok  \texample.com/lens\t0.01s\n");
    let options = RunOptions {
        toolchain,
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));

    let err = ProcessExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::NoResultsFound { .. }));
}

/// Test that profiling a multi-package pattern degrades to warnings
#[cfg(unix)]
#[test]
fn test_process_executor_multi_package_profile_warns() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = fake_toolchain(dir.path(), r"BenchmarkA 10 5 ns/op\n");
    let options = RunOptions {
        toolchain,
        package: "./...".to_string(),
        profile: "cpu,mem".parse().unwrap(),
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));

    let outcome = ProcessExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap();
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(outcome.run.results.len(), 1);
    assert!(outcome.run.profile_summary.is_none());
    assert!(!outcome.run.command.contains("-cpuprofile"));
}

/// Test that a filter matching nothing fails before anything is built
#[test]
fn test_direct_executor_no_benchmarks_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("go.mod"), "module example.com/lens\n\ngo 1.22\n").unwrap();
    std::fs::write(
        dir.path().join("lens.go"),
        "package lens\n\nimport \"testing\"\n\nfunc BenchmarkEncode(b *testing.B) {}\n",
    )
    .unwrap();

    let options = RunOptions {
        filter: "NoSuchBench".to_string(),
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));
    let err = DirectExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::NoBenchmarksFound { ref filter } if filter == "NoSuchBench"
    ));
    assert_eq!(harness_leftovers(dir.path()), 0);
}

fn harness_leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("_benchlens_harness"))
        .count()
}

/// A module with one benchmark the direct strategy can import
fn direct_module(dir: &Path) {
    std::fs::write(dir.join("go.mod"), "module example.com/lens\n\ngo 1.22\n").unwrap();
    std::fs::write(
        dir.join("sum.go"),
        "package lens\n\nimport \"testing\"\n\nfunc BenchmarkSum(b *testing.B) {}\n",
    )
    .unwrap();
}

/// A stand-in toolchain that answers `version` and runs `build_step` for
/// `go build -o <binary> .`
#[cfg(unix)]
fn fake_builder(dir: &Path, build_step: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
case "$1" in
  version) echo "go version go1.22.0 linux/amd64" ;;
  build) {build_step} ;;
  *) exit 2 ;;
esac
"#
    );
    let path = dir.join("fake-go");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// Test that compiler diagnostics and the generated source reach the caller
#[cfg(unix)]
#[test]
fn test_direct_executor_compile_failure() {
    let dir = tempfile::tempdir().unwrap();
    direct_module(dir.path());
    let tools = tempfile::tempdir().unwrap();
    let toolchain = fake_builder(
        tools.path(),
        "echo './main.go:9:2: undefined: bench0.BenchmarkX' >&2; exit 1",
    );

    let options = RunOptions {
        toolchain,
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));
    let err = DirectExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap_err();

    match err {
        ExecutionError::CompileFailed {
            diagnostics,
            harness_source,
        } => {
            assert!(diagnostics.contains("undefined: bench0.BenchmarkX"));
            assert!(harness_source.contains("package main"));
            assert!(harness_source.contains("BenchmarkSum"));
            assert!(harness_source.contains("example.com/lens"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness_leftovers(dir.path()), 0);
}

/// Test a direct run end to end: the built binary prints results and writes
/// only the CPU profile, so the missing heap profile becomes a warning
#[cfg(unix)]
#[test]
fn test_direct_executor_partial_profiles() {
    let dir = tempfile::tempdir().unwrap();
    direct_module(dir.path());
    let tools = tempfile::tempdir().unwrap();
    let cpu = tools.path().join("fixture-cpu.pprof");
    std::fs::write(&cpu, cpu_profile()).unwrap();

    // Stands in for the compiled harness
    let harness = tools.path().join("harness-fixture");
    std::fs::write(
        &harness,
        format!(
            r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -cpuprofile) cp '{cpu}' "$2"; shift ;;
  esac
  shift
done
printf 'BenchmarkSum-8	1000000	12.50 ns/op	0 B/op	0 allocs/op
'
"#,
            cpu = cpu.display()
        ),
    )
    .unwrap();
    let toolchain = fake_builder(
        tools.path(),
        &format!(r#"cp '{}' "$3" && chmod +x "$3""#, harness.display()),
    );

    let options = RunOptions {
        toolchain,
        profile: "cpu,mem".parse().unwrap(),
        cpu: vec![8],
        work_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let store = FileStore::new(dir.path().join(".benchlens"));
    let outcome = DirectExecutor::new(options, ProfileAnalyzer::default())
        .run(&store)
        .unwrap();
    let run = &outcome.run;

    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].name, "Sum-8");
    assert_eq!(run.results[0].iterations, 1_000_000);
    assert_eq!(run.toolchain_version, "go1.22.0");
    assert!(run.command.contains("-cpu 8"));
    assert!(run.command.contains("-cpuprofile"));

    assert_eq!(outcome.warnings.len(), 1, "{:?}", outcome.warnings);
    assert!(matches!(
        outcome.warnings[0],
        CaptureWarning::ProfileCapture {
            kind: ProfileKind::Memory,
            ..
        }
    ));
    assert!(run.cpu_profile_ref.as_ref().unwrap().exists());
    assert!(run.memory_profile_ref.is_none());
    let summary = run.profile_summary.as_ref().unwrap();
    assert_eq!(summary.cpu_top_functions[0].name, "codec.encodeBlock");
    assert!(summary.memory_top_functions.is_empty());

    assert_eq!(harness_leftovers(dir.path()), 0);
}
