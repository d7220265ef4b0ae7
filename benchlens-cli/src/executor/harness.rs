//! Harness Generation
//!
//! Produces the source of a standalone Go program that runs selected
//! benchmark functions through `testing.Benchmark` and prints the same
//! result lines `go test -bench` does. Generation is pure; compilation is
//! the caller's concern.

use std::collections::BTreeMap;
use std::fmt::Write;

/// One benchmark function to include in the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessEntry {
    /// Import path of the declaring package
    pub import_path: String,
    /// Function name, including the `Benchmark` prefix
    pub function: String,
}

const PROLOGUE: &str = r#"// Code generated by benchlens. DO NOT EDIT.

package main

import (
	"flag"
	"fmt"
	"os"
	"runtime"
	"runtime/pprof"
	"strconv"
	"strings"
	"testing"
"#;

const MAIN: &str = r#"
type benchmark struct {
	name string
	fn   func(*testing.B)
}

func main() {
	testing.Init()
	cpuList := flag.String("cpu", "", "comma-separated list of GOMAXPROCS values")
	count := flag.Int("count", 1, "run each benchmark n times")
	benchtime := flag.String("benchtime", "", "run time per benchmark, or Nx for N iterations")
	cpuProfile := flag.String("cpuprofile", "", "write a CPU profile to this file")
	memProfile := flag.String("memprofile", "", "write a heap profile to this file")
	flag.Parse()

	if *benchtime != "" {
		if err := flag.Set("test.benchtime", *benchtime); err != nil {
			fmt.Fprintf(os.Stderr, "invalid -benchtime %q: %v\n", *benchtime, err)
			os.Exit(2)
		}
	}

	original := runtime.GOMAXPROCS(0)
	procs := []int{original}
	if *cpuList != "" {
		procs = procs[:0]
		for _, s := range strings.Split(*cpuList, ",") {
			n, err := strconv.Atoi(strings.TrimSpace(s))
			if err != nil || n <= 0 {
				fmt.Fprintf(os.Stderr, "invalid -cpu value %q\n", s)
				os.Exit(2)
			}
			procs = append(procs, n)
		}
	}

	var cpuFile *os.File
	if *cpuProfile != "" {
		f, err := os.Create(*cpuProfile)
		if err != nil {
			fmt.Fprintf(os.Stderr, "warning: cpuprofile: %v\n", err)
		} else if err := pprof.StartCPUProfile(f); err != nil {
			fmt.Fprintf(os.Stderr, "warning: cpuprofile: %v\n", err)
			f.Close()
		} else {
			cpuFile = f
		}
	}

	failed := false
	for _, bm := range benchmarks {
		for _, p := range procs {
			runtime.GOMAXPROCS(p)
			name := bm.name
			if p != 1 {
				name = fmt.Sprintf("%s-%d", name, p)
			}
			for i := 0; i < *count; i++ {
				r := testing.Benchmark(bm.fn)
				if r.N == 0 {
					fmt.Fprintf(os.Stderr, "--- FAIL: %s (failed or skipped)\n", name)
					failed = true
					break
				}
				report(name, r)
			}
		}
	}
	runtime.GOMAXPROCS(original)

	if cpuFile != nil {
		pprof.StopCPUProfile()
		cpuFile.Close()
	}
	if *memProfile != "" {
		f, err := os.Create(*memProfile)
		if err != nil {
			fmt.Fprintf(os.Stderr, "warning: memprofile: %v\n", err)
		} else {
			runtime.GC()
			if err := pprof.WriteHeapProfile(f); err != nil {
				fmt.Fprintf(os.Stderr, "warning: memprofile: %v\n", err)
			}
			f.Close()
		}
	}

	if failed {
		os.Exit(1)
	}
}

func report(name string, r testing.BenchmarkResult) {
	var sb strings.Builder
	nsPerOp := float64(r.T.Nanoseconds()) / float64(r.N)
	fmt.Fprintf(&sb, "%s\t%d\t%.2f ns/op", name, r.N, nsPerOp)
	if r.Bytes > 0 && r.T > 0 {
		mbPerSec := float64(r.Bytes) * float64(r.N) / 1e6 / r.T.Seconds()
		fmt.Fprintf(&sb, "\t%.2f MB/s", mbPerSec)
	}
	fmt.Fprintf(&sb, "\t%d B/op\t%d allocs/op", r.AllocedBytesPerOp(), r.AllocsPerOp())
	fmt.Println(sb.String())
}
"#;

/// Generate the harness program for `entries`, in order.
///
/// Each distinct import path gets a stable alias (`bench0`, `bench1`, ...)
/// in order of first appearance. Result lines carry the full function
/// name, as `go test` prints them.
pub fn generate_harness(entries: &[HarnessEntry]) -> String {
    let mut aliases: BTreeMap<&str, String> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();
    for entry in entries {
        if !aliases.contains_key(entry.import_path.as_str()) {
            aliases.insert(&entry.import_path, format!("bench{}", order.len()));
            order.push(&entry.import_path);
        }
    }

    let mut src = String::from(PROLOGUE);
    if !order.is_empty() {
        src.push('\n');
    }
    for path in &order {
        let _ = writeln!(src, "\t{} {}", aliases[path], go_quote(path));
    }
    src.push_str(")\n\nvar benchmarks = []benchmark{\n");
    for entry in entries {
        let alias = &aliases[entry.import_path.as_str()];
        let _ = writeln!(
            src,
            "\t{{{}, {}.{}}},",
            go_quote(&entry.function),
            alias,
            entry.function
        );
    }
    src.push_str("}\n");
    src.push_str(MAIN);
    src
}

/// Interpreted Go string literal
fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
