#![warn(missing_docs)]
//! benchlens CLI Library
//!
//! Runs Go benchmarks, captures their CPU and heap profiles and turns both
//! into a ranked report. Use `benchlens::run()` (or `benchlens_cli::run()`)
//! from a `main` function to get the full command-line experience.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     benchlens_cli::run()
//! }
//! ```

mod config;
#[allow(missing_docs)]
mod executor;
#[allow(missing_docs)]
mod storage;

pub use config::*;
pub use executor::*;
pub use storage::{FileStore, ProfileKind, RunStore, StoreError};

use anyhow::Context;
use benchlens_profile::{ProfileAnalyzer, analyze_profiles};
use benchlens_report::{OutputFormat, generate_json_report, generate_json_summary};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// benchlens CLI arguments
#[derive(Parser, Debug)]
#[command(name = "benchlens")]
#[command(author, version, about = "benchlens - run Go benchmarks and analyze their profiles")]
pub struct Cli {
    /// Optional subcommand; defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter benchmarks by regex pattern
    #[arg(default_value = ".")]
    pub filter: String,

    /// Package to benchmark (e.g. ".", "./codec", "./...")
    #[arg(short, long, global = true)]
    pub package: Option<String>,

    /// Comma-separated GOMAXPROCS values (e.g. 1,2,4)
    #[arg(long, value_delimiter = ',', global = true)]
    pub cpu: Vec<u32>,

    /// Run time per benchmark (e.g. 1s, 500ms) or iteration count (e.g. 100x)
    #[arg(long, global = true)]
    pub benchtime: Option<String>,

    /// Run each benchmark N times
    #[arg(long, global = true)]
    pub count: Option<u32>,

    /// Profiles to capture: cpu, mem, or cpu,mem
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Do not collect allocation statistics
    #[arg(long, global = true)]
    pub no_benchmem: bool,

    /// Compile and run a generated harness instead of `go test`
    #[arg(long, global = true)]
    pub direct: bool,

    /// Toolchain executable (default: go)
    #[arg(long, global = true)]
    pub toolchain: Option<String>,

    /// Output format: human, json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Directory for saved runs and profiles
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Do not save the run record
    #[arg(long, global = true)]
    pub no_save: bool,

    /// Verbose output: debug logging and raw toolchain output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Benchmark filter, preferring the one given after the subcommand
    pub fn effective_filter(&self) -> &str {
        match &self.command {
            Some(Commands::Run { filter: Some(filter) })
            | Some(Commands::List { filter: Some(filter) }) => filter.as_str(),
            _ => self.filter.as_str(),
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run benchmarks (default)
    Run {
        /// Filter benchmarks by regex pattern
        filter: Option<String>,
    },
    /// List benchmark functions found in source, without running them
    List {
        /// Filter benchmarks by regex pattern
        filter: Option<String>,
    },
    /// Analyze existing profile files
    Analyze {
        /// CPU profile (pprof, optionally gzipped)
        #[arg(long)]
        cpu_profile: Option<PathBuf>,
        /// Heap profile (pprof, optionally gzipped)
        #[arg(long)]
        mem_profile: Option<PathBuf>,
    },
    /// Show a saved run
    Show {
        /// Run id, as printed by `runs`
        id: String,
    },
    /// List saved runs
    Runs,
    /// Print a default benchlens.toml
    Init,
}

/// Run the benchlens CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the benchlens CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for reports
    let filter = if cli.verbose {
        "benchlens=debug"
    } else {
        "benchlens=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // Discover benchlens.toml configuration (CLI flags override)
    let config = BenchlensConfig::discover().unwrap_or_default();

    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Some(Commands::List { .. }) => list_benchmarks(&cli, &config),
        Some(Commands::Analyze {
            ref cpu_profile,
            ref mem_profile,
        }) => analyze_command(
            &cli,
            &config,
            cpu_profile.as_deref(),
            mem_profile.as_deref(),
            format,
        ),
        Some(Commands::Show { ref id }) => show_run(&cli, &config, id, format),
        Some(Commands::Runs) => list_runs(&cli, &config),
        Some(Commands::Init) => write_output(&cli, &BenchlensConfig::default_toml()),
        Some(Commands::Run { .. }) | None => {
            let interrupter = Interrupter::new();
            if let Err(e) = interrupter.install() {
                tracing::warn!(error = %e, "could not install the Ctrl-C handler");
            }
            run_benchmarks(&cli, &config, format, interrupter)
        }
    }
}

/// Build RunOptions by layering: benchlens.toml defaults → CLI overrides.
pub fn build_run_options(
    cli: &Cli,
    config: &BenchlensConfig,
    work_dir: PathBuf,
) -> anyhow::Result<RunOptions> {
    let runner = &config.runner;

    let cpu = if !cli.cpu.is_empty() {
        if cli.cpu.contains(&0) {
            anyhow::bail!("--cpu values must be positive");
        }
        cli.cpu.clone()
    } else {
        runner
            .cpu
            .as_deref()
            .map(BenchlensConfig::parse_cpu_list)
            .transpose()
            .context("invalid [runner] cpu")?
            .unwrap_or_default()
    };

    let benchtime = cli.benchtime.clone().or_else(|| runner.benchtime.clone());
    if let Some(benchtime) = &benchtime {
        BenchlensConfig::parse_benchtime(benchtime)
            .with_context(|| format!("invalid benchtime '{}'", benchtime))?;
    }

    let count = cli.count.or(runner.count);
    if count == Some(0) {
        anyhow::bail!("count must be positive");
    }

    let profile: ProfileModes = cli
        .profile
        .as_deref()
        .unwrap_or(&config.profile.modes)
        .parse()
        .map_err(anyhow::Error::msg)?;

    Ok(RunOptions {
        toolchain: cli
            .toolchain
            .clone()
            .unwrap_or_else(|| runner.toolchain.clone()),
        package: cli.package.clone().unwrap_or_else(|| runner.package.clone()),
        filter: cli.effective_filter().to_string(),
        cpu,
        benchtime,
        count,
        benchmem: runner.benchmem && !cli.no_benchmem,
        profile,
        verbose: cli.verbose,
        work_dir,
        interrupter: Interrupter::new(),
    })
}

fn store_for(cli: &Cli, config: &BenchlensConfig) -> FileStore {
    FileStore::new(
        cli.store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.storage.directory)),
    )
}

fn run_benchmarks(
    cli: &Cli,
    config: &BenchlensConfig,
    format: OutputFormat,
    interrupter: Interrupter,
) -> anyhow::Result<()> {
    let options = RunOptions {
        interrupter,
        ..build_run_options(cli, config, std::env::current_dir()?)?
    };
    let strategy = if cli.direct {
        Strategy::Direct
    } else {
        config.runner.strategy
    };
    let analyzer = ProfileAnalyzer::new(config.analysis.clone());
    let store = store_for(cli, config);

    eprintln!(
        "Running benchmarks in {} ({} strategy)...",
        options.package, strategy
    );

    let outcome = match strategy {
        Strategy::Process => ProcessExecutor::new(options, analyzer).run(&store)?,
        Strategy::Direct => DirectExecutor::new(options, analyzer).run(&store)?,
    };
    if !outcome.warnings.is_empty() {
        eprintln!(
            "Warning: {} profiling problem(s); results are complete but profile findings may be partial.",
            outcome.warnings.len()
        );
    }

    let output = match format {
        OutputFormat::Json => generate_json_report(&outcome.run)?,
        OutputFormat::Human => format_human_output(&outcome.run),
    };
    write_output(cli, &output)?;

    if config.storage.save && !cli.no_save {
        let path = store
            .save(&outcome.run)
            .context("failed to save run")?;
        tracing::info!(path = %path.display(), id = %outcome.run.id, "run saved");
    }

    Ok(())
}

fn list_benchmarks(cli: &Cli, config: &BenchlensConfig) -> anyhow::Result<()> {
    let work_dir = std::env::current_dir()?;
    let package = cli
        .package
        .clone()
        .unwrap_or_else(|| config.runner.package.clone());
    let scanner = SourceScanner::new(&work_dir);
    let benchmarks = filter_benchmarks(scanner.scan(&package)?, cli.effective_filter())?;

    println!("benchlens Plan:");

    let mut packages: BTreeMap<String, Vec<&BenchmarkFunc>> = BTreeMap::new();
    for bench in &benchmarks {
        let key = format!("{} ({})", bench.package, relative(&bench.dir, &work_dir));
        packages.entry(key).or_default().push(bench);
    }

    for (package, benches) in &packages {
        println!("├── package: {}", package);
        for bench in benches {
            println!(
                "│   ├── {} ({}:{}){}",
                bench.name,
                relative(&bench.file, &work_dir),
                bench.line,
                if bench.in_test_file {
                    "  [go test only]"
                } else {
                    ""
                }
            );
        }
    }

    println!("{} benchmarks found.", benchmarks.len());
    Ok(())
}

fn relative(path: &Path, base: &Path) -> String {
    let shown = path.strip_prefix(base).unwrap_or(path);
    if shown.as_os_str().is_empty() {
        ".".to_string()
    } else {
        shown.display().to_string()
    }
}

fn analyze_command(
    cli: &Cli,
    config: &BenchlensConfig,
    cpu_profile: Option<&Path>,
    mem_profile: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if cpu_profile.is_none() && mem_profile.is_none() {
        anyhow::bail!("analyze needs --cpu-profile and/or --mem-profile");
    }
    let read = |path: &Path| {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    };
    let cpu = cpu_profile.map(read).transpose()?;
    let memory = mem_profile.map(read).transpose()?;

    let analyzer = ProfileAnalyzer::new(config.analysis.clone());
    let summary = analyze_profiles(&analyzer, cpu.as_deref(), memory.as_deref())?;

    let output = match format {
        OutputFormat::Json => generate_json_summary(&summary)?,
        OutputFormat::Human => format_profile_summary(&summary),
    };
    write_output(cli, &output)
}

fn show_run(
    cli: &Cli,
    config: &BenchlensConfig,
    id: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let run = store_for(cli, config).load(id)?;
    let output = match format {
        OutputFormat::Json => generate_json_report(&run)?,
        OutputFormat::Human => format_human_output(&run),
    };
    write_output(cli, &output)
}

fn list_runs(cli: &Cli, config: &BenchlensConfig) -> anyhow::Result<()> {
    let store = store_for(cli, config);
    let ids = store.list()?;
    if ids.is_empty() {
        println!("No saved runs in {}", store.root().display());
        return Ok(());
    }

    for id in &ids {
        match store.load(id) {
            Ok(run) => println!(
                "{}  {}  {}  {} results{}",
                run.id,
                run.timestamp.format("%Y-%m-%d %H:%M:%S"),
                run.package_path,
                run.results.len(),
                if run.profile_summary.is_some() {
                    "  [profiled]"
                } else {
                    ""
                }
            ),
            Err(e) => println!("{}  (unreadable: {})", id, e),
        }
    }
    println!("{} runs.", ids.len());
    Ok(())
}

fn write_output(cli: &Cli, output: &str) -> anyhow::Result<()> {
    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        eprintln!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("benchlens").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert_eq!(cli.filter, ".");
        assert!(cli.cpu.is_empty());
        assert!(!cli.direct);
    }

    #[test]
    fn test_cli_flags() {
        let cli = parse(&[
            "Encode", "-p", "./...", "--cpu", "1,2,4", "--count", "3", "--profile", "cpu,mem",
            "--direct", "-v",
        ]);
        assert_eq!(cli.filter, "Encode");
        assert_eq!(cli.package.as_deref(), Some("./..."));
        assert_eq!(cli.cpu, vec![1, 2, 4]);
        assert_eq!(cli.count, Some(3));
        assert!(cli.direct && cli.verbose);
    }

    #[test]
    fn test_cli_subcommands() {
        assert!(matches!(
            parse(&["list"]).command,
            Some(Commands::List { filter: None })
        ));
        assert!(matches!(
            parse(&["show", "20260101-000000.000"]).command,
            Some(Commands::Show { ref id }) if id == "20260101-000000.000"
        ));
        match parse(&["analyze", "--cpu-profile", "cpu.pprof"]).command {
            Some(Commands::Analyze {
                cpu_profile,
                mem_profile,
            }) => {
                assert_eq!(cpu_profile, Some(PathBuf::from("cpu.pprof")));
                assert!(mem_profile.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_options_layering() {
        let mut config = BenchlensConfig::default();
        config.runner.package = "./codec".to_string();
        config.runner.cpu = Some("2,8".to_string());
        config.runner.count = Some(5);
        config.profile.modes = "mem".to_string();

        let options = build_run_options(&parse(&[]), &config, PathBuf::from("/w")).unwrap();
        assert_eq!(options.package, "./codec");
        assert_eq!(options.cpu, vec![2, 8]);
        assert_eq!(options.count, Some(5));
        assert!(options.profile.memory && !options.profile.cpu);
        assert!(options.benchmem);

        let cli = parse(&["-p", ".", "--cpu", "1", "--count", "2", "--profile", "cpu", "--no-benchmem"]);
        let options = build_run_options(&cli, &config, PathBuf::from("/w")).unwrap();
        assert_eq!(options.package, ".");
        assert_eq!(options.cpu, vec![1]);
        assert_eq!(options.count, Some(2));
        assert!(options.profile.cpu && !options.profile.memory);
        assert!(!options.benchmem);
        assert_eq!(options.work_dir, PathBuf::from("/w"));
    }

    #[test]
    fn test_run_options_rejects_bad_values() {
        let config = BenchlensConfig::default();
        for args in [
            &["--benchtime", "fast"][..],
            &["--count", "0"][..],
            &["--profile", "block"][..],
            &["--cpu", "0"][..],
        ] {
            assert!(
                build_run_options(&parse(args), &config, PathBuf::from(".")).is_err(),
                "accepted {args:?}"
            );
        }
    }

    #[test]
    fn test_options_after_subcommand() {
        let cli = parse(&["list", "-p", "./...", "Enc"]);
        assert_eq!(cli.package.as_deref(), Some("./..."));
        assert_eq!(cli.effective_filter(), "Enc");

        let cli = parse(&["show", "r1", "--format", "json", "--store-dir", "/s", "-o", "out.json"]);
        assert_eq!(cli.format.as_deref(), Some("json"));
        assert_eq!(cli.store_dir, Some(PathBuf::from("/s")));
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));

        let cli = parse(&["run", "Parse", "--count", "2", "--direct", "-v"]);
        assert_eq!(cli.effective_filter(), "Parse");
        assert_eq!(cli.count, Some(2));
        assert!(cli.direct && cli.verbose);

        let options =
            build_run_options(&cli, &BenchlensConfig::default(), PathBuf::from(".")).unwrap();
        assert_eq!(options.filter, "Parse");
    }

    #[test]
    fn test_subcommand_without_filter_uses_default() {
        assert_eq!(parse(&["list"]).effective_filter(), ".");
        assert_eq!(parse(&["Encode"]).effective_filter(), "Encode");
    }
}
