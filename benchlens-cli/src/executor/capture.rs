//! Profile Capture
//!
//! Owns the scratch directory the toolchain writes profiles into, then
//! stores, decodes and analyzes whatever was written. Every failure here is
//! a [`CaptureWarning`]: a run without profiles is still a run.

use super::error::CaptureWarning;
use crate::storage::{ProfileKind, RunStore};
use benchlens_profile::{ProfileAnalyzer, SampleSet};
use benchlens_report::BenchmarkRun;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Which profiles to capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileModes {
    pub cpu: bool,
    pub memory: bool,
}

impl ProfileModes {
    pub fn any(self) -> bool {
        self.cpu || self.memory
    }

    /// Enabled kinds, CPU first
    pub fn kinds(self) -> impl Iterator<Item = ProfileKind> {
        [
            self.cpu.then_some(ProfileKind::Cpu),
            self.memory.then_some(ProfileKind::Memory),
        ]
        .into_iter()
        .flatten()
    }
}

impl FromStr for ProfileModes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modes = ProfileModes::default();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_lowercase().as_str() {
                "cpu" => modes.cpu = true,
                "mem" | "memory" => modes.memory = true,
                _ => {
                    return Err(format!(
                        "unknown profile kind '{}': expected cpu, mem or memory",
                        token
                    ));
                }
            }
        }
        Ok(modes)
    }
}

/// Scratch space for one run's profiles; removed when dropped
#[derive(Debug)]
pub struct ProfileCapture {
    modes: ProfileModes,
    dir: TempDir,
}

impl ProfileCapture {
    /// Create the scratch directory, or `None` when no profile was requested
    pub fn prepare(modes: ProfileModes) -> std::io::Result<Option<Self>> {
        if !modes.any() {
            return Ok(None);
        }
        let dir = tempfile::Builder::new().prefix("benchlens-profile").tempdir()?;
        debug!(dir = %dir.path().display(), "profile capture directory");
        Ok(Some(Self { modes, dir }))
    }

    /// [`prepare`](Self::prepare), demoting failure to one warning per kind
    pub(crate) fn start(modes: ProfileModes, warnings: &mut Vec<CaptureWarning>) -> Option<Self> {
        match Self::prepare(modes) {
            Ok(capture) => capture,
            Err(e) => {
                for kind in modes.kinds() {
                    push_warning(
                        warnings,
                        CaptureWarning::ProfileCapture {
                            kind,
                            reason: format!("cannot create profile directory: {}", e),
                        },
                    );
                }
                None
            }
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn cpu_path(&self) -> Option<PathBuf> {
        self.modes.cpu.then(|| self.dir.path().join("cpu.pprof"))
    }

    pub fn memory_path(&self) -> Option<PathBuf> {
        self.modes.memory.then(|| self.dir.path().join("mem.pprof"))
    }

    /// Store, decode and analyze the captured profiles, attaching references
    /// and the summary to `run`.
    pub fn finish(
        self,
        run: &mut BenchmarkRun,
        store: &dyn RunStore,
        analyzer: &ProfileAnalyzer,
    ) -> Vec<CaptureWarning> {
        let mut warnings = Vec::new();

        let cpu = self
            .cpu_path()
            .and_then(|path| collect(ProfileKind::Cpu, &path, run, store, &mut warnings));
        let memory = self
            .memory_path()
            .and_then(|path| collect(ProfileKind::Memory, &path, run, store, &mut warnings));

        let cpu = cpu.and_then(|bytes| decode(ProfileKind::Cpu, &bytes, &mut warnings));
        let memory = memory.and_then(|bytes| decode(ProfileKind::Memory, &bytes, &mut warnings));

        if cpu.is_some() || memory.is_some() {
            let summary = analyzer.analyze(cpu.as_ref(), memory.as_ref());
            debug!(
                cpu_functions = summary.cpu_top_functions.len(),
                memory_functions = summary.memory_top_functions.len(),
                leaks = summary.memory_leaks.len(),
                suggestions = summary.suggestions.len(),
                "profile analysis complete"
            );
            run.profile_summary = Some(summary);
        }

        warnings
    }
}

fn push_warning(warnings: &mut Vec<CaptureWarning>, warning: CaptureWarning) {
    warn!("{}", warning);
    warnings.push(warning);
}

/// Read one profile file and hand it to the store
fn collect(
    kind: ProfileKind,
    path: &Path,
    run: &mut BenchmarkRun,
    store: &dyn RunStore,
    warnings: &mut Vec<CaptureWarning>,
) -> Option<Vec<u8>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            push_warning(
                warnings,
                CaptureWarning::ProfileCapture {
                    kind,
                    reason: "profile file is empty".to_string(),
                },
            );
            return None;
        }
        Err(e) => {
            push_warning(
                warnings,
                CaptureWarning::ProfileCapture {
                    kind,
                    reason: format!("cannot read {}: {}", path.display(), e),
                },
            );
            return None;
        }
    };

    match store.save_profile(&run.id, kind, &bytes) {
        Ok(saved) => match kind {
            ProfileKind::Cpu => run.cpu_profile_ref = Some(saved),
            ProfileKind::Memory => run.memory_profile_ref = Some(saved),
        },
        Err(e) => push_warning(
            warnings,
            CaptureWarning::ProfileCapture {
                kind,
                reason: format!("cannot store profile: {}", e),
            },
        ),
    }
    Some(bytes)
}

fn decode(kind: ProfileKind, bytes: &[u8], warnings: &mut Vec<CaptureWarning>) -> Option<SampleSet> {
    match SampleSet::decode(bytes) {
        Ok(set) => Some(set),
        Err(e) => {
            push_warning(
                warnings,
                CaptureWarning::Analysis {
                    reason: format!("{} profile: {}", kind, e),
                },
            );
            None
        }
    }
}
