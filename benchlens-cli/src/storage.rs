//! Run Storage
//!
//! Persists runs and their raw profiles by run id. The executors only use
//! the [`RunStore`] trait; [`FileStore`] is the JSON-on-disk implementation
//! the CLI uses:
//!
//! ```text
//! <root>/runs/<id>.json
//! <root>/profiles/<id>.cpu.pprof
//! <root>/profiles/<id>.memory.pprof
//! ```

use benchlens_report::{BenchmarkRun, generate_json_report, parse_json_report};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which profile stream a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Cpu,
    Memory,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProfileKind::Cpu => "cpu",
            ProfileKind::Memory => "memory",
        })
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid run file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run not found: {0}")]
    NotFound(String),

    #[error("invalid run id '{0}': ids are single file names")]
    InvalidId(String),
}

/// Reject ids that would resolve outside the store directories
fn validate_id(run_id: &str) -> Result<(), StoreError> {
    let invalid = run_id.is_empty()
        || run_id.starts_with('.')
        || run_id.contains("..")
        || run_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidId(run_id.to_string()));
    }
    Ok(())
}

/// Key-value-by-id persistence for runs and profiles
pub trait RunStore {
    /// Persist a run, overwriting any run with the same id
    fn save(&self, run: &BenchmarkRun) -> Result<PathBuf, StoreError>;

    /// Persist raw profile bytes for a run, returning where they went
    fn save_profile(
        &self,
        run_id: &str,
        kind: ProfileKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError>;

    /// Where the CPU profile of `run_id` lives
    fn cpu_profile_path(&self, run_id: &str) -> PathBuf;

    /// Where the heap profile of `run_id` lives
    fn memory_profile_path(&self, run_id: &str) -> PathBuf;

    /// Load a previously saved run
    fn load(&self, run_id: &str) -> Result<BenchmarkRun, StoreError>;

    /// Ids of all saved runs, oldest first
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// JSON files under a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{}.json", run_id))
    }

    fn profile_path(&self, run_id: &str, kind: ProfileKind) -> PathBuf {
        self.profiles_dir().join(format!("{}.{}.pprof", run_id, kind))
    }
}

impl RunStore for FileStore {
    fn save(&self, run: &BenchmarkRun) -> Result<PathBuf, StoreError> {
        validate_id(&run.id)?;
        std::fs::create_dir_all(self.runs_dir())?;
        let path = self.run_path(&run.id);
        std::fs::write(&path, generate_json_report(run)?)?;
        Ok(path)
    }

    fn save_profile(
        &self,
        run_id: &str,
        kind: ProfileKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        validate_id(run_id)?;
        std::fs::create_dir_all(self.profiles_dir())?;
        let path = self.profile_path(run_id, kind);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    fn cpu_profile_path(&self, run_id: &str) -> PathBuf {
        self.profile_path(run_id, ProfileKind::Cpu)
    }

    fn memory_profile_path(&self, run_id: &str) -> PathBuf {
        self.profile_path(run_id, ProfileKind::Memory)
    }

    fn load(&self, run_id: &str) -> Result<BenchmarkRun, StoreError> {
        validate_id(run_id)?;
        let path = self.run_path(run_id);
        if !path.exists() {
            return Err(StoreError::NotFound(run_id.to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(parse_json_report(&json)?)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        // Ids are timestamp-derived, so lexical order is chronological
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchlens_report::BenchmarkResult;
    use chrono::Utc;
    use std::time::Duration;

    fn run(id: &str) -> BenchmarkRun {
        BenchmarkRun {
            id: id.to_string(),
            timestamp: Utc::now(),
            package_path: "./...".to_string(),
            toolchain_version: "go1.22.0".to_string(),
            results: vec![BenchmarkResult::new("Parse-8", 1000, 812.5)],
            command: "go test -run ^$ -bench . ./...".to_string(),
            duration: Duration::from_millis(1500),
            cpu_profile_ref: None,
            memory_profile_ref: None,
            profile_summary: None,
        }
    }

    #[test]
    fn test_save_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.save(&run("20260101-000000.002")).unwrap();
        store.save(&run("20260101-000000.001")).unwrap();

        let loaded = store.load("20260101-000000.001").unwrap();
        assert_eq!(loaded.results[0].name, "Parse-8");
        assert_eq!(loaded.duration, Duration::from_millis(1500));
        assert_eq!(
            store.list().unwrap(),
            vec!["20260101-000000.001", "20260101-000000.002"]
        );
    }

    #[test]
    fn test_same_id_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut r = run("same");
        store.save(&r).unwrap();
        r.package_path = "./pkg".to_string();
        store.save(&r).unwrap();
        assert_eq!(store.load("same").unwrap().package_path, "./pkg");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_profile_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let saved = store.save_profile("r1", ProfileKind::Cpu, b"data").unwrap();
        assert_eq!(saved, store.cpu_profile_path("r1"));
        assert_eq!(std::fs::read(saved).unwrap(), b"data");
        assert!(
            store
                .memory_profile_path("r1")
                .ends_with("profiles/r1.memory.pprof")
        );
    }

    #[test]
    fn test_missing_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_cannot_escape_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store"));
        std::fs::write(dir.path().join("x.json"), "{}").unwrap();

        for id in ["../x", "../../x", "runs/../../x", "/tmp/x", "..\\x", "", ".hidden"] {
            assert!(
                matches!(store.load(id), Err(StoreError::InvalidId(_))),
                "{id:?} should be rejected"
            );
        }
        assert!(matches!(store.save(&run("../escape")), Err(StoreError::InvalidId(_))));
        assert!(matches!(
            store.save_profile("../escape", ProfileKind::Cpu, b"data"),
            Err(StoreError::InvalidId(_))
        ));
        assert!(!dir.path().join("escape.json").exists());
        assert!(!dir.path().join("store").exists());
    }
}
