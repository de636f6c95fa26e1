//! Persistence hooks for candidates and the ballot document
//!
//! The ballot document combines vote counts and the voter registry so that
//! one atomic write covers both halves of a commit:
//!
//! ```json
//! { "votes": { "<candidate id>": 3 }, "voters": ["<64 hex chars>", "..."] }
//! ```

use crate::ballot::BallotBox;
use crate::config::StorageConfig;
use crate::registry::VoterRegistry;
use crate::types::Candidate;
use crate::{Error, Result, persistence_error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Ballot state as loaded from storage
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BallotDocument {
    #[serde(default)]
    pub votes: BallotBox,
    #[serde(default)]
    pub voters: VoterRegistry,
}

#[derive(Serialize)]
struct BallotSnapshot<'a> {
    votes: &'a BallotBox,
    voters: &'a VoterRegistry,
}

/// Where the service keeps its state
///
/// Loads return the empty value when nothing has been stored yet and
/// [`Error::Parse`] when stored content is malformed.
pub trait StateStore: Send + Sync {
    fn load_candidates(&self) -> Result<Vec<Candidate>>;

    fn save_candidates(&self, candidates: &[Candidate]) -> Result<()>;

    fn load_ballot(&self) -> Result<BallotDocument>;

    /// Persist votes and voters as a single unit
    fn save_ballot(&self, votes: &BallotBox, voters: &VoterRegistry) -> Result<()>;

    /// Files the store owns, including in-flight temporaries
    ///
    /// Exports must never be written to any of these.
    fn protected_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Write the candidate list to an arbitrary file
    fn export_candidates(&self, path: &Path, candidates: &[Candidate]) -> Result<()> {
        write_json_atomic(path, &candidates)
    }
}

/// JSON files on local disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    candidates_path: PathBuf,
    ballot_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            candidates_path: config.candidates_path(),
            ballot_path: config.ballot_path(),
        }
    }

    pub fn candidates_path(&self) -> &Path {
        &self.candidates_path
    }

    pub fn ballot_path(&self) -> &Path {
        &self.ballot_path
    }
}

impl StateStore for JsonFileStore {
    fn load_candidates(&self) -> Result<Vec<Candidate>> {
        Ok(read_json(&self.candidates_path)?.unwrap_or_default())
    }

    fn save_candidates(&self, candidates: &[Candidate]) -> Result<()> {
        write_json_atomic(&self.candidates_path, &candidates)
    }

    fn load_ballot(&self) -> Result<BallotDocument> {
        Ok(read_json(&self.ballot_path)?.unwrap_or_default())
    }

    fn save_ballot(&self, votes: &BallotBox, voters: &VoterRegistry) -> Result<()> {
        write_json_atomic(&self.ballot_path, &BallotSnapshot { votes, voters })
    }

    fn protected_paths(&self) -> Vec<PathBuf> {
        [&self.candidates_path, &self.ballot_path]
            .into_iter()
            .flat_map(|path| [path.clone(), path.with_extension("tmp")])
            .collect()
    }
}

/// Whether two paths name the same file once `.`/`..` are folded and the
/// parent directories are resolved
pub fn same_location(a: &Path, b: &Path) -> bool {
    resolve(a) == resolve(b)
}

fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    // Symlinked data directories compare by their target
    if let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name()) {
        if let Ok(parent) = fs::canonicalize(parent) {
            return parent.join(name);
        }
    }
    normalized
}

/// Read a JSON file; `None` if it does not exist
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence_error!(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::parse(path, e))
}

/// Write pretty JSON to `<path>.tmp`, sync, then rename over `path`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| persistence_error!(parent, e))?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| persistence_error!(&tmp_path, e))?;
        file.write_all(&content)
            .and_then(|_| file.sync_all())
            .map_err(|e| persistence_error!(&tmp_path, e))?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(persistence_error!(path, e));
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// In-memory store holding serialized JSON text
#[derive(Debug, Default)]
pub struct MemoryStore {
    candidates: Mutex<Option<String>>,
    ballot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the raw ballot document text
    pub fn with_ballot_json(json: impl Into<String>) -> Self {
        Self {
            candidates: Mutex::new(None),
            ballot: Mutex::new(Some(json.into())),
        }
    }

    /// Pre-seed the raw candidates document text
    pub fn with_candidates_json(json: impl Into<String>) -> Self {
        Self {
            candidates: Mutex::new(Some(json.into())),
            ballot: Mutex::new(None),
        }
    }

    /// Current ballot document text, if anything has been saved
    pub fn ballot_json(&self) -> Option<String> {
        self.ballot.lock().ok().and_then(|slot| slot.clone())
    }

    fn load<T: serde::de::DeserializeOwned + Default>(slot: &Mutex<Option<String>>, name: &str) -> Result<T> {
        let guard = slot
            .lock()
            .map_err(|_| Error::internal("Memory store lock poisoned"))?;
        match guard.as_deref() {
            Some(json) => serde_json::from_str(json).map_err(|e| Error::parse(name, e)),
            None => Ok(T::default()),
        }
    }

    fn store<T: Serialize + ?Sized>(slot: &Mutex<Option<String>>, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut guard = slot
            .lock()
            .map_err(|_| Error::internal("Memory store lock poisoned"))?;
        *guard = Some(json);
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn load_candidates(&self) -> Result<Vec<Candidate>> {
        Self::load(&self.candidates, "memory:candidates")
    }

    fn save_candidates(&self, candidates: &[Candidate]) -> Result<()> {
        Self::store(&self.candidates, candidates)
    }

    fn load_ballot(&self) -> Result<BallotDocument> {
        Self::load(&self.ballot, "memory:ballot")
    }

    fn save_ballot(&self, votes: &BallotBox, voters: &VoterRegistry) -> Result<()> {
        Self::store(&self.ballot, &BallotSnapshot { votes, voters })
    }
}
