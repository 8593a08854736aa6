//! Write-through session files.
//!
//! Every save serializes the whole `SessionRecord` and replaces the file, so
//! the file on disk is always a complete record of everything committed.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::conversation::SessionRecord;
use crate::error::PersistenceError;

pub trait SessionStore: Send {
    /// Overwrites the stored snapshot with `record`.
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError>;

    fn location(&self) -> &Path;
}

/// `{sanitized_name}_{YYYYMMDD_HHMMSS}.json`
pub fn session_file_name(record: &SessionRecord) -> String {
    format!(
        "{}_{}.json",
        record.candidate_profile().file_stem(),
        record.created_at_utc()
    )
}

pub fn load_record(path: &Path) -> Result<SessionRecord, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a new session file in `dir` and writes the initial snapshot.
    ///
    /// The directory is created if needed. An existing file with the same
    /// name is never overwritten; a numeric suffix is added instead.
    pub fn create(dir: &Path, record: &SessionRecord) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let name = session_file_name(record);
        let mut path = dir.join(&name);
        let stem = name.trim_end_matches(".json");
        let mut n = 2;
        while path.exists() {
            path = dir.join(format!("{stem}_{n}.json"));
            n += 1;
        }

        let mut store = Self { path };
        store.save(record)?;
        tracing::info!("Session file created at {}", store.path.display());
        Ok(store)
    }

    /// Writes back to an existing session file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for JsonFileStore {
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(record)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        // Written next to the target and renamed over it.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&json).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        tracing::debug!(
            turns = record.qa_list().len(),
            "Session saved to {}",
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
