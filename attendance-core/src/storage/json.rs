//! JSON file backend
//!
//! The file holds a single array of Person records:
//!
//! ```json
//! [{"id": "4f1c...", "name": "Ada", "cards": [57005], "attendance": [1700000000]}]
//! ```
//!
//! Card UIDs are plain integers and attendance entries are Unix seconds.

use super::atomic_write::atomic_write;
use super::{LoadOutcome, StorageBackend};
use crate::types::{Person, StoreError};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Store backed by one JSON file, rewritten atomically on every save
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    /// Last place an unreadable file was moved to
    quarantined: Option<PathBuf>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quarantined: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the next unreadable store file will be moved before starting fresh
    ///
    /// `<file>.corrupt`, or `<file>.corrupt.N` with the first free N when earlier
    /// copies are still there.
    pub fn quarantine_path(&self) -> PathBuf {
        let mut base = OsString::from(self.path.as_os_str());
        base.push(".corrupt");
        let first = PathBuf::from(&base);
        if !first.exists() {
            return first;
        }

        (1u32..)
            .map(|n| {
                let mut name = base.clone();
                name.push(format!(".{}", n));
                PathBuf::from(name)
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }

    /// Where the last unreadable file was moved, if any
    pub fn quarantined(&self) -> Option<&Path> {
        self.quarantined.as_deref()
    }

    fn quarantine(&mut self) {
        let target = self.quarantine_path();
        match fs::rename(&self.path, &target) {
            Ok(()) => {
                log::warn!("Moved unreadable store file to {:?}", target);
                self.quarantined = Some(target);
            }
            Err(e) => log::warn!("Failed to move unreadable store file {:?}: {}", self.path, e),
        }
    }
}

impl StorageBackend for JsonFileBackend {
    fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No store file at {:?}", self.path);
                return Ok(LoadOutcome::Absent);
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                // Not UTF-8
                self.quarantine();
                return Ok(LoadOutcome::Corrupt(e.to_string()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        match serde_json::from_str::<Vec<Person>>(&content) {
            Ok(people) => {
                log::debug!("Loaded {} people from {:?}", people.len(), self.path);
                Ok(LoadOutcome::Loaded(people))
            }
            Err(e) => {
                self.quarantine();
                Ok(LoadOutcome::Corrupt(e.to_string()))
            }
        }
    }

    fn save(&mut self, people: &[Person]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(people)?;
        atomic_write(&self.path, &bytes)?;
        log::trace!("Saved {} people to {:?}", people.len(), self.path);
        Ok(())
    }
}
