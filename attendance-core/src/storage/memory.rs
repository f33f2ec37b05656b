//! In-memory backend
//!
//! Not durable. Used by tests and by dry runs that must not touch the disk.

use super::{LoadOutcome, StorageBackend};
use crate::types::{Person, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    saved: Option<Vec<Person>>,
    /// When true, every save fails
    pub fail_on_save: bool,
    /// Number of successful saves
    pub save_count: u64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already holds persisted records
    pub fn with_people(people: Vec<Person>) -> Self {
        Self {
            saved: Some(people),
            ..Self::default()
        }
    }

    /// Records as of the last successful save
    pub fn saved(&self) -> Option<&[Person]> {
        self.saved.as_deref()
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        Ok(match &self.saved {
            Some(people) => LoadOutcome::Loaded(people.clone()),
            None => LoadOutcome::Absent,
        })
    }

    fn save(&mut self, people: &[Person]) -> Result<(), StoreError> {
        if self.fail_on_save {
            return Err(StoreError::Backend("simulated save failure".to_string()));
        }
        self.save_count += 1;
        self.saved = Some(people.to_vec());
        Ok(())
    }
}
