//! Persistence backends for the record store
//!
//! A backend loads the whole store once and rewrites it whole on every mutation.
//! The store never asks for partial updates.

use crate::types::{Person, StoreError};

mod atomic_write;
pub mod json;
pub mod memory;

pub use json::JsonFileBackend;
pub use memory::InMemoryBackend;

/// What a backend found when asked for persisted state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Persisted state exists and parsed cleanly
    Loaded(Vec<Person>),
    /// Persisted state exists but is unreadable; the reason is for logging
    Corrupt(String),
    /// Nothing has been persisted yet
    Absent,
}

/// Load-all / save-all storage for Person records
pub trait StorageBackend {
    /// Read every persisted record, in persisted order
    fn load(&mut self) -> Result<LoadOutcome, StoreError>;

    /// Replace the persisted state with `people`
    ///
    /// Must be all-or-nothing: after a failed save the previous state is still
    /// what a subsequent `load` returns.
    fn save(&mut self, people: &[Person]) -> Result<(), StoreError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        (**self).load()
    }

    fn save(&mut self, people: &[Person]) -> Result<(), StoreError> {
        (**self).save(people)
    }
}
