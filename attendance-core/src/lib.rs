//! Attendance Core Library
//!
//! Logs physical attendance from proximity cards. The library turns repeated reader
//! polls into discrete "card just appeared" events and applies them to a persisted
//! roster of people.
//!
//! # Architecture
//!
//! - [`RecordStore`]: people, card ownership and attendance history, persisted
//!   through a [`StorageBackend`] on every mutation
//! - [`PresenceTracker`]: edge detection over a [`CardReader`], yielding each card
//!   once per presentation
//! - [`AttendanceCoordinator`]: looks up (or registers) the owner of each card and
//!   logs attendance, subject to the store's cooldown
//!
//! The library does NOT:
//! - Render records or run an interactive UI
//! - Read configuration files
//! - Install signal handlers
//!
//! All of that is in the application layer (attendance-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use attendance_core::reader::{select_first_device, NfcLibraries, NfcReader};
//! use attendance_core::{
//!     AttendanceCoordinator, CardUid, JsonFileBackend, PresenceTracker, PromptError,
//!     RecordStore, TrackerConfig,
//! };
//!
//! let mut store = RecordStore::open(JsonFileBackend::new("attendance.json")).unwrap();
//!
//! let mut reader = NfcReader::open(&NfcLibraries::default()).unwrap();
//! select_first_device(&mut reader).unwrap();
//! let tracker = PresenceTracker::new(reader, TrackerConfig::new());
//!
//! let prompt = |_card: CardUid| -> Result<String, PromptError> { Ok("New member".to_string()) };
//! let mut coordinator = AttendanceCoordinator::new(&mut store, prompt);
//! coordinator.run(tracker).unwrap();
//! ```

// Public modules
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod presence;
pub mod reader;
pub mod storage;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StoreConfig, TrackerConfig, DEFAULT_COOLDOWN_SECS, DEFAULT_POLL_INTERVAL_MS};
pub use coordinator::{
    AttendanceCoordinator, CardOutcome, NamePrompt, NoIndicator, RunSummary, StatusIndicator,
};
pub use presence::{PresenceState, PresenceTracker, StopSignal};
pub use reader::CardReader;
pub use storage::{InMemoryBackend, JsonFileBackend, LoadOutcome, StorageBackend};
pub use store::RecordStore;
pub use types::{
    AttendanceError, AttendanceOutcome, CardRegistration, CardRemoval, CardUid,
    DeviceDescriptor, NewPersonOutcome, ParseCardUidError, Person, PersonId, PromptError,
    ReaderError, StoreError, UnixTime,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
