//! Core types for the attendance library
//!
//! This module defines the record types persisted by the store, the status values
//! returned by store operations, and the error enums shared across the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Seconds since the Unix epoch, UTC
pub type UnixTime = i64;

/// Hardware-assigned identifier read from a proximity card
///
/// Displayed as lowercase `0x`-prefixed hex and persisted as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardUid(pub u64);

impl CardUid {
    /// Parse a UID as printed by the reader (hex digits, `0x` prefix optional)
    pub fn from_hex(s: &str) -> std::result::Result<Self, ParseCardUidError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(ParseCardUidError(s.to_string()));
        }

        u64::from_str_radix(digits, 16)
            .map(CardUid)
            .map_err(|_| ParseCardUidError(s.to_string()))
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for CardUid {
    type Err = ParseCardUidError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u64> for CardUid {
    fn from(value: u64) -> Self {
        CardUid(value)
    }
}

/// Error returned when a card UID string is not valid hex
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid card UID: {0:?}")]
pub struct ParseCardUidError(String);

/// Opaque, stable identifier of a Person record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    /// Allocate a fresh random identifier (32 lowercase hex digits)
    pub fn generate() -> Self {
        PersonId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        PersonId(value.to_string())
    }
}

impl From<String> for PersonId {
    fn from(value: String) -> Self {
        PersonId(value)
    }
}

/// One attendee record, exactly as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Assigned at creation, never reassigned
    pub id: PersonId,
    /// Display name
    pub name: String,
    /// Cards owned by this person (disjoint from every other person's cards)
    #[serde(default)]
    pub cards: BTreeSet<CardUid>,
    /// Accepted "seen" events, oldest first
    #[serde(default)]
    pub attendance: Vec<UnixTime>,
}

impl Person {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            id: PersonId::generate(),
            name: name.into(),
            cards: BTreeSet::new(),
            attendance: Vec::new(),
        }
    }

    /// Most recent accepted attendance timestamp
    pub fn last_seen(&self) -> Option<UnixTime> {
        self.attendance.last().copied()
    }

    pub fn owns(&self, card: CardUid) -> bool {
        self.cards.contains(&card)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(
            f,
            "Person[id={}, name={}, cards=[{}], attendance={} entries]",
            self.id,
            self.name,
            cards.join(", "),
            self.attendance.len()
        )
    }
}

/// Outcome of claiming a card for a person
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardRegistration {
    /// The card now belongs to the person
    Registered,
    /// The person already owned the card; nothing was written
    Unchanged,
    /// Another person owns the card; nothing was written
    Conflict { owner: PersonId },
}

/// Outcome of releasing a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardRemoval {
    Removed,
    NotOwned,
}

/// Outcome of creating a person together with their first card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewPersonOutcome {
    Created(PersonId),
    Conflict { owner: PersonId },
}

/// Outcome of an attendance log request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceOutcome {
    /// A new entry was appended and persisted
    Accepted(UnixTime),
    /// Inside the cooldown window; nothing was written
    Suppressed { last: UnixTime, now: UnixTime },
}

impl AttendanceOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AttendanceOutcome::Accepted(_))
    }
}

/// Identifier of a reader device (a libnfc connection string for NFC hardware)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor(pub String);

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by the record store and its storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown person: {0}")]
    UnknownPerson(PersonId),

    #[error("Failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Errors raised by card readers
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to load reader library: {0}")]
    Library(String),

    #[error("No reader devices found")]
    NoDevices,

    #[error("A reader device is already selected")]
    AlreadySelected,

    #[error("No reader device selected")]
    NotSelected,

    #[error("Failed to open reader device {0}")]
    OpenFailed(String),

    #[error("Reader poll failed: {0}")]
    Poll(String),
}

/// Errors raised while asking the operator for input
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Operator input closed")]
    Closed,

    #[error("Prompt IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error from handling a single card event
///
/// Reader failures are not included; they end the whole run instead.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}
