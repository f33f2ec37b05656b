//! Presence tracking: turning repeated reader polls into arrival events
//!
//! A reader reports every card in its field on every poll, so a card resting on
//! the reader would otherwise be reported twice a second. The tracker remembers
//! which cards were visible on the previous tick and only emits a card when it goes
//! from absent to present:
//!
//! ```text
//! new_arrivals = current - last_seen
//! last_seen    = (last_seen & current) | new_arrivals
//! ```
//!
//! A card has to drop out of the field for at least one tick before it can be
//! emitted again. Repeats across separate presentations are the record store's
//! cooldown's job, not the tracker's.

use crate::config::TrackerConfig;
use crate::reader::CardReader;
use crate::types::{CardUid, ReaderError};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Shared cancellation flag for the polling loop
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Edge-detection state: the cards considered present as of the last tick
#[derive(Debug, Default)]
pub struct PresenceState {
    last_seen: HashSet<CardUid>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one tick and return the cards that just appeared, in ascending order
    pub fn observe(&mut self, current: &HashSet<CardUid>) -> Vec<CardUid> {
        let mut arrivals: Vec<CardUid> = current.difference(&self.last_seen).copied().collect();
        arrivals.sort_unstable();

        // Dropping departed cards and adding arrivals leaves exactly `current`.
        self.last_seen.retain(|card| current.contains(card));
        self.last_seen.extend(arrivals.iter().copied());

        arrivals
    }

    pub fn is_present(&self, card: CardUid) -> bool {
        self.last_seen.contains(&card)
    }

    pub fn present_count(&self) -> usize {
        self.last_seen.len()
    }
}

/// Lazily polls a reader and yields each card arrival once
///
/// The iterator only ends when the stop signal is raised or after it has yielded
/// a reader error. A reader failure is never turned into "no cards present".
pub struct PresenceTracker<R> {
    reader: R,
    state: PresenceState,
    pending: VecDeque<CardUid>,
    config: TrackerConfig,
    stop: StopSignal,
    ticks: u64,
    failed: bool,
}

impl<R: CardReader> PresenceTracker<R> {
    /// The reader must already have a device selected
    pub fn new(reader: R, config: TrackerConfig) -> Self {
        Self {
            reader,
            state: PresenceState::new(),
            pending: VecDeque::new(),
            config,
            stop: StopSignal::new(),
            ticks: 0,
            failed: false,
        }
    }

    /// Builder method: share an externally owned stop signal
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Poll once and queue the arrivals
    fn tick(&mut self) -> Result<(), ReaderError> {
        if self.ticks > 0 {
            let interval = self.config.poll_interval();
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        self.ticks += 1;

        let current = self.reader.poll()?;
        let arrivals = self.state.observe(&current);
        if !arrivals.is_empty() {
            log::debug!(
                "Tick {}: {} visible, new {:?}",
                self.ticks,
                current.len(),
                arrivals
            );
        }
        self.pending.extend(arrivals);
        Ok(())
    }
}

impl<R: CardReader> Iterator for PresenceTracker<R> {
    type Item = Result<CardUid, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(card) = self.pending.pop_front() {
                return Some(Ok(card));
            }
            if self.stop.is_stopped() {
                log::debug!("Presence tracker stopped after {} ticks", self.ticks);
                return None;
            }
            if let Err(e) = self.tick() {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}
