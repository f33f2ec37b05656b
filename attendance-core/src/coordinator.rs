//! Attendance coordinator
//!
//! Consumes card arrival events and turns them into record store mutations:
//!
//! 1. Known card: log attendance for its owner (the store applies the cooldown).
//! 2. Unknown card: ask the operator for a name, create the person owning the card,
//!    then log attendance.
//!
//! The name prompt blocks. While it is outstanding no further events are drained;
//! the tracker's edge state is untouched, so cards still on the reader when the
//! loop resumes are not reported twice.
//!
//! Per-event failures (storage, operator input) are logged and the loop moves on.
//! Only a reader failure ends a run.

use crate::clock::Clock;
use crate::storage::StorageBackend;
use crate::store::RecordStore;
use crate::types::{
    AttendanceError, AttendanceOutcome, CardUid, NewPersonOutcome, PersonId, PromptError,
    ReaderError,
};

/// Supplies the display name for a card nobody owns yet
pub trait NamePrompt {
    fn prompt_for_name(&mut self, card: CardUid) -> Result<String, PromptError>;
}

impl<F> NamePrompt for F
where
    F: FnMut(CardUid) -> Result<String, PromptError>,
{
    fn prompt_for_name(&mut self, card: CardUid) -> Result<String, PromptError> {
        self(card)
    }
}

/// Operator-facing status feedback (lights, beeps, console lines)
///
/// Every method defaults to doing nothing.
pub trait StatusIndicator {
    fn registration_started(&mut self, _card: CardUid) {}
    fn registration_finished(&mut self) {}
    fn attendance_accepted(&mut self, _name: &str) {}
    fn attendance_suppressed(&mut self, _name: &str) {}
    fn event_failed(&mut self, _card: CardUid, _error: &AttendanceError) {}
}

/// Indicator that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {}

/// What happened to one card event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOutcome {
    /// Known card; the store accepted or suppressed the entry
    Logged {
        person: PersonId,
        attendance: AttendanceOutcome,
    },
    /// Unknown card; a new person was created and their attendance logged
    Registered {
        person: PersonId,
        attendance: AttendanceOutcome,
    },
}

/// Counts for one run of the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub accepted: u64,
    pub suppressed: u64,
    pub registered: u64,
    pub failed: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &CardOutcome) {
        let attendance = match outcome {
            CardOutcome::Logged { attendance, .. } => attendance,
            CardOutcome::Registered { attendance, .. } => {
                self.registered += 1;
                attendance
            }
        };
        if attendance.is_accepted() {
            self.accepted += 1;
        } else {
            self.suppressed += 1;
        }
    }
}

pub struct AttendanceCoordinator<'a, B, C, P, I = NoIndicator> {
    store: &'a mut RecordStore<B, C>,
    prompt: P,
    indicator: I,
}

impl<'a, B, C, P> AttendanceCoordinator<'a, B, C, P, NoIndicator>
where
    B: StorageBackend,
    C: Clock,
    P: NamePrompt,
{
    pub fn new(store: &'a mut RecordStore<B, C>, prompt: P) -> Self {
        Self {
            store,
            prompt,
            indicator: NoIndicator,
        }
    }
}

impl<'a, B, C, P, I> AttendanceCoordinator<'a, B, C, P, I>
where
    B: StorageBackend,
    C: Clock,
    P: NamePrompt,
    I: StatusIndicator,
{
    /// Builder method: attach a status indicator
    pub fn with_indicator<J: StatusIndicator>(self, indicator: J) -> AttendanceCoordinator<'a, B, C, P, J> {
        AttendanceCoordinator {
            store: self.store,
            prompt: self.prompt,
            indicator,
        }
    }

    pub fn store(&self) -> &RecordStore<B, C> {
        self.store
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Drain card events until the stream ends
    ///
    /// A reader error ends the run and is returned. Anything that goes wrong while
    /// handling a single card is logged, counted and skipped.
    pub fn run<E>(&mut self, events: E) -> Result<RunSummary, ReaderError>
    where
        E: IntoIterator<Item = Result<CardUid, ReaderError>>,
    {
        log::info!("Begin logging attendance");
        let mut summary = RunSummary::default();

        for event in events {
            let card = event?;
            summary.events += 1;

            match self.handle_card(card) {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    log::error!("Failed to handle card {}: {}", card, e);
                    self.indicator.event_failed(card, &e);
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "Attendance loop finished: {} events, {} logged, {} repeats, {} new, {} failed",
            summary.events,
            summary.accepted,
            summary.suppressed,
            summary.registered,
            summary.failed
        );
        Ok(summary)
    }

    /// Handle one card arrival
    pub fn handle_card(&mut self, card: CardUid) -> Result<CardOutcome, AttendanceError> {
        if let Some(owner) = self.store.find_by_card(card) {
            let person = owner.id.clone();
            let attendance = self.log_for(&person)?;
            return Ok(CardOutcome::Logged { person, attendance });
        }

        log::info!("Registering new person for card {}", card);
        self.indicator.registration_started(card);
        let result = self.register(card);
        self.indicator.registration_finished();
        result
    }

    fn register(&mut self, card: CardUid) -> Result<CardOutcome, AttendanceError> {
        let name = self.prompt.prompt_for_name(card)?;
        self.complete_registration(card, name)
    }

    /// Create the person owning `card`, or, if the card was claimed since it was
    /// looked up, log attendance for the real owner instead
    fn complete_registration(
        &mut self,
        card: CardUid,
        name: String,
    ) -> Result<CardOutcome, AttendanceError> {
        match self.store.create_person_with_card(name.as_str(), card)? {
            NewPersonOutcome::Created(person) => {
                let attendance = self.log_for(&person)?;
                log::info!("Success - registered {:?} and logged attendance", name);
                Ok(CardOutcome::Registered { person, attendance })
            }
            NewPersonOutcome::Conflict { owner } => {
                log::warn!("Card {} already belongs to {}, logging for them", card, owner);
                let attendance = self.log_for(&owner)?;
                Ok(CardOutcome::Logged {
                    person: owner,
                    attendance,
                })
            }
        }
    }

    fn log_for(&mut self, person: &PersonId) -> Result<AttendanceOutcome, AttendanceError> {
        let outcome = self.store.log_attendance(person)?;

        let name = self
            .store
            .find_by_id(person)
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        match outcome {
            AttendanceOutcome::Accepted(_) => self.indicator.attendance_accepted(name),
            AttendanceOutcome::Suppressed { .. } => self.indicator.attendance_suppressed(name),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StoreConfig;
    use crate::storage::InMemoryBackend;

    const T0: i64 = 1_700_000_000;

    type TestStore = RecordStore<InMemoryBackend, ManualClock>;

    fn store() -> (TestStore, ManualClock) {
        let clock = ManualClock::new(T0);
        let store =
            RecordStore::open_with(InMemoryBackend::new(), StoreConfig::default(), clock.clone())
                .unwrap();
        (store, clock)
    }

    fn no_prompt(card: CardUid) -> Result<String, PromptError> {
        panic!("unexpected prompt for {}", card)
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl StatusIndicator for Recorder {
        fn registration_started(&mut self, card: CardUid) {
            self.calls.push(format!("start {}", card));
        }
        fn registration_finished(&mut self) {
            self.calls.push("finish".to_string());
        }
        fn attendance_accepted(&mut self, name: &str) {
            self.calls.push(format!("ok {}", name));
        }
        fn attendance_suppressed(&mut self, name: &str) {
            self.calls.push(format!("repeat {}", name));
        }
        fn event_failed(&mut self, card: CardUid, _error: &AttendanceError) {
            self.calls.push(format!("failed {}", card));
        }
    }

    #[test]
    fn test_known_card_logs_attendance() {
        let (mut store, _) = store();
        let id = store.create_person("Ada").unwrap().id.clone();
        store.register_card(&id, CardUid(1)).unwrap();

        let mut coordinator = AttendanceCoordinator::new(&mut store, no_prompt);
        let outcome = coordinator.handle_card(CardUid(1)).unwrap();
        assert_eq!(
            outcome,
            CardOutcome::Logged {
                person: id.clone(),
                attendance: AttendanceOutcome::Accepted(T0)
            }
        );

        // Same second again: cooldown, not an error
        let outcome = coordinator.handle_card(CardUid(1)).unwrap();
        assert!(matches!(
            outcome,
            CardOutcome::Logged {
                attendance: AttendanceOutcome::Suppressed { .. },
                ..
            }
        ));
        assert_eq!(store.find_by_id(&id).unwrap().attendance.len(), 1);
    }

    #[test]
    fn test_unknown_card_registers_person() {
        let (mut store, _) = store();
        let mut prompted = Vec::new();
        let prompt = |card: CardUid| -> Result<String, PromptError> {
            prompted.push(card);
            Ok("Ada".to_string())
        };

        let mut coordinator =
            AttendanceCoordinator::new(&mut store, prompt).with_indicator(Recorder::default());
        let outcome = coordinator.handle_card(CardUid(0xDEAD)).unwrap();
        assert!(matches!(outcome, CardOutcome::Registered { .. }));
        assert_eq!(
            coordinator.indicator().calls,
            vec!["start 0xdead", "ok Ada", "finish"]
        );
        drop(coordinator);

        assert_eq!(prompted, vec![CardUid(0xDEAD)]);
        assert_eq!(store.len(), 1);
        let person = store.find_by_card(CardUid(0xDEAD)).unwrap();
        assert_eq!(person.name, "Ada");
        assert_eq!(person.attendance, vec![T0]);
    }

    #[test]
    fn test_card_claimed_during_prompt_goes_to_real_owner() {
        let (mut store, _) = store();
        let owner = store.create_person("Owner").unwrap().id.clone();
        // Claimed after the coordinator's lookup but before registration completes
        store.register_card(&owner, CardUid(9)).unwrap();

        let mut coordinator = AttendanceCoordinator::new(&mut store, no_prompt);
        let outcome = coordinator
            .complete_registration(CardUid(9), "Latecomer".to_string())
            .unwrap();
        assert_eq!(
            outcome,
            CardOutcome::Logged {
                person: owner.clone(),
                attendance: AttendanceOutcome::Accepted(T0)
            }
        );
        drop(coordinator);

        // No orphaned, cardless record was left behind
        assert_eq!(store.len(), 1);
        assert!(store.find_by_name("Latecomer").is_none());
    }

    #[test]
    fn test_prompt_failure_is_per_event() {
        let (mut store, _) = store();
        let id = store.create_person("Ada").unwrap().id.clone();
        store.register_card(&id, CardUid(2)).unwrap();

        let prompt = |_card: CardUid| -> Result<String, PromptError> { Err(PromptError::Closed) };
        let mut coordinator =
            AttendanceCoordinator::new(&mut store, prompt).with_indicator(Recorder::default());

        let events = vec![Ok(CardUid(1)), Ok(CardUid(2))];
        let summary = coordinator.run(events).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                events: 2,
                accepted: 1,
                suppressed: 0,
                registered: 0,
                failed: 1
            }
        );
        assert_eq!(
            coordinator.indicator().calls,
            vec!["start 0x1", "finish", "failed 0x1", "ok Ada"]
        );
        drop(coordinator);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_failure_does_not_stop_the_loop() {
        let (mut store, clock) = store();
        let id = store.create_person("Ada").unwrap().id.clone();
        store.register_card(&id, CardUid(2)).unwrap();
        store.backend_mut().fail_on_save = true;

        let mut coordinator = AttendanceCoordinator::new(&mut store, no_prompt);
        let summary = coordinator.run(vec![Ok(CardUid(2))]).unwrap();
        assert_eq!(summary.failed, 1);
        drop(coordinator);

        store.backend_mut().fail_on_save = false;
        clock.advance(120);
        let mut coordinator = AttendanceCoordinator::new(&mut store, no_prompt);
        let summary = coordinator.run(vec![Ok(CardUid(2))]).unwrap();
        assert_eq!(summary.accepted, 1);
    }

    #[test]
    fn test_reader_error_ends_run() {
        let (mut store, _) = store();
        let id = store.create_person("Ada").unwrap().id.clone();
        store.register_card(&id, CardUid(2)).unwrap();

        let mut coordinator = AttendanceCoordinator::new(&mut store, no_prompt);
        let events = vec![
            Ok(CardUid(2)),
            Err(ReaderError::Poll("gone".to_string())),
            Ok(CardUid(2)),
        ];
        assert!(matches!(
            coordinator.run(events),
            Err(ReaderError::Poll(_))
        ));
        drop(coordinator);
        assert_eq!(store.find_by_id(&id).unwrap().attendance.len(), 1);
    }
}
