//! The record store
//!
//! `RecordStore` is the single source of truth for Person records. Every mutation
//! goes through its methods, which enforce:
//!
//! - card ownership is unique across all people,
//! - attendance entries for a person never go backwards in time,
//! - a mutation has been handed to the storage backend before the call returns `Ok`.
//!
//! Persistence is write-through: each successful mutation rewrites the whole store.
//! That is O(records) per write, which is fine at club-roster scale.
//!
//! If a save fails the in-memory change is kept and the error is returned; callers
//! should treat the mutation as possibly not durable and retry the whole operation.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::storage::{LoadOutcome, StorageBackend};
use crate::types::{
    AttendanceOutcome, CardRegistration, CardRemoval, CardUid, NewPersonOutcome, Person,
    PersonId, StoreError,
};
use std::collections::HashMap;

pub struct RecordStore<B, C = SystemClock> {
    backend: B,
    clock: C,
    config: StoreConfig,
    /// Records in persisted order
    people: Vec<Person>,
    /// Person id -> position in `people`
    index: HashMap<PersonId, usize>,
    /// Card -> owning person
    card_owners: HashMap<CardUid, PersonId>,
}

impl<B: StorageBackend> RecordStore<B> {
    /// Open a store with default configuration and the system clock
    pub fn open(backend: B) -> Result<Self, StoreError> {
        Self::open_with(backend, StoreConfig::default(), SystemClock)
    }
}

impl<B: StorageBackend, C: Clock> RecordStore<B, C> {
    /// Open a store, loading whatever the backend has persisted
    ///
    /// Corrupt persisted state is treated as an empty store (with a warning), never
    /// as a failure. Only genuine I/O errors are returned.
    pub fn open_with(mut backend: B, config: StoreConfig, clock: C) -> Result<Self, StoreError> {
        let people = match backend.load()? {
            LoadOutcome::Loaded(people) => people,
            LoadOutcome::Corrupt(reason) => {
                log::warn!("Persisted store is unreadable, starting empty: {}", reason);
                Vec::new()
            }
            LoadOutcome::Absent => {
                log::info!("No persisted store found, starting empty");
                Vec::new()
            }
        };

        let mut store = Self {
            backend,
            clock,
            config,
            people: Vec::new(),
            index: HashMap::new(),
            card_owners: HashMap::new(),
        };
        store.adopt(people);

        log::info!(
            "Record store opened: {} people, {} cards",
            store.people.len(),
            store.card_owners.len()
        );
        Ok(store)
    }

    /// Take ownership of loaded records, repairing anything that breaks the invariants
    fn adopt(&mut self, people: Vec<Person>) {
        for mut person in people {
            if self.index.contains_key(&person.id) {
                log::warn!("Dropping duplicate record for id {}", person.id);
                continue;
            }

            let claimed: Vec<CardUid> = person
                .cards
                .iter()
                .copied()
                .filter(|card| self.card_owners.contains_key(card))
                .collect();
            for card in claimed {
                log::warn!(
                    "Card {} of {} is already owned by {}, dropping it",
                    card,
                    person.id,
                    self.card_owners[&card]
                );
                person.cards.remove(&card);
            }

            if !person.attendance.windows(2).all(|w| w[0] <= w[1]) {
                log::warn!("Attendance for {} was out of order, sorting", person.id);
                person.attendance.sort_unstable();
            }

            for card in &person.cards {
                self.card_owners.insert(*card, person.id.clone());
            }
            self.index.insert(person.id.clone(), self.people.len());
            self.people.push(person);
        }
    }

    fn position(&self, id: &PersonId) -> Result<usize, StoreError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.backend.save(&self.people)
    }

    fn insert(&mut self, person: Person) -> usize {
        let pos = self.people.len();
        for card in &person.cards {
            self.card_owners.insert(*card, person.id.clone());
        }
        self.index.insert(person.id.clone(), pos);
        self.people.push(person);
        pos
    }

    /// Create a person with no cards and no attendance
    pub fn create_person(&mut self, name: impl Into<String>) -> Result<&Person, StoreError> {
        let pos = self.insert(Person::new(name));
        self.persist()?;

        let person = &self.people[pos];
        log::info!("Created person {} ({:?})", person.id, person.name);
        Ok(person)
    }

    /// Create a person who already owns `card`, in a single write
    ///
    /// Nothing is created when the card belongs to someone else.
    pub fn create_person_with_card(
        &mut self,
        name: impl Into<String>,
        card: CardUid,
    ) -> Result<NewPersonOutcome, StoreError> {
        if let Some(owner) = self.card_owners.get(&card) {
            return Ok(NewPersonOutcome::Conflict {
                owner: owner.clone(),
            });
        }

        let mut person = Person::new(name);
        person.cards.insert(card);
        let id = person.id.clone();
        self.insert(person);
        self.persist()?;

        log::info!("Created person {} owning card {}", id, card);
        Ok(NewPersonOutcome::Created(id))
    }

    pub fn find_by_id(&self, id: &PersonId) -> Option<&Person> {
        self.index.get(id).map(|&pos| &self.people[pos])
    }

    /// First person with this display name, in store order
    ///
    /// Names are not unique; never use this for identity decisions.
    pub fn find_by_name(&self, name: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.name == name)
    }

    pub fn find_by_card(&self, card: CardUid) -> Option<&Person> {
        self.card_owners
            .get(&card)
            .and_then(|owner| self.find_by_id(owner))
    }

    pub fn set_name(&mut self, id: &PersonId, name: impl Into<String>) -> Result<(), StoreError> {
        let pos = self.position(id)?;
        self.people[pos].name = name.into();
        self.persist()?;

        log::info!("Renamed {} to {:?}", id, self.people[pos].name);
        Ok(())
    }

    /// Give `card` to the person `id`
    ///
    /// Ownership is never transferred: a card held by someone else is reported as a
    /// conflict and nothing changes.
    pub fn register_card(
        &mut self,
        id: &PersonId,
        card: CardUid,
    ) -> Result<CardRegistration, StoreError> {
        let pos = self.position(id)?;

        if let Some(owner) = self.card_owners.get(&card) {
            if owner == id {
                return Ok(CardRegistration::Unchanged);
            }
            log::debug!("Card {} already belongs to {}", card, owner);
            return Ok(CardRegistration::Conflict {
                owner: owner.clone(),
            });
        }

        self.people[pos].cards.insert(card);
        self.card_owners.insert(card, id.clone());
        self.persist()?;

        log::info!("Registered card {} to {}", card, id);
        Ok(CardRegistration::Registered)
    }

    pub fn unregister_card(
        &mut self,
        id: &PersonId,
        card: CardUid,
    ) -> Result<CardRemoval, StoreError> {
        let pos = self.position(id)?;

        if !self.people[pos].cards.remove(&card) {
            return Ok(CardRemoval::NotOwned);
        }
        self.card_owners.remove(&card);
        self.persist()?;

        log::info!("Unregistered card {} from {}", card, id);
        Ok(CardRemoval::Removed)
    }

    /// Record that the person was seen now, unless they were seen within the cooldown
    ///
    /// A suppressed call writes nothing. A clock behind the last entry is always
    /// suppressed, whatever the cooldown, so entries stay in non-decreasing order.
    pub fn log_attendance(&mut self, id: &PersonId) -> Result<AttendanceOutcome, StoreError> {
        let pos = self.position(id)?;
        let now = self.clock.now();

        if let Some(last) = self.people[pos].last_seen() {
            if now < last {
                log::warn!(
                    "Clock is behind the last entry for {:?} ({} < {}), not logging",
                    self.people[pos].name,
                    now,
                    last
                );
                return Ok(AttendanceOutcome::Suppressed { last, now });
            }
            if now.saturating_sub(last) < self.config.cooldown_secs.max(0) {
                log::info!(
                    "Not logging repeat attendance for {:?}",
                    self.people[pos].name
                );
                return Ok(AttendanceOutcome::Suppressed { last, now });
            }
        }

        self.people[pos].attendance.push(now);
        self.persist()?;

        log::info!("Logged attendance for {:?}", self.people[pos].name);
        Ok(AttendanceOutcome::Accepted(now))
    }

    /// Ids of every person, in store order
    pub fn all_ids(&self) -> Vec<PersonId> {
        self.people.iter().map(|p| p.id.clone()).collect()
    }

    /// Every person, in store order
    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::InMemoryBackend;
    use std::collections::BTreeSet;

    const T0: i64 = 1_700_000_000;

    fn store() -> (RecordStore<InMemoryBackend, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let store =
            RecordStore::open_with(InMemoryBackend::new(), StoreConfig::default(), clock.clone())
                .unwrap();
        (store, clock)
    }

    fn new_id(store: &mut RecordStore<InMemoryBackend, ManualClock>, name: &str) -> PersonId {
        store.create_person(name).unwrap().id.clone()
    }

    #[test]
    fn test_create_person_persists() {
        let (mut store, _) = store();
        let id = new_id(&mut store, "Ada");

        let person = store.find_by_id(&id).unwrap();
        assert_eq!(person.name, "Ada");
        assert!(person.cards.is_empty());
        assert!(person.attendance.is_empty());

        assert_eq!(store.backend().save_count, 1);
        assert_eq!(store.backend().saved().unwrap()[0].id, id);
    }

    #[test]
    fn test_create_person_allows_empty_name() {
        let (mut store, _) = store();
        let id = new_id(&mut store, "");
        assert_eq!(store.find_by_id(&id).unwrap().name, "");
    }

    #[test]
    fn test_lookups() {
        let (mut store, _) = store();
        let first = new_id(&mut store, "Sam");
        let second = new_id(&mut store, "Sam");
        store.register_card(&second, CardUid(7)).unwrap();

        assert_eq!(store.find_by_name("Sam").unwrap().id, first);
        assert!(store.find_by_name("Nobody").is_none());
        assert_eq!(store.find_by_card(CardUid(7)).unwrap().id, second);
        assert!(store.find_by_card(CardUid(8)).is_none());
        assert!(store.find_by_id(&PersonId::from("missing")).is_none());
        assert_eq!(store.all_ids(), vec![first, second]);
    }

    #[test]
    fn test_set_name() {
        let (mut store, _) = store();
        let id = new_id(&mut store, "");
        store.set_name(&id, "Grace").unwrap();

        assert_eq!(store.find_by_id(&id).unwrap().name, "Grace");
        assert_eq!(store.backend().saved().unwrap()[0].name, "Grace");
    }

    #[test]
    fn test_unknown_person_is_an_error() {
        let (mut store, _) = store();
        let ghost = PersonId::from("ghost");

        assert!(matches!(
            store.set_name(&ghost, "x"),
            Err(StoreError::UnknownPerson(_))
        ));
        assert!(store.register_card(&ghost, CardUid(1)).is_err());
        assert!(store.log_attendance(&ghost).is_err());
        assert_eq!(store.backend().save_count, 0);
    }

    #[test]
    fn test_register_card_conflict_leaves_both_unchanged() {
        let (mut store, _) = store();
        let x = new_id(&mut store, "X");
        let y = new_id(&mut store, "Y");
        store.register_card(&x, CardUid(0xAA)).unwrap();
        store.register_card(&y, CardUid(0xBB)).unwrap();
        let saves = store.backend().save_count;

        let outcome = store.register_card(&y, CardUid(0xAA)).unwrap();
        assert_eq!(outcome, CardRegistration::Conflict { owner: x.clone() });

        assert_eq!(
            store.find_by_id(&x).unwrap().cards.iter().copied().collect::<Vec<_>>(),
            vec![CardUid(0xAA)]
        );
        assert_eq!(
            store.find_by_id(&y).unwrap().cards.iter().copied().collect::<Vec<_>>(),
            vec![CardUid(0xBB)]
        );
        assert_eq!(store.backend().save_count, saves);
    }

    #[test]
    fn test_register_card_twice_to_same_owner_is_unchanged() {
        let (mut store, _) = store();
        let id = new_id(&mut store, "Ada");

        assert_eq!(
            store.register_card(&id, CardUid(1)).unwrap(),
            CardRegistration::Registered
        );
        let saves = store.backend().save_count;
        assert_eq!(
            store.register_card(&id, CardUid(1)).unwrap(),
            CardRegistration::Unchanged
        );
        assert_eq!(store.backend().save_count, saves);
    }

    #[test]
    fn test_unregister_card_frees_it() {
        let (mut store, _) = store();
        let x = new_id(&mut store, "X");
        let y = new_id(&mut store, "Y");
        store.register_card(&x, CardUid(5)).unwrap();

        assert_eq!(
            store.unregister_card(&y, CardUid(5)).unwrap(),
            CardRemoval::NotOwned
        );
        assert_eq!(
            store.unregister_card(&x, CardUid(5)).unwrap(),
            CardRemoval::Removed
        );
        assert!(store.find_by_card(CardUid(5)).is_none());
        assert_eq!(store.backend().save_count, 4);
        assert!(store.backend().saved().unwrap()[0].cards.is_empty());
        assert_eq!(
            store.register_card(&y, CardUid(5)).unwrap(),
            CardRegistration::Registered
        );
    }

    #[test]
    fn test_cards_stay_disjoint_under_random_registrations() {
        let (mut store, _) = store();
        let ids: Vec<PersonId> = (0..5).map(|i| new_id(&mut store, &format!("p{i}"))).collect();

        // Deterministic LCG so the sequence is reproducible
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed >> 33
        };

        for _ in 0..500 {
            let who = &ids[(next() % ids.len() as u64) as usize];
            let card = CardUid(next() % 16);
            let owner_before = store.find_by_card(card).map(|p| p.id.clone());

            if next() % 4 == 0 {
                store.unregister_card(who, card).unwrap();
            } else {
                let outcome = store.register_card(who, card).unwrap();
                match owner_before {
                    Some(ref owner) if owner != who => {
                        assert_eq!(outcome, CardRegistration::Conflict { owner: owner.clone() });
                        assert_eq!(store.find_by_card(card).unwrap().id, *owner);
                    }
                    Some(_) => assert_eq!(outcome, CardRegistration::Unchanged),
                    None => assert_eq!(outcome, CardRegistration::Registered),
                }
            }

            let mut seen = std::collections::HashSet::new();
            for person in store.people() {
                for card in &person.cards {
                    assert!(seen.insert(*card), "card {} owned twice", card);
                }
            }
        }
    }

    #[test]
    fn test_cooldown_suppresses_within_window() {
        let (mut store, clock) = store();
        let id = new_id(&mut store, "Ada");

        assert_eq!(
            store.log_attendance(&id).unwrap(),
            AttendanceOutcome::Accepted(T0)
        );
        clock.advance(59);
        let saves = store.backend().save_count;
        assert_eq!(
            store.log_attendance(&id).unwrap(),
            AttendanceOutcome::Suppressed { last: T0, now: T0 + 59 }
        );
        assert_eq!(store.backend().save_count, saves);
        assert_eq!(store.find_by_id(&id).unwrap().attendance, vec![T0]);
    }

    #[test]
    fn test_cooldown_accepts_after_window() {
        let (mut store, clock) = store();
        let id = new_id(&mut store, "Ada");

        store.log_attendance(&id).unwrap();
        clock.advance(60);
        assert!(store.log_attendance(&id).unwrap().is_accepted());
        assert_eq!(store.find_by_id(&id).unwrap().attendance, vec![T0, T0 + 60]);
    }

    #[test]
    fn test_attendance_never_goes_backwards() {
        let (mut store, clock) = store();
        let id = new_id(&mut store, "Ada");

        for step in [0, 120, -500, 30, 61, -61, 3600, 0, 59, 1] {
            clock.advance(step);
            store.log_attendance(&id).unwrap();
            let attendance = &store.find_by_id(&id).unwrap().attendance;
            assert!(attendance.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_zero_cooldown_accepts_same_second() {
        let clock = ManualClock::new(T0);
        let mut store = RecordStore::open_with(
            InMemoryBackend::new(),
            StoreConfig::new().with_cooldown_secs(0),
            clock,
        )
        .unwrap();
        let id = store.create_person("Ada").unwrap().id.clone();

        store.log_attendance(&id).unwrap();
        store.log_attendance(&id).unwrap();
        assert_eq!(store.find_by_id(&id).unwrap().attendance, vec![T0, T0]);
    }

    #[test]
    fn test_negative_cooldown_from_config_still_suppresses_backwards_clock() {
        let config: StoreConfig = serde_json::from_str(r#"{"cooldown_secs": -5}"#).unwrap();
        assert_eq!(config.cooldown_secs, -5);

        let clock = ManualClock::new(1000);
        let mut store =
            RecordStore::open_with(InMemoryBackend::new(), config, clock.clone()).unwrap();
        let id = store.create_person("Ada").unwrap().id.clone();

        store.log_attendance(&id).unwrap();
        clock.advance(-3);
        assert_eq!(
            store.log_attendance(&id).unwrap(),
            AttendanceOutcome::Suppressed {
                last: 1000,
                now: 997
            }
        );
        clock.advance(3);
        assert!(store.log_attendance(&id).unwrap().is_accepted());
        assert_eq!(store.find_by_id(&id).unwrap().attendance, vec![1000, 1000]);
    }

    #[test]
    fn test_extreme_persisted_timestamp_does_not_overflow() {
        let person = Person {
            id: PersonId::from("old"),
            name: "Ada".to_string(),
            cards: BTreeSet::new(),
            attendance: vec![i64::MIN],
        };
        let clock = ManualClock::new(T0);
        let mut store = RecordStore::open_with(
            InMemoryBackend::with_people(vec![person]),
            StoreConfig::default(),
            clock,
        )
        .unwrap();
        let id = PersonId::from("old");

        assert_eq!(
            store.log_attendance(&id).unwrap(),
            AttendanceOutcome::Accepted(T0)
        );
        assert_eq!(
            store.find_by_id(&id).unwrap().attendance,
            vec![i64::MIN, T0]
        );
    }

    #[test]
    fn test_create_person_with_card() {
        let (mut store, _) = store();

        let id = match store.create_person_with_card("Ada", CardUid(0xDEAD)).unwrap() {
            NewPersonOutcome::Created(id) => id,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(store.find_by_card(CardUid(0xDEAD)).unwrap().id, id);
        assert_eq!(store.backend().save_count, 1);

        let outcome = store.create_person_with_card("Imposter", CardUid(0xDEAD)).unwrap();
        assert_eq!(outcome, NewPersonOutcome::Conflict { owner: id });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let (mut store, _) = store();
        let id = new_id(&mut store, "Ada");
        store.backend_mut().fail_on_save = true;

        assert!(matches!(
            store.log_attendance(&id),
            Err(StoreError::Backend(_))
        ));
        assert!(store.create_person("Bob").is_err());
        // The durable copy still reflects the last successful save
        assert_eq!(store.backend().saved().unwrap().len(), 1);
    }

    #[test]
    fn test_open_repairs_duplicate_card_claims() {
        let a = Person {
            id: PersonId::from("a"),
            name: "A".into(),
            cards: [CardUid(1), CardUid(2)].into_iter().collect(),
            attendance: vec![5, 3],
        };
        let b = Person {
            id: PersonId::from("b"),
            name: "B".into(),
            cards: [CardUid(2), CardUid(3)].into_iter().collect(),
            attendance: vec![],
        };
        let dup = Person {
            id: PersonId::from("a"),
            name: "A again".into(),
            cards: Default::default(),
            attendance: vec![],
        };

        let store = RecordStore::open(InMemoryBackend::with_people(vec![a, b, dup])).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_card(CardUid(2)).unwrap().id, PersonId::from("a"));
        assert_eq!(
            store.find_by_id(&PersonId::from("b")).unwrap().cards.len(),
            1
        );
        assert_eq!(
            store.find_by_id(&PersonId::from("a")).unwrap().attendance,
            vec![3, 5]
        );
    }
}
