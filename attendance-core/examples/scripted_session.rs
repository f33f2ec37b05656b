//! Replay a short card session without hardware
//!
//! Two members tap in, one leaves a card on the reader, one taps twice within the
//! cooldown. Everything is kept in memory.
//!
//! Run with: cargo run --example scripted_session

use attendance_core::reader::{select_first_device, ScriptedReader};
use attendance_core::{
    AttendanceCoordinator, CardUid, InMemoryBackend, ManualClock, PresenceTracker, PromptError,
    RecordStore, StopSignal, StoreConfig, TrackerConfig,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stop = StopSignal::new();
    let mut reader = ScriptedReader::from_cards(vec![
        vec![0xA1],
        vec![0xA1],
        vec![0xA1, 0xB2],
        vec![],
        vec![0xB2],
    ])
    .stop_when_exhausted(stop.clone());
    if let Err(e) = select_first_device(&mut reader) {
        eprintln!("No reader: {}", e);
        return;
    }
    let tracker = PresenceTracker::new(reader, TrackerConfig::new().with_poll_interval_ms(100))
        .with_stop_signal(stop);

    let clock = ManualClock::new(1_700_000_000);
    let mut store =
        match RecordStore::open_with(InMemoryBackend::new(), StoreConfig::new(), clock) {
            Ok(store) => store,
            Err(e) => {
                eprintln!("Failed to open store: {}", e);
                return;
            }
        };

    let mut members = vec!["Grace".to_string(), "Ada".to_string()];
    let prompt = |card: CardUid| -> Result<String, PromptError> {
        let name = members.pop().ok_or(PromptError::Closed)?;
        println!("{} registers as {}", card, name);
        Ok(name)
    };

    let summary = match AttendanceCoordinator::new(&mut store, prompt).run(tracker) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Reader failed: {}", e);
            return;
        }
    };

    println!("\n{:?}", summary);
    for person in store.people() {
        println!("{}", person);
    }
}
