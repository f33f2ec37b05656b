//! Reader that replays a fixed sequence of polls

use super::CardReader;
use crate::presence::StopSignal;
use crate::types::{CardUid, DeviceDescriptor, ReaderError};
use std::collections::{HashSet, VecDeque};

/// One scripted poll result
#[derive(Debug)]
pub enum ScriptedPoll {
    Cards(HashSet<CardUid>),
    Fail(String),
}

impl ScriptedPoll {
    pub fn cards<I: IntoIterator<Item = u64>>(cards: I) -> Self {
        ScriptedPoll::Cards(cards.into_iter().map(CardUid).collect())
    }
}

/// Replays polls in order; once the script runs out every poll sees no cards
pub struct ScriptedReader {
    polls: VecDeque<ScriptedPoll>,
    devices: Vec<DeviceDescriptor>,
    selected: Option<DeviceDescriptor>,
    stop_when_exhausted: Option<StopSignal>,
    poll_count: usize,
}

impl ScriptedReader {
    pub fn new(polls: Vec<ScriptedPoll>) -> Self {
        Self {
            polls: polls.into(),
            devices: vec![DeviceDescriptor("scripted:0".to_string())],
            selected: None,
            stop_when_exhausted: None,
            poll_count: 0,
        }
    }

    /// Convenience constructor from plain UID lists
    pub fn from_cards<I, S>(polls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = u64>,
    {
        Self::new(polls.into_iter().map(ScriptedPoll::cards).collect())
    }

    /// Builder method: replace the advertised devices
    pub fn with_devices(mut self, devices: Vec<DeviceDescriptor>) -> Self {
        self.devices = devices;
        self
    }

    /// Builder method: raise `stop` on the first poll after the script runs out
    pub fn stop_when_exhausted(mut self, stop: StopSignal) -> Self {
        self.stop_when_exhausted = Some(stop);
        self
    }

    pub fn selected(&self) -> Option<&DeviceDescriptor> {
        self.selected.as_ref()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count
    }
}

impl CardReader for ScriptedReader {
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, ReaderError> {
        Ok(self.devices.clone())
    }

    fn select(&mut self, device: &DeviceDescriptor) -> Result<(), ReaderError> {
        if self.selected.is_some() {
            return Err(ReaderError::AlreadySelected);
        }
        self.selected = Some(device.clone());
        Ok(())
    }

    fn poll(&mut self) -> Result<HashSet<CardUid>, ReaderError> {
        self.poll_count += 1;
        match self.polls.pop_front() {
            Some(ScriptedPoll::Cards(cards)) => Ok(cards),
            Some(ScriptedPoll::Fail(reason)) => Err(ReaderError::Poll(reason)),
            None => {
                if let Some(stop) = &self.stop_when_exhausted {
                    stop.stop();
                }
                Ok(HashSet::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_then_goes_quiet() {
        let stop = StopSignal::new();
        let mut reader = ScriptedReader::new(vec![
            ScriptedPoll::cards([1]),
            ScriptedPoll::Fail("unplugged".into()),
        ])
        .stop_when_exhausted(stop.clone());

        assert_eq!(reader.poll().unwrap(), [CardUid(1)].into_iter().collect::<HashSet<_>>());
        assert!(matches!(reader.poll(), Err(ReaderError::Poll(_))));
        assert!(!stop.is_stopped());
        assert!(reader.poll().unwrap().is_empty());
        assert!(stop.is_stopped());
        assert_eq!(reader.poll_count(), 3);
    }

    #[test]
    fn test_select_twice_fails() {
        let mut reader = ScriptedReader::new(Vec::new());
        let device = reader.list_devices().unwrap().remove(0);
        reader.select(&device).unwrap();
        assert!(matches!(
            reader.select(&device),
            Err(ReaderError::AlreadySelected)
        ));
    }
}
