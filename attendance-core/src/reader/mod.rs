//! Card reader contract and adapters
//!
//! The core only needs three things from hardware: enumerate devices, pick one,
//! and poll the set of card UIDs currently in the field. Adapters implement
//! [`CardReader`]; nothing else in the crate knows about driver calling conventions.

use crate::types::{CardUid, DeviceDescriptor, ReaderError};
use std::collections::HashSet;

pub mod nfc;
pub mod scripted;

pub use nfc::{NfcLibraries, NfcReader};
pub use scripted::{ScriptedPoll, ScriptedReader};

pub trait CardReader {
    /// Devices available to this adapter, in driver order
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, ReaderError>;

    /// Acquire a device; selecting a second one without releasing is an error
    fn select(&mut self, device: &DeviceDescriptor) -> Result<(), ReaderError>;

    /// UIDs visible right now (possibly none)
    ///
    /// Communication failures must be returned as errors, never as an empty set.
    fn poll(&mut self) -> Result<HashSet<CardUid>, ReaderError>;
}

impl<R: CardReader + ?Sized> CardReader for Box<R> {
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, ReaderError> {
        (**self).list_devices()
    }

    fn select(&mut self, device: &DeviceDescriptor) -> Result<(), ReaderError> {
        (**self).select(device)
    }

    fn poll(&mut self) -> Result<HashSet<CardUid>, ReaderError> {
        (**self).poll()
    }
}

/// Select the first device the reader reports
pub fn select_first_device<R: CardReader + ?Sized>(
    reader: &mut R,
) -> Result<DeviceDescriptor, ReaderError> {
    let devices = reader.list_devices()?;
    log::info!("Found reader devices {:?}", devices);

    let device = devices.into_iter().next().ok_or(ReaderError::NoDevices)?;
    log::info!("Using reader {}", device);
    reader.select(&device)?;
    Ok(device)
}

/// Select the device with the given connection string
pub fn select_named_device<R: CardReader + ?Sized>(
    reader: &mut R,
    name: &str,
) -> Result<DeviceDescriptor, ReaderError> {
    let device = reader
        .list_devices()?
        .into_iter()
        .find(|d| d.0 == name)
        .ok_or_else(|| ReaderError::OpenFailed(name.to_string()))?;
    log::info!("Using reader {}", device);
    reader.select(&device)?;
    Ok(device)
}
