//! Administration commands: inspect and edit the roster
//!
//! These never run concurrently with the attendance loop against the same file;
//! the store assumes a single writer.

use crate::display;
use anyhow::{bail, Context, Result};
use attendance_core::reader::{select_first_device, select_named_device};
use attendance_core::{
    CardReader, CardRegistration, CardRemoval, CardUid, Clock, NewPersonOutcome, PersonId,
    RecordStore, StorageBackend,
};
use std::io::Write;
use std::thread;
use std::time::Duration;

/// Find a person by id first, then by display name
pub fn resolve_person<B, C>(store: &RecordStore<B, C>, selector: &str) -> Result<PersonId>
where
    B: StorageBackend,
    C: Clock,
{
    if let Some(person) = store.find_by_id(&PersonId::from(selector)) {
        return Ok(person.id.clone());
    }
    match store.find_by_name(selector) {
        Some(person) => Ok(person.id.clone()),
        None => bail!("No person matches {:?}", selector),
    }
}

pub fn list<B, C, W>(store: &RecordStore<B, C>, out: &mut W) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    write!(out, "{}", display::render_roster(store.people()))?;
    Ok(())
}

pub fn show<B, C, W>(store: &RecordStore<B, C>, selector: &str, out: &mut W) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    let id = resolve_person(store, selector)?;
    if let Some(person) = store.find_by_id(&id) {
        writeln!(out, "Id:    {}", person.id)?;
        writeln!(out, "Cards: {}", display::format_cards(&person.cards))?;
        write!(out, "{}", display::render_history(person))?;
    }
    Ok(())
}

pub fn rename<B, C, W>(
    store: &mut RecordStore<B, C>,
    selector: &str,
    name: &str,
    out: &mut W,
) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    let name = name.trim();
    if name.is_empty() {
        bail!("Name must not be empty");
    }
    let id = resolve_person(store, selector)?;
    store.set_name(&id, name).context("Failed to save new name")?;
    writeln!(out, "✓ Renamed {} to {}", id, name)?;
    Ok(())
}

/// Add a card, refusing (with the owner's name) if someone else holds it
pub fn add_card<B, C, W>(
    store: &mut RecordStore<B, C>,
    selector: &str,
    card: CardUid,
    out: &mut W,
) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    let id = resolve_person(store, selector)?;
    match store
        .register_card(&id, card)
        .context("Failed to save card")?
    {
        CardRegistration::Registered => writeln!(out, "✓ Added card {}", card)?,
        CardRegistration::Unchanged => writeln!(out, "Card {} is already registered to them", card)?,
        CardRegistration::Conflict { owner } => {
            let owner_name = store
                .find_by_id(&owner)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| owner.to_string());
            bail!("{} already has card {}", owner_name, card);
        }
    }
    Ok(())
}

pub fn remove_card<B, C, W>(
    store: &mut RecordStore<B, C>,
    selector: &str,
    card: CardUid,
    out: &mut W,
) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    let id = resolve_person(store, selector)?;
    match store
        .unregister_card(&id, card)
        .context("Failed to save card removal")?
    {
        CardRemoval::Removed => writeln!(out, "✓ Removed card {}", card)?,
        CardRemoval::NotOwned => bail!("They do not own card {}", card),
    }
    Ok(())
}

/// Create a person explicitly, optionally with a first card
pub fn register<B, C, W>(
    store: &mut RecordStore<B, C>,
    name: &str,
    card: Option<CardUid>,
    out: &mut W,
) -> Result<()>
where
    B: StorageBackend,
    C: Clock,
    W: Write,
{
    let name = name.trim();
    if name.is_empty() {
        bail!("Name must not be empty");
    }

    let id = match card {
        None => store.create_person(name).context("Failed to save person")?.id.clone(),
        Some(card) => match store
            .create_person_with_card(name, card)
            .context("Failed to save person")?
        {
            NewPersonOutcome::Created(id) => id,
            NewPersonOutcome::Conflict { owner } => {
                let owner_name = store
                    .find_by_id(&owner)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| owner.to_string());
                bail!("{} already has card {}", owner_name, card);
            }
        },
    };
    writeln!(out, "✓ Registered {} ({})", name, id)?;
    Ok(())
}

/// Wait for a card to be presented on the configured (or first) reader
pub fn scan_card<R: CardReader>(
    reader: &mut R,
    device: Option<&str>,
    interval: Duration,
) -> Result<CardUid> {
    match device {
        Some(name) => select_named_device(reader, name)
            .with_context(|| format!("NFC device {} is not available", name))?,
        None => select_first_device(reader)
            .context("No NFC devices found; pass the card UID instead")?,
    };
    println!("Scan a card now");

    loop {
        let visible = reader.poll().context("Card reader failed")?;
        if let Some(card) = visible.into_iter().min() {
            return Ok(card);
        }
        thread::sleep(interval);
    }
}
