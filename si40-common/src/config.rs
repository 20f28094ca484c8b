// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Device configuration record and guided operator entry.
//!
//! The configuration region starts with six words:
//! `ID, Channel, Mode, IDCheck, ChannelCheck, ModeCheck`, where every check
//! word must equal its value plus [`CHECK_OFFSET`]. The record is always read
//! and rewritten as a whole; only one value/check pair changes per write.

use core::fmt;
use core::ops::RangeInclusive;

use thiserror::Error;

use crate::layout::Region;
use crate::log::{info, warn};
use crate::storage::{ReadStorage, Storage, StorageError};

pub const CHECK_OFFSET: u32 = 100;
pub const CONFIG_WORDS: usize = 6;

pub const ID_DIGITS: usize = 4;
pub const CHANNEL_DIGITS: usize = 2;

pub const ID_RANGE: RangeInclusive<u32> = 1..=9999;
pub const CHANNEL_RANGE: RangeInclusive<u32> = 1..=35;
pub const MARPORT_CHANNELS: RangeInclusive<u32> = 31..=35;
pub const MODE_RANGE: RangeInclusive<u32> = 1..=3;

const fn check_of(value: u32) -> u32 {
    value.wrapping_add(CHECK_OFFSET)
}

/// The three configurable values.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Id,
    Channel,
    Mode,
}

impl Field {
    pub const fn domain(self) -> RangeInclusive<u32> {
        match self {
            Field::Id => ID_RANGE,
            Field::Channel => CHANNEL_RANGE,
            Field::Mode => MODE_RANGE,
        }
    }

    const fn value_index(self) -> usize {
        match self {
            Field::Id => 0,
            Field::Channel => 1,
            Field::Mode => 2,
        }
    }

    const fn check_index(self) -> usize {
        self.value_index() + 3
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Id => "device ID",
            Field::Channel => "channel",
            Field::Mode => "mode",
        })
    }
}

/// Raw contents of the configuration record, as stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigRecord {
    words: [u32; CONFIG_WORDS],
}

impl ConfigRecord {
    pub const fn from_words(words: [u32; CONFIG_WORDS]) -> Self {
        Self { words }
    }

    pub const fn words(&self) -> &[u32; CONFIG_WORDS] {
        &self.words
    }

    /// Stored value, if its check word matches and it lies in the domain.
    pub fn get(&self, field: Field) -> Option<u32> {
        let value = self.words[field.value_index()];
        let check = self.words[field.check_index()];
        (check == check_of(value) && field.domain().contains(&value)).then_some(value)
    }

    pub fn set(&mut self, field: Field, value: u32) {
        self.words[field.value_index()] = value;
        self.words[field.check_index()] = check_of(value);
    }
}

pub fn read_record<S: ReadStorage + ?Sized>(storage: &mut S) -> Result<ConfigRecord, StorageError> {
    let mut words = [0u32; CONFIG_WORDS];
    storage.read_words(Region::Config, 0, &mut words)?;
    Ok(ConfigRecord::from_words(words))
}

pub fn read_field<S: ReadStorage + ?Sized>(storage: &mut S, field: Field) -> Option<u32> {
    read_record(storage).ok()?.get(field)
}

/// Read-modify-write of one value and its check word.
pub fn write_field<S: Storage + ?Sized>(
    storage: &mut S,
    field: Field,
    value: u32,
) -> Result<(), StorageError> {
    let mut record = read_record(storage)?;
    record.set(field, value);
    storage.erase_and_write_words(Region::Config, 0, record.words())?;
    info!("Config: {} = {}", field, value);
    Ok(())
}

pub fn read_id<S: ReadStorage + ?Sized>(storage: &mut S) -> Option<u32> {
    read_field(storage, Field::Id)
}

pub fn read_channel<S: ReadStorage + ?Sized>(storage: &mut S) -> Option<u32> {
    read_field(storage, Field::Channel)
}

pub fn read_mode<S: ReadStorage + ?Sized>(storage: &mut S) -> Option<u32> {
    read_field(storage, Field::Mode)
}

pub fn write_id<S: Storage + ?Sized>(storage: &mut S, id: u32) -> Result<(), StorageError> {
    write_field(storage, Field::Id, id)
}

pub fn write_channel<S: Storage + ?Sized>(storage: &mut S, channel: u32) -> Result<(), StorageError> {
    write_field(storage, Field::Channel, channel)
}

pub fn write_mode<S: Storage + ?Sized>(storage: &mut S, mode: u32) -> Result<(), StorageError> {
    write_field(storage, Field::Mode, mode)
}

// --- Operating mode ---

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingMode {
    Fast,
    Normal,
    Slow,
    /// Implied by channels 31-35, whatever the stored mode.
    Marport,
}

impl OperatingMode {
    pub const fn from_config(mode: u32) -> Option<Self> {
        match mode {
            1 => Some(OperatingMode::Fast),
            2 => Some(OperatingMode::Normal),
            3 => Some(OperatingMode::Slow),
            _ => None,
        }
    }

    /// Column of the wake schedule table.
    pub const fn index(self) -> usize {
        match self {
            OperatingMode::Fast => 0,
            OperatingMode::Normal => 1,
            OperatingMode::Slow => 2,
            OperatingMode::Marport => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            OperatingMode::Fast => "PI_FAST",
            OperatingMode::Normal => "PI_NORMAL",
            OperatingMode::Slow => "PI_SLOW",
            OperatingMode::Marport => "Marport",
        }
    }
}

pub fn is_marport_channel(channel: u32) -> bool {
    MARPORT_CHANNELS.contains(&channel)
}

/// Mode the device actually runs in: Marport on channels 31-35, otherwise
/// the stored mode. `None` if neither is configured.
pub fn effective_mode<S: ReadStorage + ?Sized>(storage: &mut S) -> Option<OperatingMode> {
    let record = read_record(storage).ok()?;
    if record.get(Field::Channel).is_some_and(is_marport_channel) {
        return Some(OperatingMode::Marport);
    }
    record.get(Field::Mode).and_then(OperatingMode::from_config)
}

// --- Display helpers ---

const MARPORT_FREQUENCIES_HZ: [u32; 5] = [43_200, 43_100, 43_000, 43_300, 43_400];

/// Carrier frequency for a channel.
pub fn frequency_hz(channel: u32) -> Option<u32> {
    match channel {
        1..=30 => Some(43_600 + 200 * (channel - 1)),
        31..=35 => Some(MARPORT_FREQUENCIES_HZ[(channel - 31) as usize]),
        _ => None,
    }
}

/// Device ID rendered as four digits.
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 9999 {
            return f.write_str("no ID");
        }
        write!(f, "{:04}", self.0)
    }
}

/// Channel rendered the way the operator knows it.
pub struct ChannelLabel(pub u32);

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1..=30 => write!(f, "Ch {:02}", self.0),
            31..=35 => write!(f, "BoatCode/Ch: C{}/Ch6", self.0 - 30),
            _ => f.write_str("no Channel"),
        }
    }
}

/// Frequency rendered as `NNNNNHz`.
pub struct Frequency(pub u32);

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match frequency_hz(self.0) {
            Some(hz) => write!(f, "{}Hz", hz),
            None => f.write_str("No frequency"),
        }
    }
}

// --- Guided entry ---

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("value {0} out of range")]
    Domain(u32),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of feeding one operator byte to a guided entry.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryResult {
    /// Stay in the entry mode.
    Continue,
    /// Value committed to storage.
    Accepted(u32),
    /// Entry finished without committing.
    Rejected(ConfigError),
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Fixed-width decimal shift register. Typing more than `N` digits drops
/// the oldest ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigitEntry<const N: usize> {
    digits: [u8; N],
}

pub type IdEntry = DigitEntry<ID_DIGITS>;
pub type ChannelEntry = DigitEntry<CHANNEL_DIGITS>;

impl<const N: usize> DigitEntry<N> {
    pub const fn new() -> Self {
        Self { digits: [0; N] }
    }

    pub fn reset(&mut self) {
        self.digits = [0; N];
    }

    pub fn push(&mut self, digit: u8) {
        self.digits.copy_within(1.., 0);
        self.digits[N - 1] = digit;
    }

    pub fn value(&self) -> u32 {
        self.digits
            .iter()
            .fold(0, |acc, &d| acc * 10 + u32::from(d))
    }

    /// Feed one operator byte; on CR/LF validate against `field`'s domain and
    /// commit. A byte that is neither a digit nor a terminator restarts the
    /// entry.
    pub fn feed<S: Storage + ?Sized>(&mut self, storage: &mut S, field: Field, byte: u8) -> EntryResult {
        if is_terminator(byte) {
            return commit(storage, field, self.value());
        }
        if byte.is_ascii_digit() {
            self.push(byte - b'0');
        } else {
            self.reset();
        }
        EntryResult::Continue
    }
}

impl<const N: usize> Default for DigitEntry<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-digit mode entry: keeps the last of `1`-`3` typed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeEntry {
    mode: u8,
}

impl ModeEntry {
    pub const fn new() -> Self {
        Self { mode: 0 }
    }

    pub fn reset(&mut self) {
        self.mode = 0;
    }

    pub fn feed<S: Storage + ?Sized>(&mut self, storage: &mut S, byte: u8) -> EntryResult {
        match byte {
            b'\r' | b'\n' => return commit(storage, Field::Mode, u32::from(self.mode)),
            b'1'..=b'3' => self.mode = byte - b'0',
            _ => self.reset(),
        }
        EntryResult::Continue
    }
}

fn commit<S: Storage + ?Sized>(storage: &mut S, field: Field, value: u32) -> EntryResult {
    if !field.domain().contains(&value) {
        warn!("Config: {} value {} rejected", field, value);
        return EntryResult::Rejected(ConfigError::Domain(value));
    }
    match write_field(storage, field, value) {
        Ok(()) => EntryResult::Accepted(value),
        Err(e) => {
            warn!("Config: write of {} failed: {}", field, e);
            EntryResult::Rejected(ConfigError::Storage(e))
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_record_check_pairs() {
        let mut record = ConfigRecord::from_words([0; CONFIG_WORDS]);
        record.set(Field::Channel, 17);
        assert_eq!(record.words(), &[0, 17, 0, 0, 117, 0]);
        assert_eq!(record.get(Field::Channel), Some(17));
        assert_eq!(record.get(Field::Id), None);
    }

    #[test]
    fn test_erased_record_is_unset() {
        let record = ConfigRecord::from_words([0xFFFF_FFFF; CONFIG_WORDS]);
        assert_eq!(record.get(Field::Id), None);
        assert_eq!(record.get(Field::Channel), None);
        assert_eq!(record.get(Field::Mode), None);
    }

    #[test]
    fn test_digit_entry_drops_oldest_digit() {
        let mut entry = IdEntry::new();
        for d in [1, 2, 3, 4, 5] {
            entry.push(d);
        }
        assert_eq!(entry.value(), 2345);
    }

    #[test]
    fn test_frequency_table() {
        assert_eq!(frequency_hz(1), Some(43_600));
        assert_eq!(frequency_hz(17), Some(46_800));
        assert_eq!(frequency_hz(30), Some(49_400));
        assert_eq!(frequency_hz(31), Some(43_200));
        assert_eq!(frequency_hz(35), Some(43_400));
        assert_eq!(frequency_hz(0), None);
        assert_eq!(frequency_hz(36), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(DeviceId(7).to_string(), "0007");
        assert_eq!(ChannelLabel(5).to_string(), "Ch 05");
        assert_eq!(ChannelLabel(33).to_string(), "BoatCode/Ch: C3/Ch6");
        assert_eq!(ChannelLabel(0).to_string(), "no Channel");
        assert_eq!(Frequency(2).to_string(), "43800Hz");
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(OperatingMode::from_config(2), Some(OperatingMode::Normal));
        assert_eq!(OperatingMode::from_config(4), None);
        assert_eq!(OperatingMode::Marport.index(), 3);
        assert_eq!(OperatingMode::Slow.name(), "PI_SLOW");
    }
}
