// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared logic for the Si40 beacon bootloader, beacon firmware and upload
//! tool.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools and tests
//! - `embedded` feature: RP2040 flash, watchdog scratch and handover bindings
//! - `defmt` feature: Routes internal logging to `defmt`

#![cfg_attr(not(feature = "std"), no_std)]

mod log;

pub mod channel;
pub mod config;
pub mod duty_cycle;
pub mod handover;
pub mod image;
pub mod integrity;
pub mod layout;
pub mod session;
pub mod storage;
pub mod timer;
pub mod transfer;

#[cfg(feature = "embedded")]
pub mod board;

// Re-export commonly used types
pub use channel::{ByteChannel, Console, Timeout};
pub use config::{ConfigError, ConfigRecord, EntryResult, Field, OperatingMode};
pub use duty_cycle::{BackupRegister, BackupRegisters, Cycle, SensorState, WakeAction, WakeSchedule};
pub use handover::{start_application, Handover, VectorTable};
pub use image::{ImageBuffer, ImageError, VersionRecord};
pub use integrity::{CrcMatch, IntegrityError};
pub use layout::{Region, APP_ADDR, CONFIG_ADDR, MAX_DOWNLOAD_BYTES};
pub use session::{InputMode, Session, Step};
pub use storage::{ReadStorage, Storage, StorageError};
pub use timer::AlarmTimer;
pub use transfer::{Malformation, TransferError};
