// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Operator session: the bootloader's command/mode state machine.
//!
//! The session owns the byte channel, the storage backend and the alarm
//! timer. The firmware feeds it received bytes and elapsed time; it answers
//! on the channel and tells the caller when to hand over to the application.

use core::fmt::{self, Write};

use crate::channel::{ByteChannel, Console};
use crate::config::{
    self, ChannelEntry, ChannelLabel, DeviceId, EntryResult, Field, Frequency, IdEntry, ModeEntry,
    OperatingMode,
};
use crate::handover::VectorTable;
use crate::image::ImageBuffer;
use crate::integrity;
use crate::layout::{Region, BOOT_BUILD, BOOT_SUB_VERSION, BOOT_VERSION};
use crate::log::{debug, info, warn};
use crate::storage::{Storage, StorageError};
use crate::timer::{AlarmTimer, INDICATOR_PERIOD_MS, POWER_ON_GRACE_MS, SESSION_WINDOW_MS};
use crate::transfer::{self, TransferError, SP};

/// Answer to a received space.
pub const SPACE_ACK: u8 = 0x08;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Initial,
    EnterId,
    EnterChannel,
    EnterMode,
}

/// What the firmware should do after a session event.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Stay,
    /// A valid application is flashed; leave the bootloader.
    HandOver(VectorTable),
}

pub struct Session<'a, C, S> {
    channel: C,
    storage: S,
    image: &'a mut ImageBuffer,
    timer: AlarmTimer,
    mode: InputMode,
    id_entry: IdEntry,
    channel_entry: ChannelEntry,
    mode_entry: ModeEntry,
}

impl<'a, C: ByteChannel, S: Storage> Session<'a, C, S> {
    pub fn new(channel: C, storage: S, image: &'a mut ImageBuffer) -> Self {
        Self {
            channel,
            storage,
            image,
            timer: AlarmTimer::new(),
            mode: InputMode::Initial,
            id_entry: IdEntry::new(),
            channel_entry: ChannelEntry::new(),
            mode_entry: ModeEntry::new(),
        }
    }

    /// Arm the power-on grace period and the indicator, then greet the
    /// operator.
    pub fn start(&mut self) {
        self.timer.set_deadline(POWER_ON_GRACE_MS);
        self.timer.set_toggle_period(INDICATOR_PERIOD_MS);
        self.say(format_args!("\n\r Start bootloader software"));
        self.print_device_info();
    }

    pub fn input_mode(&self) -> InputMode {
        self.mode
    }

    pub fn timer(&self) -> &AlarmTimer {
        &self.timer
    }

    pub fn image(&self) -> &ImageBuffer {
        &*self.image
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Account for elapsed time on the 1 ms time base.
    pub fn advance(&mut self, ms: u32) {
        self.timer.advance(ms);
    }

    /// True when the liveness indicator should toggle.
    pub fn indicator_due(&mut self) -> bool {
        self.timer.is_toggle_due()
    }

    /// Check the handover deadline. An expired deadline without a valid
    /// application keeps the session open for another window.
    pub fn poll_deadline(&mut self) -> Step {
        if !self.timer.is_expired() {
            return Step::Stay;
        }
        info!("Session: deadline expired");
        let step = self.jump();
        if step == Step::Stay {
            self.timer.set_deadline(SESSION_WINDOW_MS);
        }
        step
    }

    /// Process one operator byte.
    pub fn handle_byte(&mut self, byte: u8) -> Step {
        self.timer.set_deadline(SESSION_WINDOW_MS);
        if byte == SP {
            self.channel.write_byte(SPACE_ACK);
        }

        let step = match self.mode {
            InputMode::Initial => self.command(byte),
            InputMode::EnterId => {
                let result = self.id_entry.feed(&mut self.storage, Field::Id, byte);
                self.finish_entry(Field::Id, result);
                Step::Stay
            }
            InputMode::EnterChannel => {
                let result = self.channel_entry.feed(&mut self.storage, Field::Channel, byte);
                self.finish_entry(Field::Channel, result);
                Step::Stay
            }
            InputMode::EnterMode => {
                let result = self.mode_entry.feed(&mut self.storage, byte);
                self.finish_entry(Field::Mode, result);
                Step::Stay
            }
        };

        // Commands may block for a long time (downloads).
        self.timer.set_deadline(SESSION_WINDOW_MS);
        step
    }

    fn command(&mut self, byte: u8) -> Step {
        match byte {
            b'd' => self.download(),
            b'y' => self.commit(),
            b'j' => return self.jump(),
            b'i' => {
                self.id_entry.reset();
                self.enter(InputMode::EnterId);
            }
            b'c' => {
                self.channel_entry.reset();
                self.enter(InputMode::EnterChannel);
            }
            b'm' => {
                self.mode_entry.reset();
                self.enter(InputMode::EnterMode);
            }
            b'p' => self.print_device_info(),
            b'h' => self.print_help(),
            b'\r' | b'\n' => self.say(format_args!(" connection OK\n\r")),
            _ => {}
        }
        Step::Stay
    }

    fn enter(&mut self, mode: InputMode) {
        debug!("Session: {} -> {}", self.mode, mode);
        self.mode = mode;
    }

    fn finish_entry(&mut self, field: Field, result: EntryResult) {
        match result {
            EntryResult::Continue => {}
            EntryResult::Accepted(value) => {
                self.enter(InputMode::Initial);
                match field {
                    Field::Id => {
                        self.say(format_args!("\n\r New device ID is {} \n\r", DeviceId(value)))
                    }
                    Field::Channel => {
                        self.say(format_args!(
                            "\n\r New frequency channel is {} \n\r",
                            ChannelLabel(value)
                        ));
                        self.say(format_args!("\n\r New frequency {}.\n\r", Frequency(value)));
                    }
                    Field::Mode => {
                        if let Some(mode) = OperatingMode::from_config(value) {
                            self.say(format_args!("\n\r New Mode is {} ,\n\r", mode.name()));
                        }
                    }
                }
            }
            EntryResult::Rejected(_) => {
                self.enter(InputMode::Initial);
                self.say(format_args!("\n\r Error. \n\r"));
            }
        }
    }

    fn download(&mut self) {
        match transfer::receive(&mut self.channel, self.image.bytes_mut()) {
            Err(TransferError::TimedOut) => self.say(format_args!("\n\r time out.\n\r")),
            Err(TransferError::BadHeader) => self.say(format_args!("\n\r inappropriate file.\n\r")),
            Err(e) => self.say(format_args!("\n\r error {} .\n\r", e.code())),
            Ok(n) => {
                self.say(format_args!("\n\r read {} bytes.\n\r", n));
                match self.image.validate() {
                    Ok(version) => {
                        self.say(format_args!(" Application version {}.\n\r", version))
                    }
                    Err(_) => self.say(format_args!(
                        "CRC or Version number of downladed file is not correct.\n\r"
                    )),
                }
            }
        }
    }

    fn commit(&mut self) {
        if self.image.validate().is_err() {
            self.say(format_args!(
                "\n\r File doesn't contain valid application code.\n\r"
            ));
            return;
        }

        match self
            .storage
            .erase_and_write_words(Region::Application, 0, self.image.words())
        {
            Ok(()) => {
                info!("Session: application committed");
                self.say(format_args!(
                    "\n\r Data was successfully written in Flash memory.\n\r"
                ));
            }
            Err(StorageError::Erase) => {
                warn!("Session: erase failed");
                self.say(format_args!("\n\r Error occurred while Flash erase.\n\r "));
            }
            Err(e) => {
                warn!("Session: program failed: {}", e);
                self.say(format_args!(
                    "\n\r Error occurred while writing data in Flash memory.\n\r"
                ));
            }
        }
    }

    fn flashed_application(&mut self) -> Option<VectorTable> {
        integrity::validate_flashed(&mut self.storage).ok()?;
        VectorTable::read(&mut self.storage).ok()
    }

    fn jump(&mut self) -> Step {
        match self.flashed_application() {
            Some(vt) => {
                self.say(format_args!("\n\r Exit from bootloader.\n\r"));
                self.say(format_args!(" Go to application.\n\r"));
                Step::HandOver(vt)
            }
            None => {
                self.say(format_args!("\n\r Application doesn't exist.\n\r"));
                Step::Stay
            }
        }
    }

    fn print_device_info(&mut self) {
        let record = config::read_record(&mut self.storage).ok();
        let get = |field| record.and_then(|r| r.get(field));

        match get(Field::Id) {
            Some(id) => self.say(format_args!("\n\r Device ID {}.\n\r", DeviceId(id))),
            None => self.say(format_args!("\n\r Device ID doesn't exist.\n\r")),
        }

        let channel = get(Field::Channel);
        match channel {
            Some(ch) => {
                self.say(format_args!(" Channel {}.\n\r", ChannelLabel(ch)));
                self.say(format_args!(" Frequency {}.\n\r", Frequency(ch)));
            }
            None => self.say(format_args!(" Channel isn't set.\n\r")),
        }

        match channel {
            Some(ch) if config::is_marport_channel(ch) => {
                self.say(format_args!(" {} mode .\n\r", OperatingMode::Marport.name()))
            }
            Some(_) => match get(Field::Mode).and_then(OperatingMode::from_config) {
                Some(mode) => self.say(format_args!(" {} mode .\n\r", mode.name())),
                None => self.say(format_args!(" Mode isn't set.\n\r")),
            },
            None => {}
        }

        self.say(format_args!(
            "\n\r Bootloader version {}.{} build {}.\n\r",
            BOOT_VERSION, BOOT_SUB_VERSION, BOOT_BUILD
        ));
        match integrity::validate_flashed(&mut self.storage) {
            Ok(version) => self.say(format_args!(" Application version {}.\n\r", version)),
            Err(_) => self.say(format_args!(" Application doesn't exist.\n\r")),
        }
    }

    fn print_help(&mut self) {
        self.say(format_args!(
            "\n\r d - Download image\
             \n\r j - Start application\
             \n\r i - Enter Device ID\
             \n\r m - Enter mode\
             \n\r c - Enter channel\
             \n\r p - Print device information\
             \n\r return - check connection\n\r"
        ));
    }

    fn say(&mut self, args: fmt::Arguments<'_>) {
        // Console writes never fail.
        let _ = Console::new(&mut self.channel).write_fmt(args);
    }
}
