// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory stand-ins for the hardware capabilities.

#![allow(dead_code)]

use std::collections::VecDeque;

use si40_common::channel::{ByteChannel, Timeout};
use si40_common::duty_cycle::{BackupRegister, BackupRegisters};
use si40_common::handover::Handover;
use si40_common::image::{ImageBuffer, VersionRecord};
use si40_common::layout::{Region, FLASH_SECTOR_SIZE};
use si40_common::storage::{check_bounds, ReadStorage, Storage, StorageError};
use si40_common::transfer;

/// Initial stack pointer and reset vector of the test firmware.
pub const TEST_SP: u32 = 0x2004_2000;
pub const TEST_ENTRY: u32 = 0x1001_00C1;

// =============================================================================
// Byte channel
// =============================================================================

/// Replays queued input and times out once it runs dry.
#[derive(Default)]
pub struct ScriptedChannel {
    input: VecDeque<u8>,
    pub output: Vec<u8>,
    /// Timeout passed to every `read_byte` call, in order.
    pub reads: Vec<u32>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let mut channel = Self::new();
        channel.push(bytes);
        channel
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    pub fn pending(&self) -> usize {
        self.input.len()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> String {
        let text = self.output_text();
        self.output.clear();
        text
    }
}

impl ByteChannel for ScriptedChannel {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, Timeout> {
        self.reads.push(timeout_ms);
        self.input.pop_front().ok_or(Timeout)
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
    }
}

// =============================================================================
// Storage
// =============================================================================

const SECTOR_WORDS: usize = FLASH_SECTOR_SIZE as usize / 4;

/// RAM flash with the same erase granularity as the real part.
pub struct RamFlash {
    config: Vec<u32>,
    app: Vec<u32>,
    pub fail_read: bool,
    pub fail_erase: bool,
    pub fail_program: bool,
    pub writes: usize,
}

impl RamFlash {
    /// Fully erased flash.
    pub fn new() -> Self {
        Self {
            config: vec![0xFFFF_FFFF; Region::Config.size_words()],
            app: vec![0xFFFF_FFFF; Region::Application.size_words()],
            fail_read: false,
            fail_erase: false,
            fail_program: false,
            writes: 0,
        }
    }

    /// Flash holding `image` in the application region.
    pub fn with_app(image: &ImageBuffer) -> Self {
        let mut flash = Self::new();
        flash.app.copy_from_slice(image.words());
        flash
    }

    pub fn region(&self, region: Region) -> &[u32] {
        match region {
            Region::Config => &self.config,
            Region::Application => &self.app,
        }
    }

    pub fn region_mut(&mut self, region: Region) -> &mut [u32] {
        match region {
            Region::Config => &mut self.config,
            Region::Application => &mut self.app,
        }
    }
}

impl ReadStorage for RamFlash {
    fn read_words(
        &mut self,
        region: Region,
        word_offset: usize,
        out: &mut [u32],
    ) -> Result<(), StorageError> {
        check_bounds(region, word_offset, out.len())?;
        if self.fail_read {
            return Err(StorageError::OutOfBounds);
        }
        out.copy_from_slice(&self.region(region)[word_offset..word_offset + out.len()]);
        Ok(())
    }
}

impl Storage for RamFlash {
    fn erase_and_write_words(
        &mut self,
        region: Region,
        word_offset: usize,
        words: &[u32],
    ) -> Result<(), StorageError> {
        check_bounds(region, word_offset, words.len())?;
        if self.fail_erase {
            return Err(StorageError::Erase);
        }
        let first = word_offset / SECTOR_WORDS * SECTOR_WORDS;
        let last = (word_offset + words.len()).div_ceil(SECTOR_WORDS) * SECTOR_WORDS;
        let fail_program = self.fail_program;
        let mem = self.region_mut(region);
        let last = last.min(mem.len());
        mem[first..last].fill(0xFFFF_FFFF);
        if fail_program {
            return Err(StorageError::Program);
        }
        mem[word_offset..word_offset + words.len()].copy_from_slice(words);
        self.writes += 1;
        Ok(())
    }
}

// =============================================================================
// Handover and backup registers
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoverCall {
    DisableInterrupts,
    StackPointer(u32),
    VectorTableBase(u32),
    Jump(u32),
}

#[derive(Default)]
pub struct RecordingHandover {
    pub calls: Vec<HandoverCall>,
}

impl Handover for RecordingHandover {
    fn disable_interrupts(&mut self) {
        self.calls.push(HandoverCall::DisableInterrupts);
    }

    fn set_stack_pointer(&mut self, addr: u32) {
        self.calls.push(HandoverCall::StackPointer(addr));
    }

    fn set_vector_table_base(&mut self, addr: u32) {
        self.calls.push(HandoverCall::VectorTableBase(addr));
    }

    fn jump(&mut self, entry: u32) {
        self.calls.push(HandoverCall::Jump(entry));
    }
}

#[derive(Default)]
pub struct MemoryBackup {
    values: [u32; 3],
    pub writes: Vec<(BackupRegister, u32)>,
}

impl MemoryBackup {
    pub fn with(wake_time: u32, repetitions: u32, reminder: u32) -> Self {
        Self {
            values: [wake_time, repetitions, reminder],
            writes: Vec::new(),
        }
    }

    pub fn read_value(&self, reg: BackupRegister) -> u32 {
        self.values[Self::index(reg)]
    }

    fn index(reg: BackupRegister) -> usize {
        match reg {
            BackupRegister::WakeTime => 0,
            BackupRegister::Repetitions => 1,
            BackupRegister::Reminder => 2,
        }
    }
}

impl BackupRegisters for MemoryBackup {
    fn read(&self, reg: BackupRegister) -> u32 {
        self.values[Self::index(reg)]
    }

    fn write(&mut self, reg: BackupRegister, value: u32) {
        self.values[Self::index(reg)] = value;
        self.writes.push((reg, value));
    }
}

// =============================================================================
// Images
// =============================================================================

/// A small firmware binary starting with a plausible vector table.
pub fn test_firmware() -> Vec<u8> {
    let mut fw = Vec::new();
    fw.extend_from_slice(&TEST_SP.to_le_bytes());
    fw.extend_from_slice(&TEST_ENTRY.to_le_bytes());
    fw.extend((0..1024u32).map(|i| (i * 7 % 251) as u8));
    fw
}

pub fn valid_image() -> ImageBuffer {
    ImageBuffer::pack(&test_firmware(), VersionRecord::new(2, 8, 82)).unwrap()
}

/// Transfer framing for `image`.
pub fn encode(image: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(transfer::encoded_len(image.len()));
    transfer::encode_into(image, |b| out.push(b));
    out
}
