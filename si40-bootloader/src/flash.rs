// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash erase/program using RP2040 ROM routines, exposed as [`Storage`].
//!
//! On RP2040, flash operations (erase/program) require disabling XIP first.
//! The full sequence is:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! All code executing during steps 1-5 must run from RAM, not flash.
//! We use `#[link_section = ".data"]` to place critical functions in RAM,
//! and pre-resolve all ROM function pointers at init time.

use si40_common::board::MappedFlash;
use si40_common::layout::{Region, FLASH_BASE, FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE};
use si40_common::storage::{check_bounds, ReadStorage, Storage, StorageError};

// ROM function pointer types
type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

/// ROM function pointers, resolved once at init from the ROM table.
/// Stored in static RAM so RAM-resident functions can call them without
/// accessing flash-based code.
static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

const SECTOR_ERASE_CMD: u8 = 0x20;
const PAGE: usize = FLASH_PAGE_SIZE as usize;

/// Look up a ROM function by its two-character tag.
/// ROM table pointer at 0x14 and lookup function at 0x18 are 16-bit halfword pointers.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// Initialize ROM flash function pointers. Must be called once before any flash operations.
/// This performs ROM table lookups which require XIP to be active.
pub fn init() {
    unsafe {
        ROM_CONNECT_INTERNAL_FLASH =
            core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF"));
        ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX"));
        ROM_FLASH_RANGE_ERASE =
            core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE"));
        ROM_FLASH_RANGE_PROGRAM =
            core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP"));
        ROM_FLASH_FLUSH_CACHE = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC"));
        ROM_FLASH_ENTER_CMD_XIP =
            core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX"));
    }
}

/// Erase flash at the given flash-relative offset.
///
/// # Safety
/// The `init()` function must have been called first.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_erase(offset: u32, size: u32) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_ERASE(offset, size as usize, FLASH_SECTOR_SIZE, SECTOR_ERASE_CMD);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// Program one or more pages at the given flash-relative offset.
///
/// # Safety
/// The `init()` function must have been called first.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_program(offset: u32, data: *const u8, len: usize) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_PROGRAM(offset, data, len);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

const fn align_down(addr: u32, align: u32) -> u32 {
    addr & !(align - 1)
}

const fn align_up(addr: u32, align: u32) -> u32 {
    align_down(addr + align - 1, align)
}

fn is_erased(start: u32, end: u32) -> bool {
    (start..end)
        .step_by(4)
        .all(|addr| unsafe { (addr as *const u32).read_volatile() } == 0xFFFF_FFFF)
}

/// On-board QSPI flash. Writes erase every sector they touch, program whole
/// pages (bytes outside `words` stay erased) and are verified by read-back.
pub struct RomFlash {
    mapped: MappedFlash,
}

impl RomFlash {
    /// # Safety
    /// [`init`] must have run, and nothing else may touch flash while this
    /// value is in use.
    pub unsafe fn new() -> Self {
        Self {
            mapped: MappedFlash,
        }
    }
}

impl ReadStorage for RomFlash {
    fn read_words(
        &mut self,
        region: Region,
        word_offset: usize,
        out: &mut [u32],
    ) -> Result<(), StorageError> {
        self.mapped.read_words(region, word_offset, out)
    }
}

impl Storage for RomFlash {
    fn erase_and_write_words(
        &mut self,
        region: Region,
        word_offset: usize,
        words: &[u32],
    ) -> Result<(), StorageError> {
        check_bounds(region, word_offset, words.len())?;
        if words.is_empty() {
            return Ok(());
        }

        let start = region.base() + word_offset as u32 * 4;
        let end = start + words.len() as u32 * 4;

        let erase_start = align_down(start, FLASH_SECTOR_SIZE);
        let erase_end = align_up(end, FLASH_SECTOR_SIZE);
        unsafe { flash_erase(erase_start - FLASH_BASE, erase_end - erase_start) };
        if !is_erased(erase_start, erase_end) {
            defmt::println!("Erase verify failed at 0x{:08x}", erase_start);
            return Err(StorageError::Erase);
        }

        let mut page_addr = align_down(start, FLASH_PAGE_SIZE);
        while page_addr < end {
            let mut page = [0xFFu8; PAGE];
            for (i, slot) in page.chunks_exact_mut(4).enumerate() {
                let addr = page_addr + i as u32 * 4;
                if (start..end).contains(&addr) {
                    let word = words[((addr - start) / 4) as usize];
                    slot.copy_from_slice(&word.to_le_bytes());
                }
            }
            unsafe { flash_program(page_addr - FLASH_BASE, page.as_ptr(), page.len()) };
            page_addr += FLASH_PAGE_SIZE;
        }

        let mut readback = [0u32; 64];
        for (chunk_index, expected) in words.chunks(readback.len()).enumerate() {
            let got = &mut readback[..expected.len()];
            self.read_words(region, word_offset + chunk_index * 64, got)?;
            if got != expected {
                defmt::println!("Program verify failed in {}", region);
                return Err(StorageError::Program);
            }
        }

        defmt::println!(
            "Flashed {} words at 0x{:08x}",
            words.len(),
            start
        );
        Ok(())
    }
}
