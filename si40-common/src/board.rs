// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RP2040 bindings shared by the bootloader and the beacon firmware.
//!
//! - [`MappedFlash`] reads both regions through the XIP window.
//! - [`WatchdogScratch`] keeps the duty-cycle schedule and the standby marker
//!   in the watchdog scratch registers, which survive a watchdog reset.
//! - [`CortexHandover`] performs the actual jump into the application.

use rp2040_hal::pac;

use crate::duty_cycle::{BackupRegister, BackupRegisters};
use crate::handover::{start_application, Handover, VectorTable};
use crate::layout::Region;
use crate::storage::{check_bounds, ReadStorage, StorageError};

const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;

/// Written to the marker register right before deep sleep.
pub const STANDBY_MAGIC: u32 = 0x5134_0057;

/// Both regions through the memory-mapped flash window.
#[derive(Clone, Copy, Debug, Default)]
pub struct MappedFlash;

impl ReadStorage for MappedFlash {
    fn read_words(
        &mut self,
        region: Region,
        word_offset: usize,
        out: &mut [u32],
    ) -> Result<(), StorageError> {
        check_bounds(region, word_offset, out.len())?;
        let base = (region.base() as *const u32).wrapping_add(word_offset);
        for (i, word) in out.iter_mut().enumerate() {
            *word = unsafe { base.add(i).read_volatile() };
        }
        Ok(())
    }
}

/// Scratch registers that survive a watchdog reset. 0-2 hold the wake
/// schedule, 3 the standby marker and 5 the residual sleep. Scratch 4 is
/// reserved by the boot ROM.
#[derive(Debug, Default)]
pub struct WatchdogScratch {
    _private: (),
}

#[derive(Clone, Copy)]
enum Scratch {
    WakeTime,
    Repetitions,
    Reminder,
    Standby,
    Residual,
}

impl WatchdogScratch {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    fn regs() -> &'static pac::watchdog::RegisterBlock {
        unsafe { &*pac::WATCHDOG::ptr() }
    }

    fn read_scratch(&self, reg: Scratch) -> u32 {
        let wd = Self::regs();
        match reg {
            Scratch::WakeTime => wd.scratch0().read().bits(),
            Scratch::Repetitions => wd.scratch1().read().bits(),
            Scratch::Reminder => wd.scratch2().read().bits(),
            Scratch::Standby => wd.scratch3().read().bits(),
            Scratch::Residual => wd.scratch5().read().bits(),
        }
    }

    fn write_scratch(&mut self, reg: Scratch, value: u32) {
        let wd = Self::regs();
        match reg {
            Scratch::WakeTime => wd.scratch0().write(|w| unsafe { w.bits(value) }),
            Scratch::Repetitions => wd.scratch1().write(|w| unsafe { w.bits(value) }),
            Scratch::Reminder => wd.scratch2().write(|w| unsafe { w.bits(value) }),
            Scratch::Standby => wd.scratch3().write(|w| unsafe { w.bits(value) }),
            Scratch::Residual => wd.scratch5().write(|w| unsafe { w.bits(value) }),
        };
    }

    /// True if the chip was reset by the watchdog at the end of a deep sleep.
    pub fn resumed_from_standby(&self) -> bool {
        Self::regs().reason().read().timer().bit_is_set()
            && self.read_scratch(Scratch::Standby) == STANDBY_MAGIC
    }

    pub fn mark_standby(&mut self) {
        self.write_scratch(Scratch::Standby, STANDBY_MAGIC);
    }

    pub fn clear_standby(&mut self) {
        self.write_scratch(Scratch::Standby, 0);
    }

    /// Sleep ticks still owed from a sleep longer than one watchdog period.
    pub fn residual(&self) -> u32 {
        self.read_scratch(Scratch::Residual)
    }

    pub fn set_residual(&mut self, ticks: u32) {
        self.write_scratch(Scratch::Residual, ticks);
    }
}

impl BackupRegisters for WatchdogScratch {
    fn read(&self, reg: BackupRegister) -> u32 {
        self.read_scratch(reg.into())
    }

    fn write(&mut self, reg: BackupRegister, value: u32) {
        self.write_scratch(reg.into(), value);
    }
}

impl From<BackupRegister> for Scratch {
    fn from(reg: BackupRegister) -> Self {
        match reg {
            BackupRegister::WakeTime => Scratch::WakeTime,
            BackupRegister::Repetitions => Scratch::Repetitions,
            BackupRegister::Reminder => Scratch::Reminder,
        }
    }
}

/// Cortex-M0+ handover. The stack pointer is latched and only switched
/// together with the branch, since the caller is still running on the
/// current stack.
#[derive(Debug, Default)]
pub struct CortexHandover {
    stack_pointer: u32,
}

impl CortexHandover {
    pub const fn new() -> Self {
        Self { stack_pointer: 0 }
    }
}

impl Handover for CortexHandover {
    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    fn set_stack_pointer(&mut self, addr: u32) {
        self.stack_pointer = addr;
    }

    fn set_vector_table_base(&mut self, addr: u32) {
        unsafe { SCB_VTOR.write_volatile(addr) };
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    fn jump(&mut self, entry: u32) {
        unsafe {
            core::arch::asm!(
                "msr msp, {sp}",
                "bx {entry}",
                sp = in(reg) self.stack_pointer,
                entry = in(reg) entry,
                options(noreturn)
            );
        }
    }
}

/// Jump straight into the application without touching any peripheral.
/// Returns only if the vector table cannot be read.
pub fn quick_handover() {
    if let Ok(vt) = VectorTable::read(&mut MappedFlash) {
        start_application(&mut CortexHandover::new(), vt);
    }
}
