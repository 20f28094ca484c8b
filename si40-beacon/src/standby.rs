// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Deep sleep: the watchdog times the sleep and resets the chip when it
//! expires. Sleeps longer than one watchdog period are chained through the
//! residual scratch register.

use rp2040_hal as hal;
use rp2040_hal::fugit::MicrosDurationU32;
use si40_common::board::WatchdogScratch;
use si40_common::duty_cycle::TICKS_PER_SECOND;

/// Longest sleep covered by a single watchdog period.
pub const MAX_CHUNK_TICKS: u32 = 8 * TICKS_PER_SECOND;

pub fn ticks_to_ms(ticks: u32) -> u32 {
    (u64::from(ticks) * 1000 / u64::from(TICKS_PER_SECOND)) as u32
}

/// Sleep for `ticks` wake-timer ticks. Never returns: the watchdog reset
/// brings the chip back through the bootloader.
pub fn enter(watchdog: &mut hal::Watchdog, regs: &mut WatchdogScratch, ticks: u32) -> ! {
    let chunk = ticks.min(MAX_CHUNK_TICKS);
    regs.set_residual(ticks - chunk);
    regs.mark_standby();

    let ms = ticks_to_ms(chunk).max(1);
    defmt::println!("Standby for {} ms ({} ticks left)", ms, ticks - chunk);
    watchdog.start(MicrosDurationU32::micros(ms * 1000));

    loop {
        cortex_m::asm::wfi();
    }
}
