// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Leaving the bootloader: release the peripherals it used, then jump.

use embedded_hal::digital::OutputPin;
use si40_common::board::CortexHandover;
use si40_common::handover::{start_application, VectorTable};

use crate::peripherals::LedPin;
use crate::usb_channel::UsbChannel;

/// Time given to the operator link and the supply before the jump.
const HANDOVER_DELAY_MS: u32 = 1000;

const RESETS_BASE: u32 = 0x4000_C000;
const RESETS_RESET: *mut u32 = RESETS_BASE as *mut u32;
const RESET_IO_BANK0: u32 = 1 << 5;
const RESET_PADS_BANK0: u32 = 1 << 8;
const RESET_TIMER: u32 = 1 << 21;
const RESET_USBCTRL: u32 = 1 << 24;

/// Normal handover after an operator session or the inactivity deadline.
pub fn hand_over(channel: &mut UsbChannel, led: &mut LedPin, vt: VectorTable) -> ! {
    defmt::println!(
        "Jumping to application: sp=0x{:08x} entry=0x{:08x}",
        vt.initial_sp,
        vt.reset_vector
    );
    led.set_low().ok();
    channel.linger(HANDOVER_DELAY_MS);

    unsafe {
        release_peripherals();
        reset_clocks_to_power_on_state();
    }

    start_application(&mut CortexHandover::new(), vt);
    // Only reached if the jump itself was refused.
    loop {
        cortex_m::asm::wfi();
    }
}

/// Put the USB controller, GPIO banks and timer back into reset and clear
/// every NVIC interrupt.
unsafe fn release_peripherals() {
    cortex_m::interrupt::disable();

    // Clear all pending interrupts in NVIC
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);

    // Disable all NVIC interrupts
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(
        reset | RESET_USBCTRL | RESET_IO_BANK0 | RESET_PADS_BANK0 | RESET_TIMER,
    );
}

/// Reset clocks to power-on reset state:
/// - clk_sys runs from clk_ref
/// - clk_ref runs from ROSC
/// - XOSC disabled
/// - PLLs in reset
/// - Watchdog tick disabled
///
/// The application then starts from the same clock state as after the
/// quick handover.
unsafe fn reset_clocks_to_power_on_state() {
    const CLOCKS_BASE: u32 = 0x4000_8000;
    const CLK_REF_CTRL: *mut u32 = (CLOCKS_BASE + 0x30) as *mut u32;
    const CLK_REF_SELECTED: *const u32 = (CLOCKS_BASE + 0x38) as *const u32;
    const CLK_SYS_CTRL: *mut u32 = (CLOCKS_BASE + 0x3C) as *mut u32;
    const CLK_SYS_SELECTED: *const u32 = (CLOCKS_BASE + 0x44) as *const u32;

    const XOSC_BASE: u32 = 0x4002_4000;
    const XOSC_CTRL: *mut u32 = XOSC_BASE as *mut u32;

    const WATCHDOG_BASE: u32 = 0x4005_8000;
    const WATCHDOG_TICK: *mut u32 = (WATCHDOG_BASE + 0x2C) as *mut u32;

    const PLL_SYS_RESET_BIT: u32 = 1 << 12;
    const PLL_USB_RESET_BIT: u32 = 1 << 13;

    // clk_sys <- clk_ref
    let ctrl = CLK_SYS_CTRL.read_volatile();
    CLK_SYS_CTRL.write_volatile(ctrl & !0x1);
    while CLK_SYS_SELECTED.read_volatile() != 0x1 {
        core::hint::spin_loop();
    }

    // clk_ref <- ROSC
    let ctrl = CLK_REF_CTRL.read_volatile();
    CLK_REF_CTRL.write_volatile(ctrl & !0x3);
    while CLK_REF_SELECTED.read_volatile() != 0x1 {
        core::hint::spin_loop();
    }

    const XOSC_CTRL_DISABLE: u32 = 0xD1E << 12;
    let ctrl = XOSC_CTRL.read_volatile();
    XOSC_CTRL.write_volatile((ctrl & !0x00FF_F000) | XOSC_CTRL_DISABLE);

    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(reset | PLL_SYS_RESET_BIT | PLL_USB_RESET_BIT);

    WATCHDOG_TICK.write_volatile(0);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}
