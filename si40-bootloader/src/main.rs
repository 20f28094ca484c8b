// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Si40 bootloader for RP2040: operator session over USB CDC, application
//! download and handover, fast resume from deep sleep.

#![no_std]
#![no_main]

mod boot;
mod flash;
mod peripherals;
mod usb_channel;

use defmt_rtt as _;
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use panic_probe as _;
use si40_common::board::{self, WatchdogScratch};
use si40_common::image::ImageBuffer;
use si40_common::layout::{BOOT_BUILD, BOOT_SUB_VERSION, BOOT_VERSION};
use si40_common::session::{Session, Step};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    // Nothing may run before this check: a beacon waking from deep sleep
    // goes straight back to the application.
    let mut scratch = WatchdogScratch::new();
    if scratch.resumed_from_standby() {
        scratch.clear_standby();
        board::quick_handover();
    }
    scratch.clear_standby();

    defmt::println!(
        "Bootloader {}.{} build {} init",
        BOOT_VERSION,
        BOOT_SUB_VERSION,
        BOOT_BUILD
    );

    let mut p = peripherals::init();
    flash::init();
    p.led_pin.set_high().ok();

    let channel = usb_channel::UsbChannel::new(p.usb_bus, p.timer);
    let storage = unsafe { flash::RomFlash::new() };
    let mut image = ImageBuffer::new();
    let mut session = Session::new(channel, storage, &mut image);
    session.start();

    let mut last_us = p.timer.get_counter().ticks();
    loop {
        let now_us = p.timer.get_counter().ticks();
        let elapsed_ms = (now_us - last_us) / 1000;
        last_us += elapsed_ms * 1000;
        session.advance(elapsed_ms as u32);

        let mut step = match session.channel_mut().try_read() {
            Some(byte) => {
                let step = session.handle_byte(byte);
                // Time spent inside a command does not count against the
                // freshly armed session window.
                last_us = p.timer.get_counter().ticks();
                step
            }
            None => Step::Stay,
        };
        if step == Step::Stay {
            step = session.poll_deadline();
        }
        if let Step::HandOver(vt) = step {
            boot::hand_over(session.channel_mut(), &mut p.led_pin, vt);
        }

        if session.indicator_due() {
            p.led_pin.toggle().ok();
        }
    }
}
