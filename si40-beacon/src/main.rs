// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Si40 beacon application: one measurement burst per duty cycle, deep sleep
//! in between.

#![no_std]
#![no_main]

mod pinger;
mod standby;

use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use panic_probe as _;
use rp2040_hal as hal;
use rp2040_hal::Clock;
use si40_common::board::{MappedFlash, WatchdogScratch};
use si40_common::config;
use si40_common::duty_cycle::{self, Cycle, WakeAction};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

/// Settling time of the transducer supply before sampling the sensor.
const POWER_SETTLE_MS: u32 = 5;

#[entry]
fn main() -> ! {
    // The bootloader hands over with interrupts masked.
    unsafe { cortex_m::interrupt::enable() };

    let mut pac = unsafe { hal::pac::Peripherals::steal() };
    let mut regs = WatchdogScratch::new();

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let residual = regs.residual();
    if residual > 0 {
        standby::enter(&mut watchdog, &mut regs, residual);
    }
    if let WakeAction::Sleep(ticks) = duty_cycle::on_wake(&mut regs) {
        standby::enter(&mut watchdog, &mut regs, ticks);
    }

    defmt::println!("Beacon measurement cycle");

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut power = pins.gpio14.into_push_pull_output();
    let mut sensor_enable = pins.gpio15.into_push_pull_output();
    let mut sensor = pins.gpio13.into_pull_down_input();

    let mut slices = hal::pwm::Slices::new(pac.PWM, &mut pac.RESETS);
    slices.pwm0.channel_a.output_to(pins.gpio16);
    let mut pinger = pinger::Pinger::new(slices.pwm0, clocks.system_clock.freq().to_Hz());

    let mut flash = MappedFlash;
    power.set_high().ok();
    sensor_enable.set_low().ok();
    let carrier = pinger.tune(config::read_channel(&mut flash));
    timer.delay_ms(POWER_SETTLE_MS);
    let sensor_state = duty_cycle::read_sensor(&mut sensor);
    sensor_enable.set_high().ok();

    let cycle = Cycle::plan(&mut flash, sensor_state);
    defmt::println!(
        "Burst: {} at {} Hz for {} ms",
        cycle.sensor,
        carrier,
        cycle.burst_ms
    );
    pinger.burst(&mut timer, cycle.burst_ms);
    power.set_low().ok();

    let sleep = cycle.finish(&mut regs);
    standby::enter(&mut watchdog, &mut regs, sleep)
}
