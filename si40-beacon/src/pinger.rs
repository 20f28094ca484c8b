// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Acoustic pinger: a square wave at the channel carrier for one burst.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use rp2040_hal as hal;
use si40_common::config;

/// Carrier used when no channel is configured.
pub const DEFAULT_CARRIER_HZ: u32 = 43_000;

pub type PingerSlice = hal::pwm::Slice<hal::pwm::Pwm0, hal::pwm::FreeRunning>;

pub struct Pinger {
    slice: PingerSlice,
    sys_hz: u32,
}

impl Pinger {
    /// Takes the slice with channel A already routed to the transducer pin.
    pub fn new(mut slice: PingerSlice, sys_hz: u32) -> Self {
        slice.set_div_int(1);
        slice.disable();
        Self { slice, sys_hz }
    }

    /// Tune to the carrier of `channel`.
    pub fn tune(&mut self, channel: Option<u32>) -> u32 {
        let carrier = channel
            .and_then(config::frequency_hz)
            .unwrap_or(DEFAULT_CARRIER_HZ);
        let top = (self.sys_hz / carrier).saturating_sub(1).min(u32::from(u16::MAX)) as u16;
        self.slice.set_top(top);
        self.slice.channel_a.set_duty_cycle(top / 2).ok();
        carrier
    }

    pub fn burst(&mut self, delay: &mut impl DelayNs, duration_ms: u32) {
        self.slice.enable();
        delay.delay_ms(duration_ms);
        self.slice.disable();
        self.slice.channel_a.set_duty_cycle(0).ok();
    }
}
