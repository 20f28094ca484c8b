// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Beacon duty cycle: decide how long to sleep and how many quick wakes to
//! make before the next measurement burst.
//!
//! Three backup registers carry the schedule through deep sleep. After a
//! burst they are loaded from the wake schedule table; on each wake the
//! repetition counter is consumed first and only when it is exhausted does a
//! real burst run again.

use embedded_hal::digital::InputPin;

use crate::config::{self, OperatingMode};
use crate::log::debug;
use crate::storage::ReadStorage;

/// Wake timer ticks per second.
pub const TICKS_PER_SECOND: u32 = 0x800;
/// Ticks subtracted from nominal periods to absorb wake-up and burst time.
const WAKE_LATENCY_TICKS: u32 = 70;

const fn period(seconds: u32) -> u32 {
    TICKS_PER_SECOND * seconds - WAKE_LATENCY_TICKS
}

const FULL_30S: u32 = TICKS_PER_SECOND * 30;

/// Burst length for the FAST/NORMAL/SLOW modes.
pub const BURST_MS_STANDARD: u32 = 29;
pub const BURST_MS_MARPORT: u32 = 47;

/// Sleep between wakes, indexed by `[sensor][mode]`.
pub const WAKE_UP_TIME: [[u32; 4]; 2] = [
    [TICKS_PER_SECOND * 5 + 330, FULL_30S, FULL_30S, period(30)],
    [period(5), period(32), FULL_30S, period(20)],
];

/// Wakes per measurement, indexed by `[sensor][mode]`.
pub const REPETITION: [[u32; 4]; 2] = [[1, 2, 5, 1], [1, 1, 5, 1]];

/// Length of the last sleep of a repetition run, indexed by `[sensor][mode]`.
pub const REMINDER: [[u32; 4]; 2] = [[0, period(4), period(6), 0], [0, 0, period(3), 0]];

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorState {
    Empty,
    Full,
}

impl SensorState {
    pub const fn index(self) -> usize {
        match self {
            SensorState::Empty => 0,
            SensorState::Full => 1,
        }
    }
}

/// Sample the sensor input: high means full. A pin error reads as empty.
pub fn read_sensor<P: InputPin>(pin: &mut P) -> SensorState {
    if pin.is_high().unwrap_or(false) {
        SensorState::Full
    } else {
        SensorState::Empty
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupRegister {
    WakeTime,
    Repetitions,
    Reminder,
}

/// Registers that survive deep sleep.
pub trait BackupRegisters {
    fn read(&self, reg: BackupRegister) -> u32;
    fn write(&mut self, reg: BackupRegister, value: u32);
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeSchedule {
    pub wake_time: u32,
    /// Wakes left before the next burst.
    pub repetitions: u32,
    pub reminder: u32,
}

impl WakeSchedule {
    /// Table entry for a finished burst; one repetition is the burst itself.
    pub const fn lookup(sensor: SensorState, mode: OperatingMode) -> Self {
        let (s, m) = (sensor.index(), mode.index());
        Self {
            wake_time: WAKE_UP_TIME[s][m],
            repetitions: REPETITION[s][m] - 1,
            reminder: REMINDER[s][m],
        }
    }

    pub fn load<B: BackupRegisters + ?Sized>(regs: &B) -> Self {
        Self {
            wake_time: regs.read(BackupRegister::WakeTime),
            repetitions: regs.read(BackupRegister::Repetitions),
            reminder: regs.read(BackupRegister::Reminder),
        }
    }

    pub fn store<B: BackupRegisters + ?Sized>(&self, regs: &mut B) {
        regs.write(BackupRegister::WakeTime, self.wake_time);
        regs.write(BackupRegister::Repetitions, self.repetitions);
        regs.write(BackupRegister::Reminder, self.reminder);
    }
}

/// What to do right after waking.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeAction {
    /// Go straight back to sleep for this many ticks.
    Sleep(u32),
    /// Run a measurement burst.
    Measure,
}

/// Consume one repetition if any are left.
pub fn on_wake<B: BackupRegisters + ?Sized>(regs: &mut B) -> WakeAction {
    let schedule = WakeSchedule::load(regs);
    if schedule.repetitions == 0 {
        return WakeAction::Measure;
    }

    let left = schedule.repetitions - 1;
    regs.write(BackupRegister::Repetitions, left);
    debug!("Wake: {} repetitions left", left);
    if left > 0 {
        WakeAction::Sleep(schedule.wake_time)
    } else {
        WakeAction::Sleep(schedule.reminder)
    }
}

/// Mode the duty cycle runs in. Without a usable configuration the Marport
/// column is used.
pub fn duty_mode<S: ReadStorage + ?Sized>(storage: &mut S) -> OperatingMode {
    config::effective_mode(storage).unwrap_or(OperatingMode::Marport)
}

pub const fn burst_ms(mode: OperatingMode) -> u32 {
    match mode {
        OperatingMode::Marport => BURST_MS_MARPORT,
        _ => BURST_MS_STANDARD,
    }
}

/// One measurement burst, planned before the PWM runs.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub sensor: SensorState,
    pub mode: OperatingMode,
    pub burst_ms: u32,
    pub schedule: WakeSchedule,
}

impl Cycle {
    pub fn plan<S: ReadStorage + ?Sized>(storage: &mut S, sensor: SensorState) -> Self {
        let mode = duty_mode(storage);
        Self {
            sensor,
            mode,
            burst_ms: burst_ms(mode),
            schedule: WakeSchedule::lookup(sensor, mode),
        }
    }

    /// Persist the schedule after the burst and return the sleep length.
    pub fn finish<B: BackupRegisters + ?Sized>(&self, regs: &mut B) -> u32 {
        self.schedule.store(regs);
        self.schedule.wake_time
    }
}
