// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Millisecond alarm timer: a one-shot handover deadline and a self-rearming
//! indicator toggle.
//!
//! Both checks fire only when the counter is strictly past the deadline, so
//! a deadline of `n` ms fires on tick `n + 1`.

/// Window after power-on before the application is started.
pub const POWER_ON_GRACE_MS: u32 = 1000;
/// Window kept open after any operator activity.
pub const SESSION_WINDOW_MS: u32 = 180 * 1000;
/// Liveness indicator half-period.
pub const INDICATOR_PERIOD_MS: u32 = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmTimer {
    current: u32,
    alarm_time: u32,
    toggle_time: u32,
    toggle_period: u32,
}

impl AlarmTimer {
    /// Counter at zero, nothing armed.
    pub const fn new() -> Self {
        Self {
            current: 0,
            alarm_time: u32::MAX,
            toggle_time: u32::MAX,
            toggle_period: 0,
        }
    }

    /// One tick of the 1 ms time base.
    pub fn tick(&mut self) {
        self.current = self.current.wrapping_add(1);
    }

    /// Account for `ms` elapsed ticks at once.
    pub fn advance(&mut self, ms: u32) {
        self.current = self.current.wrapping_add(ms);
    }

    pub fn now(&self) -> u32 {
        self.current
    }

    /// Arm the handover deadline `relative_ms` from now.
    pub fn set_deadline(&mut self, relative_ms: u32) {
        self.alarm_time = self.current.wrapping_add(relative_ms);
    }

    pub fn is_expired(&self) -> bool {
        self.current > self.alarm_time
    }

    pub fn set_toggle_period(&mut self, period_ms: u32) {
        self.toggle_period = period_ms;
        self.toggle_time = self.current.wrapping_add(period_ms);
    }

    /// True once per period; re-arms itself when it fires.
    pub fn is_toggle_due(&mut self) -> bool {
        if self.current > self.toggle_time {
            self.toggle_time = self.current.wrapping_add(self.toggle_period);
            return true;
        }
        false
    }
}

impl Default for AlarmTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_armed_never_expires() {
        let mut timer = AlarmTimer::new();
        timer.advance(1_000_000);
        assert!(!timer.is_expired());
        assert!(!timer.is_toggle_due());
    }

    #[test]
    fn test_deadline_is_strictly_greater() {
        let mut timer = AlarmTimer::new();
        timer.set_deadline(100);
        for _ in 0..100 {
            timer.tick();
        }
        assert!(!timer.is_expired());
        timer.tick();
        assert!(timer.is_expired());
    }

    #[test]
    fn test_rearming_deadline_postpones_expiry() {
        let mut timer = AlarmTimer::new();
        timer.set_deadline(POWER_ON_GRACE_MS);
        timer.advance(900);
        timer.set_deadline(SESSION_WINDOW_MS);
        timer.advance(200);
        assert!(!timer.is_expired());
        timer.advance(SESSION_WINDOW_MS);
        assert!(timer.is_expired());
    }

    #[test]
    fn test_toggle_rearms_itself() {
        let mut timer = AlarmTimer::new();
        timer.set_toggle_period(500);
        timer.advance(500);
        assert!(!timer.is_toggle_due());
        timer.tick();
        assert!(timer.is_toggle_due());
        assert!(!timer.is_toggle_due());
        timer.advance(500);
        assert!(!timer.is_toggle_due());
        timer.tick();
        assert!(timer.is_toggle_due());
    }
}
