// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Byte channel abstraction and the operator console built on top of it.

use core::fmt;

/// No byte arrived within the requested timeout.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout;

/// Blocking byte source/sink with caller-specified receive timeout.
///
/// Waits are not cancellable; callers needing a shorter wait pass a shorter
/// timeout.
pub trait ByteChannel {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, Timeout>;
    fn write_byte(&mut self, byte: u8);

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, Timeout> {
        (**self).read_byte(timeout_ms)
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes)
    }
}

/// `core::fmt::Write` adapter so operator messages can use `write!`.
pub struct Console<'c, C: ByteChannel + ?Sized> {
    channel: &'c mut C,
}

impl<'c, C: ByteChannel + ?Sized> Console<'c, C> {
    pub fn new(channel: &'c mut C) -> Self {
        Self { channel }
    }
}

impl<C: ByteChannel + ?Sized> fmt::Write for Console<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.channel.write_bytes(s.as_bytes());
        Ok(())
    }
}
