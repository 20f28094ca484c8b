// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport for the bootloader's text console.

use anyhow::{bail, Context, Result};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Read timeout of the port itself; replies are awaited in slices of this.
const POLL_TIMEOUT_MS: u64 = 50;

pub struct Transport {
    port: Box<dyn SerialPort>,
}

impl Transport {
    pub fn new(port_name: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(POLL_TIMEOUT_MS))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self { port })
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .context("Failed to write to serial port")?;
        self.port.flush()?;
        Ok(())
    }

    /// Discard anything the device printed before the next command.
    pub fn drain(&mut self) {
        let mut buf = [0u8; 64];
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
    }

    /// Collect console output until `done` accepts it.
    pub fn read_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&str) -> bool,
    ) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut raw = Vec::new();
        let mut buf = [0u8; 256];

        loop {
            match self.port.read(&mut buf) {
                Ok(n) => raw.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => bail!("Serial read error: {}", e),
            }

            let text = String::from_utf8_lossy(&raw);
            if done(&text) {
                return Ok(text.into_owned());
            }
            if Instant::now() >= deadline {
                bail!(
                    "Timeout waiting for the device (got {:?})",
                    text.chars().take(120).collect::<String>()
                );
            }
        }
    }
}
