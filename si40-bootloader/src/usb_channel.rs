// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC serial port as the operator byte channel.

use heapless::Deque;
use rp2040_hal as hal;
use rp2040_hal::usb::UsbBus;
use si40_common::channel::{ByteChannel, Timeout};
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

const RX_BUF_SIZE: usize = 256;
const USB_PACKET_SIZE: usize = 64;
/// Give up on output nobody is reading.
const WRITE_TIMEOUT_MS: u64 = 100;

pub struct UsbChannel {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    timer: hal::Timer,
    rx: Deque<u8, RX_BUF_SIZE>,
}

impl UsbChannel {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>, timer: hal::Timer) -> Self {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Si40 Bootloader")
                .serial_number("0001")])
            .unwrap()
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Self {
            serial,
            usb_dev,
            timer,
            rx: Deque::new(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.timer.get_counter().ticks() / 1000
    }

    /// Poll USB device and move received bytes into the local queue.
    /// Must be called frequently.
    pub fn poll(&mut self) {
        if !self.usb_dev.poll(&mut [&mut self.serial]) {
            return;
        }
        if self.rx.capacity() - self.rx.len() < USB_PACKET_SIZE {
            return;
        }
        let mut tmp = [0u8; USB_PACKET_SIZE];
        if let Ok(count) = self.serial.read(&mut tmp) {
            for &byte in &tmp[..count] {
                // Room was checked above.
                self.rx.push_back(byte).ok();
            }
        }
    }

    /// Next received byte, if any, without waiting.
    pub fn try_read(&mut self) -> Option<u8> {
        self.poll();
        self.rx.pop_front()
    }

    /// Keep the device serviced for `ms` so queued output reaches the host.
    pub fn linger(&mut self, ms: u32) {
        let deadline = self.now_ms() + u64::from(ms);
        while self.now_ms() < deadline {
            self.poll();
            self.serial.flush().ok();
        }
    }
}

impl ByteChannel for UsbChannel {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, Timeout> {
        let deadline = self.now_ms() + u64::from(timeout_ms);
        loop {
            if let Some(byte) = self.try_read() {
                return Ok(byte);
            }
            if self.now_ms() >= deadline {
                return Err(Timeout);
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        self.write_bytes(&[byte]);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut offset = 0;
        let mut deadline = self.now_ms() + WRITE_TIMEOUT_MS;
        while offset < bytes.len() {
            match self.serial.write(&bytes[offset..]) {
                Ok(n) => {
                    offset += n;
                    deadline = self.now_ms() + WRITE_TIMEOUT_MS;
                }
                Err(UsbError::WouldBlock) => {
                    if self.now_ms() >= deadline {
                        break;
                    }
                    self.poll();
                }
                Err(_) => break,
            }
        }
    }
}
