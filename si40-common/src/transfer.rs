// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image transfer framing: decoder for the bootloader, encoder for the host.
//!
//! Wire format:
//! ```text
//! @08010000 CR
//! HH D HH D HH D ...     (two uppercase hex digits + delimiter per byte,
//!                         delimiter is SP or CR)
//! q
//! ```
//! The decoder fills the destination exactly; the terminator must follow the
//! last group. After any failure, and after success, the channel is drained
//! until it goes quiet so trailing bytes of the transfer are not mistaken
//! for operator commands.

use thiserror::Error;

use crate::channel::ByteChannel;
use crate::log::{debug, info, warn};

pub const TRANSFER_HEADER: &[u8; 9] = b"@08010000";
pub const TERMINATOR: u8 = b'q';
pub const CR: u8 = 0x0D;
pub const SP: u8 = 0x20;

/// Number of one-second windows to wait for the first byte.
pub const START_WINDOWS: u32 = 20;
pub const START_WINDOW_MS: u32 = 1000;
pub const HEADER_BYTE_TIMEOUT_MS: u32 = 1000;
pub const BODY_BYTE_TIMEOUT_MS: u32 = 2000;
pub const DRAIN_TIMEOUT_MS: u32 = 1500;

/// Encoded groups per CR-terminated line produced by [`encode_into`].
pub const GROUPS_PER_LINE: usize = 16;

/// Ways a transfer body can be malformed.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Malformation {
    /// The sender stopped mid-body or before the terminator.
    Stalled,
    BadHexDigit,
    BadDelimiter,
    /// Something other than `q` followed the last group.
    BadTerminator,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("no data received")]
    TimedOut,
    #[error("bad transfer header")]
    BadHeader,
    #[error("malformed transfer body ({0:?})")]
    Malformed(Malformation),
}

impl TransferError {
    /// Numeric code reported to the operator.
    pub const fn code(self) -> i32 {
        match self {
            TransferError::TimedOut => -1,
            TransferError::BadHeader => -2,
            TransferError::Malformed(Malformation::Stalled) => -3,
            TransferError::Malformed(Malformation::BadHexDigit)
            | TransferError::Malformed(Malformation::BadDelimiter) => -4,
            TransferError::Malformed(Malformation::BadTerminator) => -5,
        }
    }
}

/// Receive one framed image into `dest`, which is filled completely.
///
/// Returns the number of bytes decoded (always `dest.len()`).
pub fn receive<C: ByteChannel + ?Sized>(
    channel: &mut C,
    dest: &mut [u8],
) -> Result<usize, TransferError> {
    if dest.is_empty() {
        return Err(TransferError::BadHeader);
    }

    let Some(first) = wait_for_start(channel) else {
        warn!("Transfer: nothing received");
        return Err(TransferError::TimedOut);
    };

    let result = receive_framed(channel, first, dest);
    let drained = drain(channel);
    match result {
        Ok(n) => info!("Transfer: received {} bytes", n),
        Err(e) => warn!("Transfer failed: {}, drained {} bytes", e, drained),
    }
    result
}

fn wait_for_start<C: ByteChannel + ?Sized>(channel: &mut C) -> Option<u8> {
    (0..START_WINDOWS).find_map(|_| channel.read_byte(START_WINDOW_MS).ok())
}

fn receive_framed<C: ByteChannel + ?Sized>(
    channel: &mut C,
    first: u8,
    dest: &mut [u8],
) -> Result<usize, TransferError> {
    let mut byte = Some(first);
    for &expected in TRANSFER_HEADER {
        if byte != Some(expected) {
            return Err(TransferError::BadHeader);
        }
        byte = channel.read_byte(HEADER_BYTE_TIMEOUT_MS).ok();
    }
    if byte != Some(CR) {
        return Err(TransferError::BadHeader);
    }

    for slot in dest.iter_mut() {
        let mut group = [0u8; 3];
        for b in group.iter_mut() {
            *b = channel
                .read_byte(BODY_BYTE_TIMEOUT_MS)
                .map_err(|_| TransferError::Malformed(Malformation::Stalled))?;
        }
        *slot = decode_group(group).map_err(TransferError::Malformed)?;
    }

    match channel.read_byte(BODY_BYTE_TIMEOUT_MS) {
        Ok(TERMINATOR) => Ok(dest.len()),
        Ok(_) => Err(TransferError::Malformed(Malformation::BadTerminator)),
        Err(_) => Err(TransferError::Malformed(Malformation::Stalled)),
    }
}

/// Read and discard until the channel times out. Returns the discarded count.
pub fn drain<C: ByteChannel + ?Sized>(channel: &mut C) -> usize {
    let mut count = 0;
    while channel.read_byte(DRAIN_TIMEOUT_MS).is_ok() {
        count += 1;
    }
    debug!("Drained {} bytes", count);
    count
}

/// Decode one `HH D` group.
pub fn decode_group(group: [u8; 3]) -> Result<u8, Malformation> {
    if group[2] != SP && group[2] != CR {
        return Err(Malformation::BadDelimiter);
    }
    match (hex_value(group[0]), hex_value(group[1])) {
        (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
        _ => Err(Malformation::BadHexDigit),
    }
}

/// Value of an uppercase hexadecimal digit.
pub const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Encode `image` in the transfer framing, emitting one byte at a time.
pub fn encode_into(image: &[u8], mut emit: impl FnMut(u8)) {
    for &b in TRANSFER_HEADER {
        emit(b);
    }
    emit(CR);

    for (i, &byte) in image.iter().enumerate() {
        emit(HEX_DIGITS[(byte >> 4) as usize]);
        emit(HEX_DIGITS[(byte & 0x0F) as usize]);
        let end_of_line = (i + 1) % GROUPS_PER_LINE == 0 || i + 1 == image.len();
        emit(if end_of_line { CR } else { SP });
    }

    emit(TERMINATOR);
}

/// Size in bytes of the framing for an image of `len` bytes.
pub const fn encoded_len(len: usize) -> usize {
    TRANSFER_HEADER.len() + 1 + len * 3 + 1
}
