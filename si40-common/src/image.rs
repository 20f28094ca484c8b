// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application image buffer and the version record embedded in every image.
//!
//! An image is exactly [`MAX_DOWNLOAD_BYTES`] long. Its last word holds the
//! CRC of all preceding words and the word before it holds the packed
//! [`VersionRecord`].

use core::fmt;

use thiserror::Error;

use crate::integrity;
use crate::layout::{CRC_WORD, IMAGE_WORDS, MAX_DOWNLOAD_BYTES, VERSION_WORD};

/// Version metadata packed as `[major, minor, build, check]` bytes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub check: u8,
}

impl VersionRecord {
    /// Build a record with a matching check byte.
    pub const fn new(major: u8, minor: u8, build: u8) -> Self {
        Self {
            major,
            minor,
            build,
            check: major.wrapping_add(minor).wrapping_add(build),
        }
    }

    /// Unpack from an image word (bytes in little-endian order).
    pub const fn from_word(word: u32) -> Self {
        let [major, minor, build, check] = word.to_le_bytes();
        Self {
            major,
            minor,
            build,
            check,
        }
    }

    pub const fn to_word(self) -> u32 {
        u32::from_le_bytes([self.major, self.minor, self.build, self.check])
    }

    /// Sum of the three components with 8-bit wraparound.
    pub const fn sum(&self) -> u8 {
        self.major.wrapping_add(self.minor).wrapping_add(self.build)
    }

    /// Plausibility gate: `check == major + minor + build` (mod 256).
    pub const fn is_consistent(&self) -> bool {
        self.check == self.sum()
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} build {}", self.major, self.minor, self.build)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("firmware is {len} bytes, at most {capacity} fit in an image")]
    TooLarge { len: usize, capacity: usize },
}

/// Fixed-capacity image storage with a byte view and a word view over the
/// same memory.
#[derive(Clone)]
pub struct ImageBuffer {
    words: [u32; IMAGE_WORDS],
}

impl ImageBuffer {
    /// Bytes available for firmware once the version record and CRC are
    /// reserved.
    pub const PAYLOAD_CAPACITY: usize = MAX_DOWNLOAD_BYTES - 8;

    pub const fn new() -> Self {
        Self {
            words: [0; IMAGE_WORDS],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    pub fn version(&self) -> VersionRecord {
        VersionRecord::from_word(self.words[VERSION_WORD])
    }

    pub fn stored_crc(&self) -> u32 {
        self.words[CRC_WORD]
    }

    /// Check both integrity gates: CRC over every word but the last, and the
    /// version-sum byte.
    pub fn validate(&self) -> Result<VersionRecord, integrity::IntegrityError> {
        integrity::validate_image(&self.words)
    }

    /// Build a complete image from a raw firmware binary: pad with `0xFF`
    /// (erased flash), then embed `version` and the CRC.
    pub fn pack(firmware: &[u8], version: VersionRecord) -> Result<Self, ImageError> {
        if firmware.len() > Self::PAYLOAD_CAPACITY {
            return Err(ImageError::TooLarge {
                len: firmware.len(),
                capacity: Self::PAYLOAD_CAPACITY,
            });
        }

        let mut image = Self {
            words: [0xFFFF_FFFF; IMAGE_WORDS],
        };
        image.bytes_mut()[..firmware.len()].copy_from_slice(firmware);
        image.words[VERSION_WORD] = version.to_word();
        image.words[CRC_WORD] = integrity::crc(&image.words[..CRC_WORD]);
        Ok(image)
    }
}

impl Default for ImageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
