// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image integrity: word CRC and version-sum checks.
//!
//! The CRC models a hardware CRC unit fed with 32-bit words: polynomial
//! `0x04C11DB7`, initial value `0xFFFFFFFF`, MSB first, no reflection and no
//! final XOR. Feeding each word big-endian through CRC-32/MPEG-2 yields
//! exactly that.

use crc::{Crc, Digest, CRC_32_MPEG_2};
use thiserror::Error;

use crate::image::VersionRecord;
use crate::layout::{Region, CRC_WORD, IMAGE_WORDS, VERSION_WORD};
use crate::log::warn;
use crate::storage::{ReadStorage, StorageError};

static CRC32_WORD: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Words fetched per storage read when checking a flashed image.
const READ_CHUNK_WORDS: usize = 64;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrcMatch {
    Match,
    Mismatch,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("CRC mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },
    #[error("version check byte does not match {0}")]
    VersionSum(VersionRecord),
    #[error("image unreadable: {0}")]
    Unreadable(StorageError),
}

/// Incremental word CRC, for images that are read in chunks.
pub struct WordCrc {
    digest: Digest<'static, u32>,
}

impl WordCrc {
    pub fn new() -> Self {
        Self {
            digest: CRC32_WORD.digest(),
        }
    }

    pub fn update(&mut self, words: &[u32]) {
        for word in words {
            self.digest.update(&word.to_be_bytes());
        }
    }

    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for WordCrc {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC over `words`.
pub fn crc(words: &[u32]) -> u32 {
    let mut digest = WordCrc::new();
    digest.update(words);
    digest.finalize()
}

/// Compute the CRC of `words` and compare it against `expected`.
pub fn compare(words: &[u32], expected: u32) -> CrcMatch {
    if crc(words) == expected {
        CrcMatch::Match
    } else {
        CrcMatch::Mismatch
    }
}

fn check(
    actual_crc: u32,
    expected_crc: u32,
    version: VersionRecord,
) -> Result<VersionRecord, IntegrityError> {
    if actual_crc != expected_crc {
        warn!(
            "CRC mismatch: expected 0x{:08x}, got 0x{:08x}",
            expected_crc, actual_crc
        );
        return Err(IntegrityError::CrcMismatch {
            expected: expected_crc,
            actual: actual_crc,
        });
    }
    if !version.is_consistent() {
        warn!("Version check byte mismatch");
        return Err(IntegrityError::VersionSum(version));
    }
    Ok(version)
}

/// Validate a complete in-memory image of [`IMAGE_WORDS`] words.
pub fn validate_image(words: &[u32]) -> Result<VersionRecord, IntegrityError> {
    debug_assert_eq!(words.len(), IMAGE_WORDS);
    check(
        crc(&words[..CRC_WORD]),
        words[CRC_WORD],
        VersionRecord::from_word(words[VERSION_WORD]),
    )
}

/// Validate the image currently programmed into the application region,
/// streaming it through the CRC without a full-size buffer.
pub fn validate_flashed<S: ReadStorage + ?Sized>(
    storage: &mut S,
) -> Result<VersionRecord, IntegrityError> {
    let mut digest = WordCrc::new();
    let mut chunk = [0u32; READ_CHUNK_WORDS];
    let mut offset = 0;

    while offset < CRC_WORD {
        let n = (CRC_WORD - offset).min(READ_CHUNK_WORDS);
        storage
            .read_words(Region::Application, offset, &mut chunk[..n])
            .map_err(IntegrityError::Unreadable)?;
        digest.update(&chunk[..n]);
        offset += n;
    }

    let mut tail = [0u32; 2];
    storage
        .read_words(Region::Application, VERSION_WORD, &mut tail)
        .map_err(IntegrityError::Unreadable)?;

    check(digest.finalize(), tail[1], VersionRecord::from_word(tail[0]))
}
