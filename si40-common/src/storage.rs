// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Word-addressed storage capability over the configuration and application
//! regions.

use thiserror::Error;

use crate::layout::Region;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("access outside of region")]
    OutOfBounds,
    #[error("erase failed")]
    Erase,
    #[error("program failed")]
    Program,
}

pub trait ReadStorage {
    /// Fill `out` with words starting `word_offset` words into `region`.
    fn read_words(
        &mut self,
        region: Region,
        word_offset: usize,
        out: &mut [u32],
    ) -> Result<(), StorageError>;
}

pub trait Storage: ReadStorage {
    /// Erase the sectors covering the target range, then program `words`.
    fn erase_and_write_words(
        &mut self,
        region: Region,
        word_offset: usize,
        words: &[u32],
    ) -> Result<(), StorageError>;
}

impl<S: ReadStorage + ?Sized> ReadStorage for &mut S {
    fn read_words(
        &mut self,
        region: Region,
        word_offset: usize,
        out: &mut [u32],
    ) -> Result<(), StorageError> {
        (**self).read_words(region, word_offset, out)
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn erase_and_write_words(
        &mut self,
        region: Region,
        word_offset: usize,
        words: &[u32],
    ) -> Result<(), StorageError> {
        (**self).erase_and_write_words(region, word_offset, words)
    }
}

/// Reject requests that fall outside `region` before touching hardware.
pub fn check_bounds(region: Region, word_offset: usize, len: usize) -> Result<(), StorageError> {
    match word_offset.checked_add(len) {
        Some(end) if end <= region.size_words() => Ok(()),
        _ => Err(StorageError::OutOfBounds),
    }
}
