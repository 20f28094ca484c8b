// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash layout, image geometry and firmware identity constants.
//!
//! Shared by the bootloader, the beacon application and the host tool so all
//! three agree on where each region lives and how large an image is.

// --- Flash layout constants ---

pub const FLASH_BASE: u32 = 0x1000_0000;
pub const BOOTLOADER_ADDR: u32 = FLASH_BASE;
pub const BOOTLOADER_SIZE: u32 = 32 * 1024;
pub const CONFIG_ADDR: u32 = 0x1000_8000;
pub const CONFIG_SIZE: u32 = 32 * 1024;
pub const APP_ADDR: u32 = 0x1001_0000;

pub const FLASH_SECTOR_SIZE: u32 = 4096;
pub const FLASH_PAGE_SIZE: u32 = 256;

// --- Image geometry ---

/// Size of a downloadable application image. Always a multiple of 4.
pub const MAX_DOWNLOAD_BYTES: usize = 16 * 1024;
pub const IMAGE_WORDS: usize = MAX_DOWNLOAD_BYTES / 4;
/// Word index of the packed version record (second-to-last word).
pub const VERSION_WORD: usize = IMAGE_WORDS - 2;
/// Word index of the image CRC (last word).
pub const CRC_WORD: usize = IMAGE_WORDS - 1;

pub const APP_SIZE: u32 = MAX_DOWNLOAD_BYTES as u32;

const _: () = assert!(MAX_DOWNLOAD_BYTES % 4 == 0);
const _: () = assert!(APP_SIZE % FLASH_SECTOR_SIZE == 0);

// --- Firmware identity ---

pub const BOOT_VERSION: u8 = 3;
pub const BOOT_SUB_VERSION: u8 = 2;
pub const BOOT_BUILD: u8 = 104;

/// Flash regions the storage backend exposes at runtime.
///
/// The bootloader region is deliberately absent: it is never written while
/// the device is running.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Config,
    Application,
}

impl Region {
    pub const fn base(self) -> u32 {
        match self {
            Region::Config => CONFIG_ADDR,
            Region::Application => APP_ADDR,
        }
    }

    /// Usable size in bytes. The configuration region reserves 32 KiB but
    /// only its first sector holds data.
    pub const fn size(self) -> u32 {
        match self {
            Region::Config => FLASH_SECTOR_SIZE,
            Region::Application => APP_SIZE,
        }
    }

    pub const fn size_words(self) -> usize {
        self.size() as usize / 4
    }
}
