// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use si40_common::config::{self, Field};
use si40_common::layout::MAX_DOWNLOAD_BYTES;
use si40_common::transfer;
use si40_common::{ImageBuffer, VersionRecord};

use crate::transport::Transport;

const CHUNK_SIZE: usize = 64;
/// The device drains trailing bytes for 1.5 s before it reports.
const DOWNLOAD_REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const COMMIT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Parse `major.minor.build`.
pub fn parse_version(s: &str) -> Result<VersionRecord, String> {
    let parts: Vec<&str> = s.split('.').collect();
    let [major, minor, build] = parts.as_slice() else {
        return Err(format!("expected major.minor.build, got {:?}", s));
    };
    let field = |p: &str| {
        p.parse::<u8>()
            .map_err(|e| format!("invalid version component {:?}: {}", p, e))
    };
    Ok(VersionRecord::new(field(major)?, field(minor)?, field(build)?))
}

/// Use `firmware` as is when it already is a valid image, else pack it.
fn load_image(firmware: &[u8], version: Option<VersionRecord>) -> Result<ImageBuffer> {
    match version {
        Some(version) => Ok(ImageBuffer::pack(firmware, version)?),
        None => {
            if firmware.len() != MAX_DOWNLOAD_BYTES {
                bail!(
                    "{} bytes is not a packed image ({} bytes); pass --version to pack it",
                    firmware.len(),
                    MAX_DOWNLOAD_BYTES
                );
            }
            let mut image = ImageBuffer::new();
            image.bytes_mut().copy_from_slice(firmware);
            image
                .validate()
                .context("Image failed its CRC or version check")?;
            Ok(image)
        }
    }
}

/// Pack a raw binary into an image file.
pub fn pack(file: &Path, version: VersionRecord, output: &Path) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let image = ImageBuffer::pack(&firmware, version)?;
    fs::write(output, image.bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Packed {} ({} bytes) as version {}, CRC 0x{:08x}",
        file.display(),
        firmware.len(),
        version,
        image.stored_crc()
    );
    Ok(())
}

fn encode(image: &ImageBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(transfer::encoded_len(image.bytes().len()));
    transfer::encode_into(image.bytes(), |b| out.push(b));
    out
}

fn download_reply_complete(text: &str) -> bool {
    if text.contains("not correct.") || text.contains("time out.") {
        return true;
    }
    if text.contains("inappropriate file.") {
        return true;
    }
    if let Some((_, tail)) = text.rsplit_once("error ") {
        return tail.contains(".\n\r");
    }
    match text.rsplit_once(" Application version ") {
        Some((_, tail)) => tail.ends_with(".\n\r"),
        None => false,
    }
}

/// Interpret the device's report on a download.
fn check_download_reply(text: &str) -> Result<String> {
    if text.contains("time out.") {
        bail!("Device timed out waiting for the image header");
    }
    if text.contains("inappropriate file.") {
        bail!("Device rejected the transfer header");
    }
    if let Some((_, tail)) = text.rsplit_once("error ") {
        let code = tail.split_whitespace().next().unwrap_or("?");
        bail!("Transfer failed with code {}", code);
    }
    if text.contains("not correct.") {
        bail!("Device reports a CRC or version mismatch");
    }
    match text.rsplit_once(" Application version ") {
        Some((_, tail)) => Ok(tail.trim_end_matches(".\n\r").to_string()),
        None => bail!("Unexpected reply {:?}", text),
    }
}

fn commit_reply_complete(text: &str) -> bool {
    ["Flash memory.\n\r", "Flash erase.\n\r", "application code.\n\r"]
        .iter()
        .any(|marker| text.contains(marker))
}

fn check_commit_reply(text: &str) -> Result<()> {
    if text.contains("successfully written") {
        Ok(())
    } else if text.contains("Flash erase") {
        bail!("Flash erase failed on the device")
    } else if text.contains("valid application code") {
        bail!("Device holds no valid image to commit")
    } else {
        bail!("Flash programming failed on the device")
    }
}

/// Download an image, optionally committing it to flash.
pub fn upload(
    transport: &mut Transport,
    file: &Path,
    version: Option<VersionRecord>,
    commit: bool,
) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let image = load_image(&firmware, version)?;
    let framed = encode(&image);

    println!(
        "Image:   {} (version {}, CRC 0x{:08x})",
        file.display(),
        image.version(),
        image.stored_crc()
    );

    transport.drain();
    transport.send(b"d")?;

    let pb = ProgressBar::new(framed.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    for chunk in framed.chunks(CHUNK_SIZE) {
        if let Err(e) = transport.send(chunk) {
            pb.abandon();
            return Err(e);
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Download sent");

    let reply = transport.read_until(DOWNLOAD_REPLY_TIMEOUT, download_reply_complete)?;
    let accepted = check_download_reply(&reply)?;
    println!("Device accepted application version {}", accepted);

    if !commit {
        println!("Image is held in RAM only; send 'y' or rerun with --commit to flash it.");
        return Ok(());
    }

    transport.send(b"y")?;
    let reply = transport.read_until(COMMIT_REPLY_TIMEOUT, commit_reply_complete)?;
    check_commit_reply(&reply)?;
    println!("Application written to flash.");
    Ok(())
}

fn console_text(text: &str) -> String {
    text.replace("\n\r", "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn info_reply_complete(text: &str) -> bool {
    text.contains("Application doesn't exist.\n\r")
        || text
            .rsplit_once(" Application version ")
            .is_some_and(|(_, tail)| tail.ends_with(".\n\r"))
}

/// Print what the device reports about itself.
pub fn info(transport: &mut Transport) -> Result<()> {
    transport.drain();
    transport.send(b"p")?;
    let reply = transport.read_until(REPLY_TIMEOUT, info_reply_complete)?;
    println!("{}", console_text(&reply));
    Ok(())
}

/// Bytes that make the device enter and commit `value` for `field`.
fn entry_sequence(field: Field, value: u32) -> Vec<u8> {
    let command = match field {
        Field::Id => b'i',
        Field::Channel => b'c',
        Field::Mode => b'm',
    };
    let mut seq = vec![command];
    seq.extend_from_slice(value.to_string().as_bytes());
    seq.push(b'\r');
    seq
}

fn entry_reply_complete(field: Field, text: &str) -> bool {
    if text.contains("Error.") {
        return text.ends_with("\n\r");
    }
    match field {
        Field::Id => text.contains("New device ID is ") && text.ends_with("\n\r"),
        // Two lines: the channel label, then the frequency.
        Field::Channel => text
            .rsplit_once("New frequency ")
            .is_some_and(|(_, tail)| tail.ends_with(".\n\r")),
        Field::Mode => text.contains("New Mode is ") && text.ends_with(",\n\r"),
    }
}

fn set_field(transport: &mut Transport, field: Field, value: u32) -> Result<()> {
    if !field.domain().contains(&value) {
        bail!(
            "{} must be in {}..={}",
            field,
            field.domain().start(),
            field.domain().end()
        );
    }

    transport.drain();
    transport.send(&entry_sequence(field, value))?;
    let reply = transport.read_until(REPLY_TIMEOUT, |text| entry_reply_complete(field, text))?;
    if reply.contains("Error.") {
        bail!("Device rejected {} {}", field, value);
    }
    println!("{}", console_text(&reply));
    Ok(())
}

pub fn set_id(transport: &mut Transport, id: u32) -> Result<()> {
    set_field(transport, Field::Id, id)
}

pub fn set_channel(transport: &mut Transport, channel: u32) -> Result<()> {
    if config::is_marport_channel(channel) {
        println!("Channel {} is a Marport channel; the beacon will run in Marport mode.", channel);
    }
    set_field(transport, Field::Channel, channel)
}

pub fn set_mode(transport: &mut Transport, mode: u32) -> Result<()> {
    set_field(transport, Field::Mode, mode)
}

/// Ask the bootloader to start the flashed application.
pub fn jump(transport: &mut Transport) -> Result<()> {
    transport.drain();
    transport.send(b"j")?;
    let reply = transport.read_until(REPLY_TIMEOUT, |text| {
        text.contains("Go to application.\n\r") || text.contains("doesn't exist.\n\r")
    })?;
    if reply.contains("doesn't exist") {
        bail!("Device has no valid application to start");
    }
    println!("Application started.");
    Ok(())
}
