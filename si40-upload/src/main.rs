// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Field tool for the Si40 bootloader over USB CDC.
//!
//! Usage:
//!   si40-upload pack beacon.bin --version 2.8.82 --output beacon.img
//!   si40-upload --port /dev/ttyACM0 upload beacon.img --commit
//!   si40-upload --port /dev/ttyACM0 set-channel 17
//!   si40-upload --port /dev/ttyACM0 jump

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
