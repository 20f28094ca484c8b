// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "si40-upload")]
#[command(about = "Field tool for the Si40 beacon bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0). Required for every command that
    /// talks to a device.
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Baud rate (ignored by USB CDC devices)
    #[arg(short, long, global = true, default_value_t = 115_200)]
    pub baud: u32,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Pack a raw application binary into a bootloader image
    Pack {
        /// Raw application binary
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Application version as major.minor.build
        #[arg(short, long, value_parser = commands::parse_version)]
        version: si40_common::VersionRecord,

        /// Output image file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Download an application to the bootloader
    Upload {
        /// Packed image, or a raw binary when --version is given
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Pack FILE with this version (major.minor.build) before sending
        #[arg(short, long, value_parser = commands::parse_version)]
        version: Option<si40_common::VersionRecord>,

        /// Write the image to flash once the download is accepted
        #[arg(long)]
        commit: bool,
    },

    /// Print device configuration and versions
    Info,

    /// Set the device ID (1-9999)
    SetId {
        #[arg(value_name = "ID")]
        id: u32,
    },

    /// Set the frequency channel (1-35, 31-35 are Marport channels)
    SetChannel {
        #[arg(value_name = "CHANNEL")]
        channel: u32,
    },

    /// Set the operating mode (1 = Fast, 2 = Normal, 3 = Slow)
    SetMode {
        #[arg(value_name = "MODE")]
        mode: u32,
    },

    /// Leave the bootloader and start the application
    Jump,
}

fn open(cli: &Cli) -> Result<Transport> {
    let port = cli
        .port
        .as_deref()
        .context("--port is required for this command")?;
    Transport::new(port, cli.baud)
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Pack {
            file,
            version,
            output,
        } => commands::pack(file, *version, output),
        Commands::Upload {
            file,
            version,
            commit,
        } => commands::upload(&mut open(&cli)?, file, *version, *commit),
        Commands::Info => commands::info(&mut open(&cli)?),
        Commands::SetId { id } => commands::set_id(&mut open(&cli)?, *id),
        Commands::SetChannel { channel } => commands::set_channel(&mut open(&cli)?, *channel),
        Commands::SetMode { mode } => commands::set_mode(&mut open(&cli)?, *mode),
        Commands::Jump => commands::jump(&mut open(&cli)?),
    }
}
