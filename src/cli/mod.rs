// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Negotiated envelope channel CLI
#[derive(Parser, Debug)]
#[command(name = "negotiate-cli")]
#[command(version)]
#[command(about = "Key generation, config checks and a local handshake demo", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an ephemeral key pair
    Keygen(commands::KeygenArgs),

    /// Load and validate channel configuration
    CheckConfig(commands::CheckConfigArgs),

    /// Run a handshake and envelope round trip in-process
    Demo(commands::DemoArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen(args) => commands::keygen(args),
        Commands::CheckConfig(args) => commands::check_config(args),
        Commands::Demo(args) => commands::demo(args).await,
    }
}
