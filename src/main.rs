//! Skein - development orchestrator for server-rendered static sites.

#![allow(dead_code)]

mod cli;
mod config;
mod core;
mod event;
mod fetch;
mod logger;
mod pipeline;
mod render;
mod serve;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Dev { interface, port } => {
            if let Some(interface) = interface {
                config.serve.interface = *interface;
            }
            if let Some(port) = port {
                config.serve.port = *port;
            }
            cli::dev::run(&config)
        }
        Commands::Build { output } => cli::build::run(&config, output.as_deref()),
    }
}
