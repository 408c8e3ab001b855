//! # vup
//!
//! **vup** updates every configured working copy in one go.
//!
//! Features:
//! - Roots and command providers are defined in `$(vup home)/config.toml`
//! - `vup update` fetches and merges git roots and runs configured commands elsewhere
//! - `vup roots` shows each root with the provider that owns it
//! - `vup options` prints the options each provider would update with
//! - `vup config` opens the configuration in `$EDITOR`
//! - `vup home` prints the vup home directory
//!
//! Logging goes to stderr and is controlled by `VUP_LOG` (default `warn`).
//! Ctrl-C during `vup update` cancels after the current step; press it twice to quit.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vup::update::CancelToken;
use vup::{UpdateOptions, cmd_config, cmd_options, cmd_roots, cmd_update, load_config, paths, vup_home};

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "vup",
    version,
    about = "vup - update many version-controlled roots at once",
    arg_required_else_help = true
)]
struct Cli {
    /// Use this configuration file instead of `$(vup home)/config.toml`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Update configured roots (or only the given paths)
    Update {
        /// Print provider options before updating
        #[arg(long)]
        show_options: bool,
        /// Stop a chained update after this many rounds (0 = no limit)
        #[arg(long)]
        max_rounds: Option<u32>,
        roots: Vec<PathBuf>,
    },
    /// List configured roots with their provider
    Roots,
    /// Show the options each provider would update with
    Options,
    /// Open config.toml in $EDITOR
    Config,
    /// Print the vup home directory
    Home,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("VUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// First Ctrl-C cancels the update at its next safe point; a second one exits.
fn install_interrupt_handler(token: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if token.interrupt() {
            std::process::exit(130);
        }
        eprintln!("canceling update, press Ctrl-C again to quit");
    })
    .context("failed to install Ctrl-C handler")
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(p.clone()),
        None => Ok(paths()?.config),
    }
}

/// CLI entry point.
///
/// Exits non-zero when an update did not succeed.
fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.cmd {
        Cmd::Update {
            show_options,
            max_rounds,
            roots,
        } => {
            let cfg = load_config(&config_path(&cli)?)?;
            let cancel = CancelToken::new();
            install_interrupt_handler(cancel.clone())?;
            let opts = UpdateOptions {
                roots: roots.clone(),
                show_options: *show_options,
                max_rounds: *max_rounds,
                cancel,
            };
            let ok = cmd_update(&cfg, &opts)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Cmd::Roots => {
            cmd_roots(&load_config(&config_path(&cli)?)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Options => {
            cmd_options(&load_config(&config_path(&cli)?)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Config => {
            cmd_config(&config_path(&cli)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Home => {
            println!("{}", vup_home()?.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
