//! # Stencil - Command Line Front End
//!
//! Reads `SCHEMA`/`RECORD`/`STATE` lines from stdin, renders them with
//! [`stencil_render`] and prints the final checkpoint on stdout.
//!
//! ```text
//! tap-something | stencil -c config.json > state.json
//! ```
//!
//! Diagnostics go to stderr through `tracing`; stdout carries nothing but the
//! checkpoint line.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stencil_render::{emit_state, persist_lines, TargetConfig};

pub mod logging;
pub mod telemetry;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "stencil")]
#[command(about = "Render a stream of records to files through templates")]
#[command(version)]
pub struct Cli {
    /// Config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `stencil_render=trace`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Loads the configuration file, or the empty configuration without one.
    pub fn load_config(&self) -> Result<TargetConfig> {
        match &self.config {
            Some(path) => TargetConfig::from_path(path)
                .with_context(|| format!("failed to load config {}", path.display())),
            None => Ok(TargetConfig::default()),
        }
    }
}

/// Runs one invocation: config, usage ping, processing, checkpoint.
pub fn run<R: BufRead, W: Write>(cli: &Cli, input: R, mut output: W) -> Result<()> {
    let config = cli.load_config()?;

    if !config.disable_collection {
        tracing::info!(
            "Sending version information to singer.io. To disable sending anonymous usage data, \
             set the config parameter \"disable_collection\" to true"
        );
        telemetry::spawn();
    }

    let state = persist_lines(&config, input)?;
    emit_state(state.as_ref(), &mut output).context("failed to write state")?;
    tracing::debug!("exiting normally");
    Ok(())
}
