//! Resistrig - Resistivity Test Rig Controller
//!
//! Host binary for the safety-interlocked PDC measurement rig. Loads the
//! rig configuration, opens the per-run CSV log, and runs the cooperative
//! control loop with a TCP UI link and a stdin console.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use env_logger::{Builder, Env};
use log::info;

use resistrig_core::Controller;
use resistrig_drivers::sim::SimulatedRig;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::run_log::RunLog;
use crate::runtime::Runtime;

mod config;
mod console;
mod error;
mod link;
mod run_log;
mod runtime;

/// Resistivity test rig controller
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Rig configuration file
    #[arg(short, long, default_value = "rig.toml")]
    config: PathBuf,

    /// Directory for run logs (overrides [log] dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// UI link listen address (overrides [link] bind)
    #[arg(long)]
    bind: Option<String>,

    /// Disable the TCP UI link
    #[arg(long)]
    no_link: bool,

    /// Run against the simulated bench
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    simulate: bool,
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = HostConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(dir) = args.log_dir {
        config.log.dir = dir;
    }
    if let Some(bind) = args.bind {
        config.link.bind = bind;
    }
    if args.no_link {
        config.link.enabled = false;
    }

    if !args.simulate {
        bail!("no instrument driver is configured; run with --simulate true");
    }
    info!("running against the simulated bench");
    let rig = SimulatedRig::new(config.simulation);

    let run_log = RunLog::new(&config.log.dir).map_err(|source| HostError::LogDir {
        path: config.log.dir.clone(),
        source,
    })?;
    info!("run logs in {}", run_log.dir().display());

    let (inbound_tx, inbound_rx) = unbounded();
    if config.link.enabled {
        link::spawn(&config.link.bind, inbound_tx.clone())?;
    }
    console::spawn(inbound_tx.clone()).context("starting console")?;
    drop(inbound_tx);

    let controller = Controller::new(rig, run_log, config.rig());
    Runtime::new(controller).run(inbound_rx);
    Ok(())
}
