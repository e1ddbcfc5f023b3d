#![deny(unsafe_code)]

//! modswitchd: publish a 2-position GPIO switch to shared memory.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use modswitch_config::{AppConfig, DEFAULT_CONFIG_PATH};
use modswitch_core::build_info;
use modswitch_core::process::daemonize;
use modswitch_core::{
    Daemon, DaemonError, InstanceLock, LockError, Phase, RuntimePaths, ShutdownFlag,
};

/// Exit status when another instance holds the lock.
const EXIT_ALREADY_RUNNING: u8 = 3;

/// Exit status for every other failure.
const EXIT_FAILURE: u8 = 1;

/// Read a 2-position switch from two GPIO lines and publish its state
/// ('0'..'3') in the shared memory segment /modsw.
#[derive(Parser, Debug)]
#[command(name = "modswitchd", about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Detach and run in the background.
    #[arg(short = 'D', long)]
    daemon: bool,

    /// Print version information and exit.
    #[arg(short = 'v', long)]
    version: bool,

    /// Extra arguments are ignored.
    #[arg(hide = true)]
    extra: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("modswitchd {}", build_info::version_string());
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    for arg in &cli.extra {
        warn!(argument = %arg, "ignoring non-option argument");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!(
        phase = %Phase::Starting,
        version = %build_info::version_string(),
        built_at = build_info::BUILT_AT,
        config = %cli.config.display(),
        "modswitchd starting"
    );

    let config = AppConfig::load(&cli.config).context("cannot load configuration")?;
    let settings = config.settings().context("invalid configuration")?;
    info!(
        chip = %settings.chip.display(),
        sw0_pin = settings.sw0_pin,
        sw1_pin = settings.sw1_pin,
        pull = %settings.pull_mode,
        delay_us = settings.poll_delay.as_micros() as u64,
        "configuration loaded"
    );

    let paths = RuntimePaths::default();
    let lock = InstanceLock::acquire(&paths.lock_file)?;
    info!(phase = %Phase::Locked, lock = %paths.lock_file.display(), "instance lock held");

    if cli.daemon {
        daemonize().map_err(DaemonError::from)?;
        info!(phase = %Phase::Daemonized, pid = std::process::id(), "detached");
    }

    // Installed before any resource exists so an early signal still ends in
    // an orderly shutdown.
    let shutdown = ShutdownFlag::install().map_err(DaemonError::Signals)?;

    let mut daemon = Daemon::start(settings, &paths, lock).context("startup failed")?;
    daemon.run(&shutdown).context("switch polling stopped")?;

    info!(phase = %daemon.phase(), "modswitchd stopped");
    Ok(())
}

/// Exit status for a failed run.
fn exit_status(err: &anyhow::Error) -> u8 {
    let already_running = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<LockError>(),
            Some(LockError::AlreadyRunning { .. })
        )
    });
    if already_running {
        EXIT_ALREADY_RUNNING
    } else {
        EXIT_FAILURE
    }
}
