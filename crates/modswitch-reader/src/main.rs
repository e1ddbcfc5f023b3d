#![deny(unsafe_code)]

//! cat4mod: print the switch state published by modswitchd.

mod watch;

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use modswitch_config::util::{display_byte, parse_single_char, parse_u64};
use modswitch_core::build_info;
use modswitch_core::encode::decode;
use modswitch_core::shm::DEFAULT_SEGMENT_NAME;
use modswitch_core::SharedStateReader;

use crate::watch::{Until, wait_until};

/// Print the current 2-position switch state ('0'..'3') published by
/// modswitchd, or wait for it to change.
#[derive(Parser, Debug)]
#[command(name = "cat4mod", about, long_about = None)]
struct Cli {
    /// Wait until the state changes, then print the new state.
    #[arg(short = 'l', long = "loop")]
    loop_until: bool,

    /// With -l, wait until the state equals this character instead.
    #[arg(
        short = 'c',
        long = "char",
        value_name = "CHAR",
        value_parser = parse_single_char
    )]
    target: Option<u8>,

    /// Delay between reads in microseconds.
    #[arg(
        short = 's',
        long = "delay-us",
        value_name = "USEC",
        default_value = "1000",
        value_parser = parse_u64
    )]
    delay_us: u64,

    /// Print version information and exit.
    #[arg(short = 'v', long)]
    version: bool,

    /// Shared memory segment to read.
    #[arg(long, hide = true, default_value = DEFAULT_SEGMENT_NAME)]
    segment: String,
}

impl Cli {
    fn until(&self, current: u8) -> Until {
        match self.target {
            Some(target) => Until::Equals(target),
            None => Until::ChangedFrom(current),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("cat4mod {}", build_info::version_string());
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.target.is_some() && !cli.loop_until {
        warn!("-c has no effect without -l");
    }

    match run(&cli).await.and_then(print_state) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let reader = SharedStateReader::open(&cli.segment)
        .context("cannot read switch state (is modswitchd running?)")?;
    let current = reader.read();
    debug!(
        segment = reader.name(),
        state = %display_byte(current),
        switches = ?decode(current),
        "current state"
    );

    if !cli.loop_until {
        return Ok(current);
    }

    let delay = Duration::from_micros(cli.delay_us);
    tokio::select! {
        byte = wait_until(&reader, cli.until(current), delay) => Ok(byte),
        name = interrupted() => bail!("interrupted by {}", name?),
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn interrupted() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("cannot install SIGINT handler")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

/// Write the raw state byte and a newline to stdout.
fn print_state(byte: u8) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&[byte, b'\n'])
        .and_then(|()| stdout.flush())
        .context("cannot write to stdout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use modswitch_core::SharedState;
    use modswitch_test_utils::shm::unique_segment_name;
    use pretty_assertions::assert_eq;
    use tokio::time::{sleep, timeout};

    const LIMIT: Duration = Duration::from_secs(5);

    fn cli(args: &[&str], segment: &str) -> Cli {
        let base = ["cat4mod", "--segment", segment];
        let argv = base.iter().chain(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["cat4mod"]).unwrap();
        assert!(!cli.loop_until);
        assert_eq!(cli.target, None);
        assert_eq!(cli.delay_us, 1000);
        assert!(!cli.version);
        assert_eq!(cli.segment, "/modsw");
    }

    #[test]
    fn test_loop_with_target() {
        let cli = Cli::try_parse_from(["cat4mod", "-l", "-c", "3", "-s", "500"]).unwrap();
        assert!(cli.loop_until);
        assert_eq!(cli.target, Some(b'3'));
        assert_eq!(cli.delay_us, 500);
        assert_eq!(cli.until(b'1'), Until::Equals(b'3'));
    }

    #[test]
    fn test_loop_without_target_waits_for_change() {
        let cli = Cli::try_parse_from(["cat4mod", "-l"]).unwrap();
        assert_eq!(cli.until(b'1'), Until::ChangedFrom(b'1'));
    }

    #[test]
    fn test_multi_char_target_is_rejected() {
        assert!(Cli::try_parse_from(["cat4mod", "-l", "-c", "12"]).is_err());
    }

    #[test]
    fn test_signed_delay_is_rejected() {
        assert!(Cli::try_parse_from(["cat4mod", "-s", "+5"]).is_err());
        assert!(Cli::try_parse_from(["cat4mod", "-s", "-5"]).is_err());
    }

    #[test]
    fn test_positional_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["cat4mod", "extra"]).is_err());
    }

    #[tokio::test]
    async fn test_returns_current_state_without_loop() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'1').unwrap();

        assert_eq!(run(&cli(&[], &name)).await.unwrap(), b'1');
    }

    #[test_log::test(tokio::test)]
    async fn test_loop_returns_new_state_once() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'1').unwrap();
        let cli = cli(&["-l", "-s", "1000"], &name);

        let publisher = async {
            sleep(Duration::from_millis(20)).await;
            state.publish(b'2').unwrap();
            sleep(Duration::from_millis(20)).await;
            state.publish(b'3').unwrap();
        };
        let (seen, ()) = tokio::join!(timeout(LIMIT, run(&cli)), publisher);

        assert_eq!(seen.unwrap().unwrap(), b'2');
    }

    #[tokio::test]
    async fn test_loop_with_target_skips_other_states() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'0').unwrap();
        let cli = cli(&["-l", "-c", "3", "-s", "500"], &name);

        let publisher = async {
            for byte in [b'1', b'2', b'3'] {
                sleep(Duration::from_millis(10)).await;
                state.publish(byte).unwrap();
            }
        };
        let (seen, ()) = tokio::join!(timeout(LIMIT, run(&cli)), publisher);

        assert_eq!(seen.unwrap().unwrap(), b'3');
    }

    #[tokio::test]
    async fn test_missing_segment_is_an_error() {
        let err = run(&cli(&[], &unique_segment_name())).await.unwrap_err();
        assert!(format!("{err:#}").contains("is modswitchd running?"));
    }

    #[tokio::test]
    async fn test_segment_removed_by_shutdown_is_an_error() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'2').unwrap();
        state.close();

        assert!(run(&cli(&[], &name)).await.is_err());
    }
}
