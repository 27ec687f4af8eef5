//! `lsitems`: lists the items an inventory device holds on one side.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod list;

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hlbus::{Bus, DEFAULT_ADDRESS};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lsitems", version, about = "LiSt Items held by an inventory device")]
struct Cli {
    /// Side of the inventory device to list (e.g. left, front, up).
    side: Option<String>,

    /// Bus device path.
    #[arg(long, env = "HLBUS_ADDRESS", default_value = DEFAULT_ADDRESS)]
    bus: String,

    /// Give up waiting for the bus after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Print the raw listing as JSON.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.run(&mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", diagnostic(&e));
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Diagnostic printed when the bus cannot be opened.
const OPEN_FAILED: &str = "Failed to open bus.";

impl Cli {
    fn run(self, out: &mut impl Write) -> Result<()> {
        let Some(side) = self.side else {
            return list::usage(out);
        };

        let mut builder = Bus::builder(self.bus);
        if let Some(secs) = self.timeout {
            let timeout = Duration::try_from_secs_f64(secs).context("invalid --timeout")?;
            builder = builder.read_timeout(timeout);
        }
        let mut bus = builder.open().context(OPEN_FAILED)?;

        let format = if self.json {
            list::Format::Json
        } else {
            list::Format::Lines
        };
        list::run(&mut bus, &side, format, out)
    }
}

/// Installs a stderr subscriber; `RUST_LOG` overrides the `-v` level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Formats a failure for stderr: the headline on its own line, then each cause.
fn diagnostic(err: &anyhow::Error) -> String {
    let mut text = format!("{err}\n");
    for cause in err.chain().skip(1) {
        text.push_str(&format!("  caused by: {cause}\n"));
    }
    text
}

/// Picks a process exit status for a failure.
///
/// Unreachable bus, missing device, and misuse exit with 255 (`-1`); I/O,
/// protocol, and device failures get their sysexits codes.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|c| c.downcast_ref::<hlbus::Error>()) {
        Some(hlbus::Error::Transport(_)) => 74,
        Some(hlbus::Error::Protocol(_)) => 76,
        Some(hlbus::Error::Device(_)) => 70,
        Some(_) => 255,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_follows_failure_class() {
        let io_err = || std::io::Error::from(std::io::ErrorKind::NotFound);
        let open = anyhow::Error::new(hlbus::Error::Connection {
            address: DEFAULT_ADDRESS.into(),
            source: io_err(),
        })
        .context("failed to open bus");
        assert_eq!(exit_status(&open), 255);

        let absent = anyhow::Error::new(hlbus::Error::Precondition("absent".into()));
        assert_eq!(exit_status(&absent), 255);

        assert_eq!(exit_status(&hlbus::Error::Transport(io_err()).into()), 74);
        assert_eq!(exit_status(&hlbus::Error::Protocol("x".into()).into()), 76);
        assert_eq!(exit_status(&hlbus::Error::Device("x".into()).into()), 70);
        assert_eq!(exit_status(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn unreachable_bus_reports_headline_and_255() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("hvc0");
        let cli = Cli::try_parse_from(["lsitems", "left", "--bus", missing.to_str().unwrap()])
            .unwrap();

        let mut out = Vec::new();
        let err = cli.run(&mut out).unwrap_err();
        assert!(out.is_empty());
        assert_eq!(exit_status(&err), 255);

        let text = diagnostic(&err);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Failed to open bus."));
        assert!(lines.next().unwrap().starts_with("  caused by: cannot open bus at"));
    }

    #[test]
    fn missing_device_reports_headline_and_255() {
        let (transport, handle) = hlbus::MemoryTransport::new();
        handle
            .push_frame(&serde_json::json!({"type": "list", "data": []}))
            .unwrap();
        let mut bus = Bus::with_transport(DEFAULT_ADDRESS, transport);

        let mut out = Vec::new();
        let err = list::run(&mut bus, "left", list::Format::Lines, &mut out).unwrap_err();
        assert_eq!(exit_status(&err), 255);
        assert_eq!(
            diagnostic(&err).lines().next(),
            Some("This program requires a Inventory Operations Module.")
        );
    }

    #[test]
    fn no_side_prints_usage() {
        let cli = Cli::try_parse_from(["lsitems"]).unwrap();
        let mut out = Vec::new();
        cli.run(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "LiSt Items\nUsage: lsitems <side>\n");
    }

    #[test]
    fn side_is_optional() {
        let cli = Cli::try_parse_from(["lsitems"]).unwrap();
        assert!(cli.side.is_none());
        assert!(!cli.json);

        let cli = Cli::try_parse_from(["lsitems", "left", "--bus", "/tmp/bus", "-vv"]).unwrap();
        assert_eq!(cli.side.as_deref(), Some("left"));
        assert_eq!(cli.bus, "/tmp/bus");
        assert_eq!(cli.verbose, 2);
    }
}
