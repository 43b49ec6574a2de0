#![forbid(unsafe_code)]

mod output;

use anyhow::Context;
use clap::Parser;
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use zsnap_core::backend::zfs::ZfsBackend;
use zsnap_core::clock::SystemClock;
use zsnap_core::config::{Config, load_config};
use zsnap_core::model::ExecMode;
use zsnap_core::name::GroupName;
use zsnap_core::retention::{Retention, RetentionOffsets};
use zsnap_core::run::{FailurePolicy, RunOptions, Runner};

const LONG_ABOUT: &str = "\
Automatically create and destroy snapshots for ZFS VOLUME(s).

The options -M, -H, -d, -w and -m select which snapshots are destroyed. They
can be combined: '-w 2 -H 12' destroys every snapshot older than two weeks and
twelve hours. Alternatively -k keeps only the newest N snapshots. Without any
of these options nothing is destroyed. Only snapshots created by zsnap are ever
destroyed; all other snapshots remain untouched.

Operations apply to the given volumes, or to ALL volumes when none are given.

zsnap is meant to run from cron. To snapshot every full hour and keep the last
two weeks, add this line to /etc/crontab:
    0 * * * *  root  zsnap -c -w 2";

const AFTER_HELP: &str = "\
EXAMPLES:
    # Create a new snapshot for all volumes
    zsnap -c

    # Snapshot 'tank' and destroy its snapshots older than eight weeks
    zsnap -c -w 8 tank

    # Destroy all snapshots older than one month and two weeks
    zsnap -m 1 -w 2

    # Keep the 24 newest snapshots of the 'hourly' group
    zsnap -c -g hourly -k 24

    # Show what would happen without touching anything
    zsnap -s -c -d 7";

#[derive(Parser, Debug)]
#[command(
    name = "zsnap",
    author,
    version,
    about = "zsnap: ZFS snapshot lifecycle manager",
    long_about = LONG_ABOUT,
    after_help = AFTER_HELP,
    arg_required_else_help = true
)]
struct Cli {
    /// Create a snapshot for all target volumes.
    #[arg(short, long)]
    create: bool,

    /// Operate on the named snapshot group instead of the default group.
    #[arg(short, long, value_name = "NAME")]
    group: Option<GroupName>,

    /// Destroy snapshots older than NUMBER of minutes.
    #[arg(short = 'M', long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    minutes: Option<u32>,

    /// Destroy snapshots older than NUMBER of hours.
    #[arg(short = 'H', long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    hours: Option<u32>,

    /// Destroy snapshots older than NUMBER of days.
    #[arg(short, long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Destroy snapshots older than NUMBER of weeks.
    #[arg(short, long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    weeks: Option<u32>,

    /// Destroy snapshots older than NUMBER of months.
    #[arg(short, long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    months: Option<u32>,

    /// Keep the NUMBER newest snapshots per group and destroy the rest.
    #[arg(
        short,
        long,
        value_name = "NUMBER",
        conflicts_with_all = ["minutes", "hours", "days", "weeks", "months"]
    )]
    keep: Option<usize>,

    /// Only log what would be created or destroyed.
    #[arg(short, long)]
    simulate: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Emit a JSON report instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Read configuration from this file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// What to do when a single create or destroy fails [continue, abort].
    #[arg(long, value_name = "POLICY")]
    on_error: Option<FailurePolicy>,

    /// Volumes to operate on (default: all volumes).
    #[arg(value_name = "VOLUME")]
    volumes: Vec<String>,
}

impl Cli {
    /// Retention requested on the command line, if any.
    fn retention(&self) -> Option<Retention> {
        if let Some(keep) = self.keep {
            return Some(Retention::Count(keep));
        }
        let offset = |value: Option<u32>| i64::from(value.unwrap_or(0));
        let offsets = RetentionOffsets::new(
            offset(self.months),
            offset(self.weeks),
            offset(self.days),
            offset(self.hours),
            offset(self.minutes),
        );
        (!offsets.is_zero()).then_some(Retention::Age(offsets))
    }

    fn run_options(&self, config: &Config) -> RunOptions {
        RunOptions {
            create: self.create,
            group: self.group.clone(),
            volumes: self.volumes.clone(),
            retention: self.retention(),
            mode: ExecMode::from_simulate(self.simulate || config.run.simulate),
            on_error: self.on_error.unwrap_or(config.run.on_error),
        }
    }

    /// Default log level when `ZSNAP_LOG` is unset.
    const fn log_level(&self, simulate: bool) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose || simulate {
            "info"
        } else {
            "warn"
        }
    }

    /// Derive the output mode from flags.
    const fn output_mode(&self, simulate: bool) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.verbose || self.debug || simulate {
            OutputMode::Text
        } else {
            OutputMode::Quiet
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env("ZSNAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("zsnap={level},zsnap_core={level},warn")));

    let format = env::var("ZSNAP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let options = cli.run_options(&config);
    let simulate = options.mode.is_simulate();

    init_tracing(cli.log_level(simulate));
    let mode = cli.output_mode(simulate);
    if simulate {
        info!("simulate mode: no snapshot will be created or destroyed");
    }
    debug!(
        command = %config.backend.command.display(),
        on_error = %options.on_error,
        "configuration resolved"
    );

    let backend = ZfsBackend::new(&config.backend.command);
    let clock = SystemClock;
    let mut runner = Runner::new(&backend, &clock);

    let report = match runner.run(&options) {
        Ok(report) => report,
        Err(err) => {
            output::render_error(mode, &CliError::from(&err))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    output::render_report(mode, &report)?;

    if !report.is_success() {
        warn!(failures = report.failures.len(), "some snapshot operations failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
