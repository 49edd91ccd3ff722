//! Exposes the command line application.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use querycache::metrics;
use tracing::level_filters::LevelFilter;

use crate::config::Config;
use crate::demos::fetch::FetchArgs;
use crate::demos::sum::SumArgs;
use crate::logging;

/// Querycache commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Sum random numbers through a cached query, without any network access.
    Sum(SumArgs),

    /// Fetch a rotating set of URLs through a cached web query.
    Fetch(FetchArgs),
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(name = "querycache", version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Command,
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::get(cli.config.as_deref()).context("failed loading config")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: No other threads have been spawned yet.
    unsafe { logging::init_logging(&config) };

    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("failed to configure statsd")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    runtime.block_on(async {
        match cli.command {
            Command::Sum(args) => crate::demos::sum::run(args).await,
            Command::Fetch(args) => crate::demos::fetch::run(args, &config.http).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_sum() {
        let cli = Cli::try_parse_from([
            "querycache",
            "--log-level",
            "debug",
            "sum",
            "--refresh-every",
            "1s",
            "--fetch-every",
            "250ms",
        ])
        .unwrap();

        assert_eq!(cli.log_level, Some(LevelFilter::DEBUG));
        let Command::Sum(args) = cli.command else {
            panic!("expected the sum command");
        };
        assert_eq!(args.refresh_every, Duration::from_secs(1));
        assert_eq!(args.fetch_every, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "querycache",
            "fetch",
            "http://localhost/users/{id}",
            "--ids",
            "4,5",
            "-c",
            "config.yml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("config.yml")));
        let Command::Fetch(args) = cli.command else {
            panic!("expected the fetch command");
        };
        assert_eq!(args.ids, ["4", "5"]);
    }

    #[test]
    fn test_invalid_duration() {
        let result = Cli::try_parse_from(["querycache", "sum", "--fetch-every", "soon"]);
        assert!(result.is_err());
    }
}
