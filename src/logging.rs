//! Structured logging setup. Verbosity is the join of `--verbose`/`--quiet`
//! and the config file's `LogLevel`; whichever asks for more detail wins,
//! except `LogLevel=Off`, which always wins outright.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::LogLevel;

fn level_from_config(level: LogLevel) -> Option<tracing::Level> {
    match level {
        LogLevel::Debug => Some(tracing::Level::DEBUG),
        LogLevel::Info => Some(tracing::Level::INFO),
        LogLevel::Warn => Some(tracing::Level::WARN),
        LogLevel::Error => Some(tracing::Level::ERROR),
        LogLevel::Off => None,
    }
}

fn level_from_verbosity(verbose: u8, quiet: bool) -> tracing::Level {
    if quiet {
        return tracing::Level::ERROR;
    }
    match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        2.. => tracing::Level::TRACE,
    }
}

/// Installs the global `tracing` subscriber. Picks the more verbose of the
/// CLI flags and the config file's `LogLevel`, unless the config asks for
/// `Off`, in which case nothing is logged at all.
pub fn init(config_level: LogLevel, verbose: u8, quiet: bool) {
    let Some(config_level) = level_from_config(config_level) else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::OFF))
            .init();
        return;
    };

    let cli_level = level_from_verbosity(verbose, quiet);
    let effective = std::cmp::max(config_level, cli_level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(LevelFilter::from_level(effective));

    tracing_subscriber::registry().with(fmt_layer).init();
}
