// Diagnostics for the `log` crate, written to stderr. Which records get here
// is decided by `log::set_max_level` alone.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, OnceLock},
};

use {
    jiff::{Timestamp, tz::TimeZone},
    log::{LevelFilter, Log},
};

use crate::style::LogStyle;

static LOGGER: Logger = Logger { tz: OnceLock::new() };

#[derive(Debug)]
struct Logger {
    /// Unset until the system time zone is known, so lines start out in UTC.
    tz: OnceLock<TimeZone>,
}

/// Installs the stderr logger with the level named by `NEXTDUE_LOG`.
pub fn init() -> anyhow::Result<()> {
    let value = std::env::var("NEXTDUE_LOG").unwrap_or_default();
    let level = parse_level(&value)?;
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Renders the timestamps of later log lines in `tz`. Only the first call
/// has any effect.
pub fn set_time_zone(tz: TimeZone) {
    let _ = LOGGER.tz.set(tz);
}

/// An empty level turns logging off. Names are case insensitive.
fn parse_level(value: &str) -> anyhow::Result<LevelFilter> {
    if value.is_empty() {
        return Ok(LevelFilter::Off);
    }
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("unrecognized log level '{value}'"))
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        // Not `Zoned::now()`: finding the system time zone logs.
        let now = Timestamp::now();
        let now = match self.tz.get() {
            Some(tz) => now.to_zoned(tz.clone()).to_string(),
            None => now.to_string(),
        };
        let style = LogStyle::stderr();
        let level = style.level(record.level());
        let mut prefix = format!("{}|{level}", style.timestamp(now));
        if let Some(file) = record.file() {
            prefix.push('|');
            prefix.push_str(relative(file));
            if let Some(line) = record.line() {
                prefix.push_str(&format!(":{line}"));
            }
        }
        eprintln!("{prefix}: {}", record.args());
    }

    fn flush(&self) {}
}

/// Shortens a source path to be relative to the working directory.
fn relative(path: &str) -> &str {
    static CWD: LazyLock<Option<PathBuf>> =
        LazyLock::new(|| std::env::current_dir().ok());
    CWD.as_deref()
        .and_then(|cwd| Path::new(path).strip_prefix(cwd).ok())
        .and_then(Path::to_str)
        .unwrap_or(path)
}
