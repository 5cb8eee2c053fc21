use std::{
    io::{self, Write},
    process::ExitCode,
    sync::LazyLock,
};

use {
    anyhow::Context,
    jiff::{Timestamp, Zoned, tz::TimeZone},
    nextdue::{Engine, FixedClock},
};

mod args;
mod cmd;
mod input;
mod logger;
mod parse;
mod style;

static TZ: LazyLock<TimeZone> = LazyLock::new(|| TimeZone::system());

/// The current time, read once. `NEXTDUE_NOW` pins it.
static NOW: LazyLock<Zoned> = LazyLock::new(|| {
    let now = match pinned_now() {
        Ok(Some(ts)) => {
            log::trace!("current time pinned to `{ts}` by `NEXTDUE_NOW`");
            ts
        }
        Ok(None) => Timestamp::now(),
        Err(err) => {
            log::warn!("ignoring `NEXTDUE_NOW`: {err:#}");
            Timestamp::now()
        }
    };
    now.to_zoned(TZ.clone())
});

/// Every command computes due dates in the same zone, with the same "now."
static ENGINE: LazyLock<Engine<FixedClock>> = LazyLock::new(|| {
    Engine::with_clock(TZ.clone(), FixedClock::new(NOW.timestamp()))
});

/// What's done is done, until it's due again.
fn main() -> ExitCode {
    let Err(err) = run() else { return ExitCode::SUCCESS };
    let root = err.root_cause();
    if root.is::<args::Help>() || root.is::<args::Version>() {
        let _ = writeln!(io::stdout(), "{root}");
        return ExitCode::SUCCESS;
    }
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }
    let _ = if wants_backtrace() {
        writeln!(io::stderr(), "{err:?}")
    } else {
        writeln!(io::stderr(), "{err:#}")
    };
    ExitCode::FAILURE
}

fn run() -> anyhow::Result<()> {
    logger::init()?;
    // Log lines stay in UTC until here, since finding the zone can log.
    logger::set_time_zone(TZ.clone());
    cmd::run(&mut lexopt::Parser::from_env())
}

/// Output cut short by a closed pipe, as in `nextdue seq ... | head`, is
/// not a failure.
///
/// Rust ignores `SIGPIPE`, so this shows up as an I/O error. `serde_json`
/// keeps only the kind of the I/O errors it hits.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let kind = match cause.downcast_ref::<io::Error>() {
            Some(err) => Some(err.kind()),
            None => cause
                .downcast_ref::<serde_json::Error>()
                .and_then(|err| err.io_error_kind()),
        };
        kind == Some(io::ErrorKind::BrokenPipe)
    })
}

/// Follows the same variables `std` and `anyhow` use to enable backtraces.
fn wants_backtrace() -> bool {
    let enabled = |name: &str| std::env::var(name).ok().map(|v| v == "1");
    enabled("RUST_BACKTRACE") == Some(true)
        && enabled("RUST_LIB_BACKTRACE") != Some(false)
}

/// Reads `NEXTDUE_NOW`, an RFC 3339 timestamp.
fn pinned_now() -> anyhow::Result<Option<Timestamp>> {
    let Some(value) = std::env::var_os("NEXTDUE_NOW") else {
        return Ok(None);
    };
    let value = parse::os_str(&value)?;
    let ts = value.parse().with_context(|| {
        format!("`{value}` is not a valid RFC 3339 timestamp")
    })?;
    Ok(Some(ts))
}
