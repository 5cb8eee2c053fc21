use std::io::Write;

use nextdue::{AnchorMode, Precision};

use crate::{
    args::{
        self, Usage,
        flags::{Format, RuleConfig},
        positional::DueDates,
    },
    input::DueArg,
};

const USAGE: &'static str = r#"
Compute the next due date of a recurring task.

This accepts one or more due dates as positional arguments. When no positional
arguments are given, then line delimited due dates are read from stdin. For
each due date, the due date that follows it is printed.

By default, the next due date follows the existing due date. That is, the
schedule is fixed no matter when the task was actually done. When
`-c/--completed` is given, the next due date instead follows the day on which
the task was completed, and any time of day on the existing due date is kept.

USAGE:
    nextdue next <rule> <due>...
    nextdue next <rule> < line delimited <due>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Find the next due date of a task done every Monday, Wednesday and Friday:

        $ nextdue next weekly -w mon,wed,fri 2024-07-22
        2024-07-24

    %snip-start%

    The same, but with a rule in the RFC 5545 format:

        $ nextdue next 'FREQ=WEEKLY;BYDAY=MO,WE,FR' 2024-07-22
        2024-07-24

    A task done every other Monday at 9am:

        $ nextdue next weekly -i2 -w mon 2024-07-22T09:00
        2024-08-05T09:00:00-04:00[America/New_York]

    Monthly due dates are clamped to the end of shorter months:

        $ nextdue next monthly 2024-01-31
        2024-02-29

    A daily task due at 10:04 that was finished late still comes due the day
    after it was completed, at the same time of day:

        $ nextdue next daily --completed 2024-07-20T16:30 2024-07-18T10:04
        2024-07-21T10:04:00-04:00[America/New_York]

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut rule = RuleConfig::default();
    let mut config = Config::default();
    let mut dues = DueDates::default();
    args::configure(p, USAGE, &mut [&mut rule, &mut config, &mut dues])?;

    let rule = rule.rule()?;
    let engine = &*crate::ENGINE;
    let codec = engine.codec();
    let completed = match config.completed {
        None => None,
        Some(ref completed) => Some(completed.to_due(codec)?.epoch_millis()),
    };

    let mut wtr = std::io::stdout().lock();
    dues.try_map(|arg| {
        let existing = config.precision(arg).to_due(codec)?;
        let next = match completed {
            None => engine.compute_next(
                &rule,
                existing,
                existing.epoch_millis(),
                AnchorMode::FromDueDate,
            )?,
            Some(millis) => engine.compute_next(
                &rule,
                existing,
                millis,
                AnchorMode::FromCompletion,
            )?,
        };
        writeln!(wtr, "{}", config.format.format(codec, next)?)?;
        Ok(true)
    })?;
    Ok(())
}

#[derive(Debug, Default)]
struct Config {
    completed: Option<DueArg>,
    date_only: bool,
    format: Format,
}

impl Config {
    fn precision(&self, arg: DueArg) -> DueArg {
        if self.date_only {
            arg.with_precision(Precision::DateOnly)
        } else {
            arg
        }
    }
}

impl args::Configurable for Config {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Short('c') | Long("completed") => {
                self.completed = Some(args::parse(p, "-c/--completed")?);
            }
            Long("date-only") => {
                self.date_only = true;
            }
            Short('f') | Long("format") => {
                self.format = args::parse(p, "-f/--format")?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const COMPLETED: Usage = Usage::flag(
            "-c/--completed <datetime>",
            "Compute due dates from when the task was completed.",
            r#"
Compute due dates from when the task was completed.

When given, the next due date is computed from the day after this datetime
instead of from the existing due date. The special value `now` may be used
to indicate the task was just completed.

When the existing due date has a time of day, the next due date keeps that
time of day.
"#,
        );
        const DATE_ONLY: Usage = Usage::flag(
            "--date-only",
            "Treat every due date as having no time of day.",
            r#"
Treat every due date as having no time of day.

By default, a due date has a time of day only if one was written. When this
flag is given, any time of day is dropped and each due date is the start of
its day.
"#,
        );
        &[DueDates::USAGE_ARG, COMPLETED, DATE_ONLY, Format::USAGE_PRINT]
    }
}
