use std::io::Write;

use {
    anyhow::Context,
    nextdue::{
        AnchorMode, DueDate, Engine, FixedClock, Precision, RecurrenceRule,
    },
};

use crate::{
    args::{
        self, Usage,
        flags::{Format, Input},
    },
    parse,
};

const USAGE: &'static str = r#"
Compute due dates for task records in the JSON lines format.

Each line of input is a JSON object describing a recurring task and its
existing due date. For each one, a JSON object with the next due date is
printed on its own line, in the same order as the input. Blank lines are
skipped.

An input record has the following fields:

    rule       A recurrence rule, e.g., "FREQ=WEEKLY;BYDAY=MO,WE,FR". Required.
    due        The existing due date in milliseconds since the Unix epoch.
               Required.
    precision  Either "date-only" (default) or "date-and-time".
    mode       Either "from-due-date" (default) or "from-completion".
    completed  When the task was completed, in milliseconds since the Unix
               epoch. Only used with "from-completion". When absent or null,
               the current time is used.

An output record has the following fields:

    due        The next due date in milliseconds since the Unix epoch.
    precision  The precision of the next due date, which always matches the
               precision of the existing due date.
    display    The next due date as a civil date when it is "date-only", and
               as an RFC 9557 timestamp otherwise.

USAGE:
    nextdue batch [<path>...]
    nextdue batch < line delimited <record>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Compute the next due date of a task done every Monday, Wednesday and
    Friday:

        $ echo '{"rule":"FREQ=WEEKLY;BYDAY=MO,WE,FR","due":1721620800000}' | nextdue batch
        {"due":1721793600000,"precision":"date-only","display":"2024-07-24"}

    %snip-start%

    Compute the next due date of a daily task that was just completed. The
    time of day of the existing due date is kept:

        $ echo '{"rule":"FREQ=DAILY","due":1721311440000,"precision":"date-and-time","mode":"from-completion"}' | nextdue batch
        {"due":1721570640000,"precision":"date-and-time","display":"2024-07-21T10:04:00-04:00[America/New_York]"}

    %snip-end%
ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut config = Config::default();
    args::configure(p, USAGE, &mut [&mut config])?;

    let engine = &*crate::ENGINE;
    let stdin = [Input::STDIN];
    let inputs =
        if config.inputs.is_empty() { &stdin[..] } else { &config.inputs[..] };

    let mut wtr = std::io::stdout().lock();
    for input in inputs.iter() {
        parse::each_line(input.reader()?, |line| {
            if line.is_blank() {
                return Ok(true);
            }
            let result = serde_json::from_slice::<Record>(line.content())
                .context("invalid task record")
                .and_then(|record| record.next(engine));
            let result = match result {
                Ok(next) => Output::new(engine, next)?,
                Err(err) => {
                    let err = err.context(format!(
                        "line {} of {}",
                        line.number(),
                        input.name(),
                    ));
                    if !config.keep_going {
                        return Err(err);
                    }
                    log::warn!("{err:#}");
                    Output::Error { error: format!("{err:#}") }
                }
            };
            serde_json::to_writer(&mut wtr, &result)?;
            writeln!(wtr)?;
            Ok(true)
        })?;
    }
    Ok(())
}

/// A single task record read from the input.
#[derive(Debug, serde::Deserialize)]
struct Record {
    rule: RecurrenceRule,
    due: i64,
    #[serde(default)]
    precision: Precision,
    #[serde(default)]
    mode: AnchorMode,
    #[serde(default)]
    completed: Option<i64>,
}

impl Record {
    fn next(&self, engine: &Engine<FixedClock>) -> anyhow::Result<DueDate> {
        let existing = engine.codec().encode(self.due, self.precision)?;
        let next = match (self.mode, self.completed) {
            (AnchorMode::FromCompletion, None) => {
                engine.complete(&self.rule, existing, self.mode)?
            }
            (_, completed) => engine.compute_next(
                &self.rule,
                existing,
                completed.unwrap_or(self.due),
                self.mode,
            )?,
        };
        Ok(next)
    }
}

/// A single line of output.
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
enum Output {
    Next { due: i64, precision: Precision, display: String },
    Error { error: String },
}

impl Output {
    fn new(
        engine: &Engine<FixedClock>,
        next: DueDate,
    ) -> anyhow::Result<Output> {
        let display = Format::Rfc9557.format(engine.codec(), next)?;
        Ok(Output::Next {
            due: next.epoch_millis(),
            precision: next.precision(),
            display,
        })
    }
}

#[derive(Debug, Default)]
struct Config {
    inputs: Vec<Input>,
    keep_going: bool,
}

impl args::Configurable for Config {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Value(ref mut v) => {
                self.inputs.push(Input::from(std::mem::take(v)));
            }
            Short('k') | Long("keep-going") => {
                self.keep_going = true;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const PATH: Usage = Usage::arg(
            "<path>",
            "Files of task records to read.",
            r#"
Files of task records to read, one record per line.

When no paths are given, or when a path is `-`, records are read from stdin.
Files are processed in the order given.
"#,
        );
        const KEEP_GOING: Usage = Usage::flag(
            "-k/--keep-going",
            "Report bad records instead of stopping at them.",
            r#"
Report bad records instead of stopping at them.

By default, the first record that is invalid, or whose next due date cannot be
computed, stops the command with an error. When this flag is given, such a
record instead produces an output line of the form `{"error":"..."}` and
processing continues with the next record.
"#,
        );
        &[PATH, KEEP_GOING]
    }
}
