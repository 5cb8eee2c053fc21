use std::io::Write;

use nextdue::Precision;

use crate::{
    args::{
        self, Usage,
        flags::{Format, RuleConfig},
    },
    input::DueArg,
    parse,
};

const USAGE: &'static str = r#"
Preview the upcoming schedule of a recurring task.

Due dates are generated in chronological order, each one computed from the
last as if every occurrence of the task were completed on time. If a starting
due date is not given, then the current time is used. The starting due date
itself is never printed.

USAGE:
    nextdue seq <rule> [<due>]

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Print the next six due dates of a task done every Monday, Wednesday and
    Friday:

        $ nextdue seq weekly -w mon,wed,fri -n 6 2024-07-20
        2024-07-22
        2024-07-24
        2024-07-26
        2024-07-29
        2024-07-31
        2024-08-02

    %snip-start%

    Tuesday and Thursday evenings, every other week:

        $ nextdue seq 'FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH' -n4 2024-07-23T18:00
        2024-07-25T18:00:00-04:00[America/New_York]
        2024-08-06T18:00:00-04:00[America/New_York]
        2024-08-08T18:00:00-04:00[America/New_York]
        2024-08-20T18:00:00-04:00[America/New_York]

    Since each due date follows the last, a monthly task that gets clamped to
    the end of a short month stays on the clamped day:

        $ nextdue seq monthly -n 4 2024-01-31
        2024-02-29
        2024-03-29
        2024-04-29
        2024-05-29

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut rule = RuleConfig::default();
    let mut config = Config::default();
    args::configure(p, USAGE, &mut [&mut rule, &mut config])?;

    let rule = rule.rule()?;
    let engine = &*crate::ENGINE;
    let codec = engine.codec();
    let start = config.start()?.to_due(codec)?;

    let mut wtr = std::io::stdout().lock();
    for due in engine.upcoming(&rule, start).take(config.count()) {
        writeln!(wtr, "{}", config.format.format(codec, due?)?)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Config {
    start: Option<DueArg>,
    count: Option<usize>,
    date_only: bool,
    format: Format,
}

impl Config {
    fn start(&self) -> anyhow::Result<DueArg> {
        let start = match self.start {
            Some(ref start) => start.clone(),
            None => "now".parse()?,
        };
        Ok(if self.date_only {
            start.with_precision(Precision::DateOnly)
        } else {
            start
        })
    }

    fn count(&self) -> usize {
        self.count.unwrap_or(10)
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
            Value(ref v) => {
                if self.start.is_some() {
                    return Ok(false);
                }
                self.start = Some(DueArg::from_bytes(parse::os_bytes(v)?)?);
            }
            Short('n') | Long("count") => {
                self.count = Some(args::parse(p, "-n/--count")?);
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
        const START: Usage = Usage::arg(
            "<due>",
            "The due date the schedule starts from.",
            r#"
The due date the schedule starts from. When absent, the current time is used.

This accepts the same values as the `<due>` argument of `nextdue next`, e.g.,
`2024-07-22`, `2024-07-22T09:00` or `today`.
"#,
        );
        const COUNT: Usage = Usage::flag(
            "-n/--count <number>",
            "The number of due dates to print (defaults to 10).",
            r#"
The number of due dates to print (defaults to 10).

When the schedule runs past the maximum supported date, the due dates before
it are printed and then an error is reported.
"#,
        );
        const DATE_ONLY: Usage = Usage::flag(
            "--date-only",
            "Drop any time of day from the starting due date.",
            r#"
Drop any time of day from the starting due date.

Every due date in the schedule then has no time of day.
"#,
        );
        &[START, COUNT, DATE_ONLY, Format::USAGE_PRINT]
    }
}
