use std::{
    ffi::OsString,
    fs::File,
    io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use {
    anyhow::Context,
    jiff::civil::Weekday,
    nextdue::{Codec, DueDate, Frequency, RecurrenceRule, rule::parse_weekday},
};

use crate::{
    args::{self, Configurable, Usage},
    parse,
};

/// How due dates are printed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    /// `2024-07-22T09:00:00-04:00[America/New_York]`
    #[default]
    Rfc9557,
    /// `2024-07-22T09:00:00-04:00`
    Rfc3339,
    /// `1721653200000`
    Millis,
}

impl Format {
    pub const USAGE_PRINT: Usage = Usage::flag(
        "-f, --format <kind>",
        "Print due dates in this format.",
        r#"
Print due dates in this format.

The legal values for this flag are: `rfc9557` (default), `rfc3339` or
`millis`.

Here are some examples of each type of format for a due date with a time:

RFC 9557: `2024-07-22T09:00:00-04:00[America/New_York]`

RFC 3339: `2024-07-22T09:00:00-04:00`

millis: `1721653200000`

When a due date has no time of day, then both `rfc9557` and `rfc3339` print
just the civil date, e.g., `2024-07-22`. The `millis` format always prints
the stored instant, which for a date-only due date is the start of its day.
"#,
    );

    /// Every spelling accepted on the command line. The first one for each
    /// format is its canonical name.
    const NAMES: &'static [(&'static str, Format)] = &[
        ("rfc9557", Format::Rfc9557),
        ("rfc3339", Format::Rfc3339),
        ("millis", Format::Millis),
        ("ms", Format::Millis),
    ];

    /// Renders `due`, using the codec's time zone for its civil parts.
    pub fn format(
        &self,
        codec: &Codec,
        due: DueDate,
    ) -> anyhow::Result<String> {
        if *self == Format::Millis {
            return Ok(due.epoch_millis().to_string());
        }
        let zdt = codec.decode(due)?;
        let rendered = if due.is_date_only() {
            zdt.date().to_string()
        } else if *self == Format::Rfc3339 {
            zdt.timestamp().display_with_offset(zdt.offset()).to_string()
        } else {
            zdt.to_string()
        };
        Ok(rendered)
    }
}

impl std::str::FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Format> {
        Format::NAMES
            .iter()
            .find(|&&(name, _)| name == s)
            .map(|&(_, format)| format)
            .ok_or_else(|| anyhow::anyhow!("unrecognized format `{s}`"))
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (name, _) = Format::NAMES
            .iter()
            .find(|&&(_, format)| format == *self)
            .ok_or(std::fmt::Error)?;
        f.write_str(name)
    }
}

/// The CLI configuration for building a recurrence rule.
///
/// The first positional argument is consumed as the rule. It may either be
/// a bare frequency (like `weekly`) or an RFC 5545 rule restricted to the
/// `FREQ`, `INTERVAL` and `BYDAY` parts (like `FREQ=WEEKLY;BYDAY=MO,FR`).
/// The `-i/--interval` and `-w/--week-day` flags override whatever the rule
/// says about its interval or weekdays.
#[derive(Clone, Debug, Default)]
pub struct RuleConfig {
    rule: Option<RecurrenceRule>,
    interval: Option<i32>,
    weekdays: Vec<WeekdayList>,
}

impl RuleConfig {
    pub const USAGE_ARG: Usage = Usage::arg(
        "<rule>",
        "A frequency or a recurrence rule.",
        r#"
A frequency or a recurrence rule.

A frequency is one of `daily`, `weekly`, `monthly` or `yearly`. Shorter
spellings like `day`, `wk` or `y` are accepted too.

Otherwise, a rule may be given in the RFC 5545 format, e.g.,
`FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR`. Only the `FREQ`, `INTERVAL` and
`BYDAY` parts are supported. An optional `RRULE:` prefix is ignored.

Weekdays may only be used with a weekly frequency.
"#,
    );

    /// Builds the recurrence rule described by the CLI.
    ///
    /// This returns an error if no rule was given, or if the flags given
    /// produce an invalid rule.
    pub fn rule(&self) -> anyhow::Result<RecurrenceRule> {
        let rule = self.rule.as_ref().context("missing required <rule>")?;
        if self.interval.is_none() && self.weekdays.is_empty() {
            return Ok(rule.clone());
        }
        let mut b = RecurrenceRule::builder(rule.frequency());
        b.interval(self.interval.unwrap_or(rule.interval()));
        if self.weekdays.is_empty() {
            b.by_week_day(rule.weekdays());
        }
        for range in self.weekdays.iter().flat_map(WeekdayList::ranges) {
            b.by_week_day(range);
        }
        Ok(b.build()?)
    }
}

impl Configurable for RuleConfig {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Value(ref v) => {
                if self.rule.is_some() {
                    return Ok(false);
                }
                let v = parse::os_str(v)?;
                let rule = if v.contains('=') {
                    v.parse::<RecurrenceRule>()?
                } else {
                    let freq = v.parse::<Frequency>()?;
                    RecurrenceRule::builder(freq).build()?
                };
                self.rule = Some(rule);
            }
            Short('i') | Long("interval") => {
                self.interval = Some(args::parse(p, "-i/--interval")?);
            }
            Short('w') | Long("week-day") => {
                self.weekdays.push(args::parse(p, "-w/--week-day")?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const INTERVAL: Usage = Usage::flag(
            "-i/--interval <number>",
            "Sets the interval at which the rule repeats.",
            r#"
Sets the interval at which the rule repeats.

For example, a weekly rule with an interval of `2` repeats every other week.
The interval must be at least `1`. When given, this overrides any `INTERVAL`
in the rule.
"#,
        );
        const BY_WEEK_DAY: Usage = Usage::flag(
            "-w/--week-day <week-day-list>",
            "Provide one or more days of the week.",
            r#"
Provide one or more days of the week.

Legal values are any day of the week (e.g., sun, mon, tue, wed, thu, fri, sat).
Full names and two letter codes like `MO` are accepted too, without regard for
case.

Contiguous ranges of weekdays may be specified. For example, `Mon..Wed`
corresponds Monday, Tuesday and Wednesday. A range may wrap around the end of
the week, e.g., `Fri..Mon`.

Multiple weekdays or ranges can be specified with repeated use of this flag, or
by separating values with a comma. For example, `Sun,Tue..Thu,Sat` corresponds
to every day of the week except for Monday and Friday.

This flag can only be used with a weekly frequency. When given, this overrides
any `BYDAY` in the rule.
"#,
        );

        &[RuleConfig::USAGE_ARG, INTERVAL, BY_WEEK_DAY]
    }
}

/// The weekdays given to one use of `-w/--week-day`, like `mon,wed..fri`.
///
/// Each item is a single weekday or an inclusive range of them. A range may
/// wrap past the end of the week, so its end points can be in any order.
#[derive(Clone, Debug)]
pub struct WeekdayList(Vec<(Weekday, Weekday)>);

impl WeekdayList {
    fn ranges(&self) -> impl Iterator<Item = RangeInclusive<Weekday>> + '_ {
        self.0.iter().map(|&(start, end)| start..=end)
    }
}

impl std::str::FromStr for WeekdayList {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<WeekdayList> {
        let parse_item = |item: &str| -> anyhow::Result<(Weekday, Weekday)> {
            let (start, end) = item.split_once("..").unwrap_or((item, item));
            Ok((parse_weekday(start)?, parse_weekday(end)?))
        };
        s.split(',')
            .map(|item| {
                parse_item(item).map_err(|err| {
                    let msg = format!("invalid weekday `{item}` in `{s}`");
                    anyhow::anyhow!("{msg}: {err:#}")
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map(WeekdayList)
    }
}

/// A file of line delimited input, where `-` (or nothing at all) is stdin.
#[derive(Clone, Debug, Default)]
pub struct Input {
    path: Option<PathBuf>,
}

impl Input {
    pub const STDIN: Input = Input { path: None };

    /// The name used for this input in error messages.
    pub fn name(&self) -> std::path::Display<'_> {
        self.path.as_deref().unwrap_or(Path::new("<stdin>")).display()
    }

    /// Opens the file, or locks stdin. Nothing is read until the returned
    /// reader is.
    pub fn reader(&self) -> anyhow::Result<Box<dyn io::BufRead>> {
        let Some(ref path) = self.path else {
            return Ok(Box::new(io::stdin().lock()));
        };
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Box::new(io::BufReader::new(file)))
    }
}

impl From<OsString> for Input {
    fn from(value: OsString) -> Input {
        let path = Some(PathBuf::from(value)).filter(|p| p != Path::new("-"));
        Input { path }
    }
}

#[cfg(test)]
mod tests {
    use jiff::{civil::date, tz::TimeZone};
    use nextdue::Precision;

    use super::*;

    fn codec() -> Codec {
        Codec::new(TimeZone::get("America/New_York").unwrap())
    }

    #[test]
    fn format_due_dates() {
        let codec = codec();
        let zdt = date(2024, 7, 22)
            .at(9, 0, 0, 0)
            .in_tz("America/New_York")
            .unwrap();
        let timed = codec.encode_zoned(&zdt, Precision::DateAndTime).unwrap();
        let dated = codec.encode_zoned(&zdt, Precision::DateOnly).unwrap();

        let got = Format::Rfc9557.format(&codec, timed).unwrap();
        insta::assert_snapshot!(
            got,
            @"2024-07-22T09:00:00-04:00[America/New_York]",
        );
        let got = Format::Rfc3339.format(&codec, timed).unwrap();
        insta::assert_snapshot!(got, @"2024-07-22T09:00:00-04:00");
        let got = Format::Millis.format(&codec, timed).unwrap();
        insta::assert_snapshot!(got, @"1721653200000");

        let got = Format::Rfc9557.format(&codec, dated).unwrap();
        insta::assert_snapshot!(got, @"2024-07-22");
        let got = Format::Rfc3339.format(&codec, dated).unwrap();
        insta::assert_snapshot!(got, @"2024-07-22");
        let got = Format::Millis.format(&codec, dated).unwrap();
        insta::assert_snapshot!(got, @"1721620800000");
    }

    #[test]
    fn parse_formats() {
        assert_eq!("rfc9557".parse::<Format>().unwrap(), Format::Rfc9557);
        assert_eq!("ms".parse::<Format>().unwrap(), Format::Millis);
        insta::assert_snapshot!(
            "rfc2822".parse::<Format>().unwrap_err(),
            @"unrecognized format `rfc2822`",
        );
    }

    #[test]
    fn weekday_lists() {
        use jiff::civil::Weekday::*;

        let list: WeekdayList = "mon,Wed..fri,SU,sat..tu".parse().unwrap();
        assert_eq!(
            list.0,
            vec![
                (Monday, Monday),
                (Wednesday, Friday),
                (Sunday, Sunday),
                (Saturday, Tuesday),
            ],
        );
        insta::assert_snapshot!(
            "mon,,fri".parse::<WeekdayList>().unwrap_err(),
            @"invalid weekday `` in `mon,,fri`: invalid recurrence rule: unrecognized weekday: ``",
        );
    }

    #[test]
    fn format_names() {
        for name in ["rfc9557", "rfc3339", "millis"] {
            assert_eq!(name.parse::<Format>().unwrap().to_string(), name);
        }
        assert_eq!(Format::Millis.to_string(), "millis");
    }

    #[test]
    fn inputs() {
        let stdin = Input::from(OsString::from("-"));
        assert_eq!(stdin.name().to_string(), "<stdin>");
        assert_eq!(Input::default().name().to_string(), "<stdin>");
        let file = Input::from(OsString::from("tasks.jsonl"));
        assert_eq!(file.name().to_string(), "tasks.jsonl");
        let err = Input::from(OsString::from("/nonexistent/tasks.jsonl"))
            .reader()
            .err()
            .unwrap();
        assert!(
            err.to_string().starts_with("failed to open /nonexistent/"),
            "{err:#}",
        );
    }
}
