use std::{ops::RangeInclusive, sync::Arc};

use jiff::civil::Weekday;

use crate::error::{Error, Result};

/// A normalized recurrence rule.
///
/// This is the `{frequency, interval, weekdays}` triple that a persisted
/// recurrence definition boils down to. Once built, a rule is immutable and
/// cheap to clone.
///
/// Rules can be built with [`RecurrenceRule::builder`] or parsed from the
/// subset of RFC 5545 `RRULE` syntax this engine understands:
///
/// ```
/// use nextdue::{Frequency, RecurrenceRule};
///
/// let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR".parse()?;
/// assert_eq!(rule.frequency(), Frequency::Weekly);
/// assert_eq!(rule.interval(), 2);
/// assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR");
/// # Ok::<(), nextdue::Error>(())
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecurrenceRule {
    inner: Arc<RecurrenceRuleInner>,
}

#[derive(Debug, Eq, PartialEq)]
struct RecurrenceRuleInner {
    freq: Frequency,
    interval: i32,
    // Sorted Monday first, no duplicates.
    weekdays: Box<[Weekday]>,
}

impl RecurrenceRule {
    /// Returns a builder for constructing a `RecurrenceRule`.
    ///
    /// The frequency is the only thing required to create a rule. The
    /// interval defaults to `1` and the weekday set defaults to empty.
    pub fn builder(freq: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(freq)
    }

    /// Create a rule from its three normalized parts.
    pub fn new(
        freq: Frequency,
        interval: i32,
        weekdays: impl IntoWeekdayIter,
    ) -> Result<RecurrenceRule> {
        RecurrenceRule::builder(freq)
            .interval(interval)
            .by_week_day(weekdays)
            .build()
    }

    pub fn frequency(&self) -> Frequency {
        self.inner.freq
    }

    /// The number of frequency units between occurrences. Always `>= 1`.
    pub fn interval(&self) -> i32 {
        self.inner.interval
    }

    /// The weekday restriction, sorted starting with Monday.
    ///
    /// This is only ever non-empty for weekly rules.
    pub fn weekdays(&self) -> &[Weekday] {
        &self.inner.weekdays
    }

    pub fn has_weekdays(&self) -> bool {
        !self.inner.weekdays.is_empty()
    }

    /// Returns true if the given weekday is in this rule's weekday set.
    pub fn contains_weekday(&self, weekday: Weekday) -> bool {
        self.inner.weekdays.contains(&weekday)
    }
}

impl std::str::FromStr for RecurrenceRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<RecurrenceRule> {
        let trimmed = s.trim();
        let body = match trimmed.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => {
                &trimmed[6..]
            }
            _ => trimmed,
        };

        let mut freq: Option<Frequency> = None;
        let mut interval: Option<i32> = None;
        let mut weekdays: Option<Vec<Weekday>> = None;
        for part in body.split(';').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::invalid_rule(format!(
                    "malformed rule part `{part}` (expected `KEY=VALUE`)",
                )));
            };
            let (key, value) = (key.trim().to_ascii_uppercase(), value.trim());
            match &*key {
                "FREQ" => {
                    ensure_once(&key, freq.is_none())?;
                    freq = Some(value.parse()?);
                }
                "INTERVAL" => {
                    ensure_once(&key, interval.is_none())?;
                    let n = value.parse::<i32>().map_err(|err| {
                        Error::invalid_rule(format!(
                            "failed to parse INTERVAL value `{value}`: {err}",
                        ))
                    })?;
                    interval = Some(n);
                }
                "BYDAY" => {
                    ensure_once(&key, weekdays.is_none())?;
                    let days = value
                        .split(',')
                        .map(|day| parse_by_day(day.trim()))
                        .collect::<Result<Vec<Weekday>>>()?;
                    weekdays = Some(days);
                }
                _ => {
                    return Err(Error::invalid_rule(format!(
                        "unsupported rule part `{key}` \
                         (only FREQ, INTERVAL and BYDAY are supported)",
                    )));
                }
            }
        }
        let Some(freq) = freq else {
            return Err(Error::invalid_rule(format!(
                "rule `{trimmed}` is missing a FREQ part",
            )));
        };
        RecurrenceRule::builder(freq)
            .interval(interval.unwrap_or(1))
            .by_week_day(weekdays.unwrap_or_default())
            .build()
    }
}

impl std::fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "FREQ={}", self.frequency().as_str())?;
        if self.interval() != 1 {
            write!(f, ";INTERVAL={}", self.interval())?;
        }
        for (i, &weekday) in self.weekdays().iter().enumerate() {
            let sep = if i == 0 { ";BYDAY=" } else { "," };
            write!(f, "{sep}{}", weekday_code(weekday))?;
        }
        Ok(())
    }
}

impl serde::Serialize for RecurrenceRule {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for RecurrenceRule {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<RecurrenceRule, D::Error> {
        use serde::de;

        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = RecurrenceRule;

            fn expecting(
                &self,
                f: &mut core::fmt::Formatter,
            ) -> core::fmt::Result {
                f.write_str("a recurrence rule string")
            }

            fn visit_str<E: de::Error>(
                self,
                value: &str,
            ) -> std::result::Result<RecurrenceRule, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

/// A builder for constructing a valid recurrence rule.
#[derive(Clone, Debug)]
pub struct RecurrenceRuleBuilder {
    freq: Frequency,
    interval: i32,
    weekdays: Vec<Weekday>,
}

impl RecurrenceRuleBuilder {
    fn new(freq: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder { freq, interval: 1, weekdays: vec![] }
    }

    pub fn build(&self) -> Result<RecurrenceRule> {
        if self.interval < 1 {
            return Err(Error::invalid_rule(format!(
                "interval value of `{}` is invalid \
                 (interval must be greater than or equal to 1)",
                self.interval,
            )));
        }
        if !self.weekdays.is_empty() && self.freq != Frequency::Weekly {
            return Err(Error::invalid_rule(format!(
                "a weekday set can only be used with weekly frequency, \
                 but the frequency is {}",
                self.freq.as_str().to_ascii_lowercase(),
            )));
        }
        let mut weekdays = self.weekdays.clone();
        weekdays.sort_by_key(|wd| wd.to_monday_zero_offset());
        weekdays.dedup();
        let inner = Arc::new(RecurrenceRuleInner {
            freq: self.freq,
            interval: self.interval,
            weekdays: weekdays.into_boxed_slice(),
        });
        Ok(RecurrenceRule { inner })
    }

    pub fn interval(&mut self, interval: i32) -> &mut RecurrenceRuleBuilder {
        self.interval = interval;
        self
    }

    pub fn by_week_day<I: IntoWeekdayIter>(
        &mut self,
        weekdays: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.weekdays.extend(weekdays.into_weekday_iter());
        self
    }
}

/// A trait that permits flexibly specifying a set of weekdays.
///
/// This is used by `RecurrenceRuleBuilder::by_week_day` and
/// `RecurrenceRule::new`. Weekdays may be given as:
///
/// * A single weekday: `Weekday::Monday`.
/// * An array of weekdays: `[Weekday::Monday, Weekday::Friday]`.
/// * A range of weekdays: `Weekday::Monday..=Weekday::Friday`.
/// * A slice or vector of weekdays.
pub trait IntoWeekdayIter {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday>;
}

impl IntoWeekdayIter for Weekday {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday> {
        std::iter::once(self)
    }
}

impl IntoWeekdayIter for RangeInclusive<Weekday> {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday> {
        let (start, end) = (*self.start(), *self.end());
        // `Weekday::until` is always in `0..=6`, plus one for inclusivity.
        let count = 1 + usize::from(start.until(end).unsigned_abs());
        start.cycle_forward().take(count)
    }
}

impl<const N: usize> IntoWeekdayIter for [Weekday; N] {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday> {
        self.into_iter()
    }
}

impl<'a> IntoWeekdayIter for &'a [Weekday] {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday> {
        self.iter().copied()
    }
}

impl IntoWeekdayIter for Vec<Weekday> {
    fn into_weekday_iter(self) -> impl Iterator<Item = Weekday> {
        self.into_iter()
    }
}

/// The repeat unit of a recurrence rule.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the RFC 5545 name of this frequency, e.g., `WEEKLY`.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Frequency> {
        use self::Frequency::*;

        let freq = match &*s.trim().to_ascii_lowercase() {
            "yearly" | "year" | "yr" | "y" => Yearly,
            "monthly" | "month" | "mo" => Monthly,
            "weekly" | "week" | "wk" | "w" => Weekly,
            "daily" | "day" | "d" => Daily,
            unk @ ("hourly" | "minutely" | "secondly") => {
                return Err(Error::invalid_rule(format!(
                    "frequency `{unk}` is not supported \
                     (expected daily, weekly, monthly or yearly)",
                )));
            }
            unk => {
                return Err(Error::invalid_rule(format!(
                    "unrecognized frequency: `{unk}`",
                )));
            }
        };
        Ok(freq)
    }
}

/// Parses a weekday name without regard for case.
///
/// This accepts full names (`Monday`), common abbreviations (`Mon`, `Tues`)
/// and the two letter RFC 5545 codes (`MO`).
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    use jiff::civil::Weekday::*;

    let weekday = match &*s.trim().to_ascii_lowercase() {
        "sunday" | "sun" | "su" => Sunday,
        "monday" | "mon" | "mo" => Monday,
        "tuesday" | "tues" | "tue" | "tu" => Tuesday,
        "wednesday" | "wed" | "we" => Wednesday,
        "thursday" | "thurs" | "thu" | "th" => Thursday,
        "friday" | "fri" | "fr" => Friday,
        "saturday" | "sat" | "sa" => Saturday,
        unk => {
            return Err(Error::invalid_rule(format!(
                "unrecognized weekday: `{unk}`",
            )));
        }
    };
    Ok(weekday)
}

/// Returns the two letter RFC 5545 code for a weekday, e.g., `MO`.
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sunday => "SU",
        Weekday::Monday => "MO",
        Weekday::Tuesday => "TU",
        Weekday::Wednesday => "WE",
        Weekday::Thursday => "TH",
        Weekday::Friday => "FR",
        Weekday::Saturday => "SA",
    }
}

/// Parses a single `BYDAY` entry.
///
/// Numbered weekdays like `1MO` or `-1FR` only make sense at monthly or
/// yearly frequencies, which this engine doesn't expand, so they are
/// rejected outright.
fn parse_by_day(s: &str) -> Result<Weekday> {
    if s.starts_with(|c: char| c == '+' || c == '-' || c.is_ascii_digit()) {
        return Err(Error::invalid_rule(format!(
            "numbered weekday `{s}` is not supported",
        )));
    }
    parse_weekday(s)
}

fn ensure_once(key: &str, first: bool) -> Result<()> {
    if first {
        Ok(())
    } else {
        Err(Error::invalid_rule(format!(
            "rule part `{key}` given more than once",
        )))
    }
}
