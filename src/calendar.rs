use jiff::{
    Span, Timestamp, Zoned,
    civil::{Date, Weekday},
    tz::TimeZone,
};

use crate::{
    due::zoned_at,
    error::{Error, Result},
};

/// The weekday on which all weeks start.
pub const WEEK_START: Weekday = Weekday::Monday;

/// The Monday from which week indices are counted.
const EPOCH_WEEK: Date = jiff::civil::date(1970, 1, 5);

/// A source of "now."
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> Timestamp;
}

/// A clock that reads the system's current time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that is stuck at a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(Timestamp);

impl FixedClock {
    pub fn new(now: Timestamp) -> FixedClock {
        FixedClock(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Calendar arithmetic in a single time zone.
///
/// Every addition here is done on calendar units (days, weeks, months and
/// years) and never on raw durations. That means adding a day across a DST
/// transition keeps the same wall clock time, and adding a month to January
/// 31 gives the last day of February.
///
/// Datetimes given to the methods on this type are expected to be in the
/// calendar's time zone. [`Calendar::zoned`] and [`Calendar::localize`]
/// produce such datetimes.
#[derive(Clone, Debug)]
pub struct Calendar {
    tz: TimeZone,
}

impl Calendar {
    pub fn new(tz: TimeZone) -> Calendar {
        Calendar { tz }
    }

    /// A calendar in the system's configured time zone.
    pub fn system() -> Calendar {
        Calendar::new(TimeZone::system())
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Returns the datetime in this calendar's time zone for the given number
    /// of milliseconds since the Unix epoch.
    pub fn zoned(&self, millis: i64) -> Result<Zoned> {
        zoned_at(&self.tz, millis)
    }

    /// Returns the same instant as `zdt`, but in this calendar's time zone.
    pub fn localize(&self, zdt: &Zoned) -> Zoned {
        zdt.with_time_zone(self.tz.clone())
    }

    pub fn day_of_week(&self, zdt: &Zoned) -> Weekday {
        zdt.weekday()
    }

    pub fn add_days(&self, zdt: &Zoned, days: i64) -> Result<Zoned> {
        self.add(zdt, Span::new().try_days(days), days, "days")
    }

    pub fn add_weeks(&self, zdt: &Zoned, weeks: i64) -> Result<Zoned> {
        self.add(zdt, Span::new().try_weeks(weeks), weeks, "weeks")
    }

    /// Adds months, constraining the day to the last day of the resulting
    /// month when needed.
    pub fn add_months(&self, zdt: &Zoned, months: i64) -> Result<Zoned> {
        self.add(zdt, Span::new().try_months(months), months, "months")
    }

    /// Adds years. February 29 becomes February 28 in non-leap years.
    pub fn add_years(&self, zdt: &Zoned, years: i64) -> Result<Zoned> {
        self.add(zdt, Span::new().try_years(years), years, "years")
    }

    /// Moves `zdt` to the given civil date, keeping its time of day.
    ///
    /// This is a single calendar addition from `zdt`, so a DST gap on any
    /// day in between has no effect on the time of the result.
    pub fn on_date(&self, zdt: &Zoned, date: Date) -> Result<Zoned> {
        let days = zdt
            .date()
            .until(date)
            .map_err(|err| {
                Error::unresolved(format!(
                    "failed to find days between `{zdt}` and `{date}`: {err}"
                ))
            })?
            .get_days();
        self.add_days(zdt, i64::from(days))
    }

    /// Returns the first instant of the day containing `zdt`.
    pub fn start_of_day(&self, zdt: &Zoned) -> Result<Zoned> {
        zdt.start_of_day().map_err(|err| {
            Error::unresolved(format!(
                "failed to find start of day for `{zdt}`: {err}"
            ))
        })
    }

    /// Returns the nearest datetime on or after `zdt` falling on `weekday`,
    /// at the same time of day.
    pub fn next_or_same_weekday(
        &self,
        zdt: &Zoned,
        weekday: Weekday,
    ) -> Result<Zoned> {
        self.advance_to_weekday(zdt, weekday, false)
    }

    /// Like `next_or_same_weekday`, except when `strictly_after` is set, a
    /// datetime already on `weekday` moves a full week forward.
    pub fn advance_to_weekday(
        &self,
        zdt: &Zoned,
        weekday: Weekday,
        strictly_after: bool,
    ) -> Result<Zoned> {
        let mut days = i64::from(weekday.since(zdt.weekday()));
        if days == 0 && strictly_after {
            days = 7;
        }
        self.add_days(zdt, days)
    }

    /// Returns the first day of the week containing `zdt`, at the same time
    /// of day.
    pub fn start_of_week(&self, zdt: &Zoned) -> Result<Zoned> {
        let back = zdt.weekday().since(WEEK_START);
        self.add_days(zdt, -i64::from(back))
    }

    /// Returns the number of whole weeks between the week starting on
    /// 1970-01-05 and the week containing `zdt`.
    ///
    /// Two datetimes are in the same week exactly when their indices are
    /// equal.
    pub fn week_index(&self, zdt: &Zoned) -> Result<i64> {
        week_of(zdt.date())
    }

    fn add(
        &self,
        zdt: &Zoned,
        span: std::result::Result<Span, jiff::Error>,
        amount: i64,
        unit: &str,
    ) -> Result<Zoned> {
        span.and_then(|span| zdt.checked_add(span)).map_err(|err| {
            Error::unresolved(format!(
                "adding {amount} {unit} to `{zdt}` failed: {err}"
            ))
        })
    }
}

/// Returns the start of the week that the given date resides in.
pub(crate) fn first_of_week(date: Date) -> Date {
    let back = date.weekday().since(WEEK_START);
    // Only fails within six days of Jiff's minimum date.
    date.checked_sub(Span::new().days(back)).unwrap_or(date)
}

/// The date-only counterpart of [`Calendar::week_index`].
pub(crate) fn week_of(date: Date) -> Result<i64> {
    let days = EPOCH_WEEK
        .until(first_of_week(date))
        .map_err(|err| {
            Error::unresolved(format!(
                "failed to find week of `{date}`: {err}"
            ))
        })?
        .get_days();
    Ok(i64::from(days).div_euclid(7))
}

/// Adds days to a civil date.
pub(crate) fn shift_date(date: Date, days: i64) -> Result<Date> {
    Span::new()
        .try_days(days)
        .and_then(|span| date.checked_add(span))
        .map_err(|err| {
            Error::unresolved(format!(
                "adding {days} days to `{date}` failed: {err}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday::*, date};

    use super::*;

    fn cal() -> Calendar {
        Calendar::new(TimeZone::get("America/New_York").unwrap())
    }

    fn zdt(s: &str) -> Zoned {
        s.parse().unwrap()
    }

    #[test]
    fn add_days_keeps_wall_clock() {
        let cal = cal();
        let got = cal.add_days(&zdt("2024-03-09T10:00[America/New_York]"), 1);
        insta::assert_snapshot!(
            got.unwrap(),
            @"2024-03-10T10:00:00-04:00[America/New_York]",
        );
        let got = cal.add_days(&zdt("2024-11-02T10:00[America/New_York]"), 1);
        insta::assert_snapshot!(
            got.unwrap(),
            @"2024-11-03T10:00:00-05:00[America/New_York]",
        );
        // 02:30 doesn't exist on 2024-03-10.
        let got = cal.add_days(&zdt("2024-03-09T02:30[America/New_York]"), 1);
        insta::assert_snapshot!(
            got.unwrap(),
            @"2024-03-10T03:30:00-04:00[America/New_York]",
        );
        let got = cal.add_weeks(&zdt("2024-07-20T16:30[America/New_York]"), 2);
        insta::assert_snapshot!(
            got.unwrap(),
            @"2024-08-03T16:30:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn add_months_constrains_day() {
        let cal = cal();
        let jan31 = zdt("2024-01-31T09:00[America/New_York]");
        insta::assert_snapshot!(
            cal.add_months(&jan31, 1).unwrap(),
            @"2024-02-29T09:00:00-05:00[America/New_York]",
        );
        insta::assert_snapshot!(
            cal.add_months(&jan31, 3).unwrap(),
            @"2024-04-30T09:00:00-04:00[America/New_York]",
        );
        let jan31 = zdt("2023-01-31T09:00[America/New_York]");
        insta::assert_snapshot!(
            cal.add_months(&jan31, 1).unwrap(),
            @"2023-02-28T09:00:00-05:00[America/New_York]",
        );
    }

    #[test]
    fn add_years_leap_day() {
        let cal = cal();
        let leap = zdt("2024-02-29[America/New_York]");
        insta::assert_snapshot!(
            cal.add_years(&leap, 1).unwrap(),
            @"2025-02-28T00:00:00-05:00[America/New_York]",
        );
        insta::assert_snapshot!(
            cal.add_years(&leap, 4).unwrap(),
            @"2028-02-29T00:00:00-05:00[America/New_York]",
        );
    }

    #[test]
    fn overflow_is_unresolved() {
        let cal = cal();
        let far = zdt("9999-12-01T00:00[America/New_York]");
        let err = cal.add_months(&far, 1).unwrap_err();
        assert!(matches!(err, Error::RecurrenceUnresolved(_)));
        let err = cal.add_days(&far, i64::MAX).unwrap_err();
        assert!(matches!(err, Error::RecurrenceUnresolved(_)));
    }

    #[test]
    fn weekday_search() {
        let cal = cal();
        // Saturday
        let sat = zdt("2024-07-20T16:30:55[America/New_York]");
        assert_eq!(cal.day_of_week(&sat), Saturday);
        let mon = cal.next_or_same_weekday(&sat, Monday).unwrap();
        assert_eq!(mon.date(), date(2024, 7, 22));
        assert_eq!(mon.time(), sat.time());
        assert_eq!(cal.next_or_same_weekday(&mon, Monday).unwrap(), mon);
        assert_eq!(
            cal.advance_to_weekday(&mon, Monday, true).unwrap().date(),
            date(2024, 7, 29),
        );
        assert_eq!(
            cal.advance_to_weekday(&mon, Wednesday, true).unwrap().date(),
            date(2024, 7, 24),
        );
        assert_eq!(
            cal.next_or_same_weekday(&sat, Saturday).unwrap().date(),
            date(2024, 7, 20),
        );
    }

    #[test]
    fn on_date_is_one_addition() {
        let cal = cal();
        let anchor = zdt("2024-03-09T02:30[America/New_York]");
        // Stepping through the gap day first would carry 03:30 along.
        let stepped = cal.add_days(&anchor, 1).unwrap();
        insta::assert_snapshot!(
            cal.add_days(&stepped, 1).unwrap(),
            @"2024-03-11T03:30:00-04:00[America/New_York]",
        );
        insta::assert_snapshot!(
            cal.on_date(&anchor, date(2024, 3, 11)).unwrap(),
            @"2024-03-11T02:30:00-04:00[America/New_York]",
        );
        insta::assert_snapshot!(
            cal.on_date(&anchor, date(2024, 3, 1)).unwrap(),
            @"2024-03-01T02:30:00-05:00[America/New_York]",
        );
    }

    #[test]
    fn civil_week_helpers() {
        assert_eq!(first_of_week(date(2024, 3, 10)), date(2024, 3, 4));
        let sunday = week_of(date(2024, 3, 10)).unwrap();
        assert_eq!(week_of(date(2024, 3, 11)).unwrap(), sunday + 1);
        assert_eq!(
            shift_date(date(2024, 2, 28), 2).unwrap(),
            date(2024, 3, 1),
        );
        assert!(shift_date(date(9999, 12, 31), 1).is_err());
    }

    #[test]
    fn weeks_start_on_monday() {
        let cal = cal();
        let sun = zdt("2024-07-21T10:00[America/New_York]");
        insta::assert_snapshot!(
            cal.start_of_week(&sun).unwrap(),
            @"2024-07-15T10:00:00-04:00[America/New_York]",
        );
        let mon = zdt("2024-07-22T10:00[America/New_York]");
        assert_eq!(cal.start_of_week(&mon).unwrap(), mon);

        let sun_week = cal.week_index(&sun).unwrap();
        let mon_week = cal.week_index(&mon).unwrap();
        assert_eq!(mon_week - sun_week, 1);
        let next_sun = zdt("2024-07-28T23:59[America/New_York]");
        assert_eq!(cal.week_index(&next_sun).unwrap(), mon_week);
    }

    #[test]
    fn week_index_epoch() {
        let cal = cal();
        let week = |s: &str| cal.week_index(&zdt(s)).unwrap();
        assert_eq!(week("1970-01-05[America/New_York]"), 0);
        assert_eq!(week("1970-01-11T23:00[America/New_York]"), 0);
        assert_eq!(week("1970-01-12[America/New_York]"), 1);
        assert_eq!(week("1970-01-04[America/New_York]"), -1);
        assert_eq!(week("1969-12-29[America/New_York]"), -1);
        assert_eq!(week("1969-12-28[America/New_York]"), -2);
    }

    #[test]
    fn zoned_rejects_negative() {
        let cal = cal();
        assert!(matches!(
            cal.zoned(-1).unwrap_err(),
            Error::InvalidTimestamp { millis: -1, .. },
        ));
        insta::assert_snapshot!(
            cal.zoned(0).unwrap(),
            @"1969-12-31T19:00:00-05:00[America/New_York]",
        );
    }

    #[test]
    fn clocks() {
        let ts: Timestamp = "2024-07-20T20:30:55Z".parse().unwrap();
        assert_eq!(FixedClock::new(ts).now(), ts);
        assert!(SystemClock.now() > ts);
    }
}
