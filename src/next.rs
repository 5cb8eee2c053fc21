use jiff::{
    Zoned,
    civil::{Date, Weekday},
};

use crate::{
    calendar::{Calendar, first_of_week, shift_date, week_of},
    error::{Error, Result},
    rule::{Frequency, RecurrenceRule},
};

/// The maximum number of candidate weeks inspected when searching for the
/// next weekday occurrence.
///
/// A valid rule always resolves on the first or second candidate, so hitting
/// this limit means something has gone badly wrong.
pub const MAX_SEARCH_STEPS: usize = 1_000;

/// Returns the next occurrence of `rule` after `anchor`.
///
/// When `anchor_is_completion` is false, `anchor` is the existing due date
/// and the result preserves its time of day. Otherwise, `anchor` is the
/// instant the task was completed, and the result is always the start of a
/// day on or after the day following the completion.
///
/// The anchor must be in the time zone of `calendar`.
pub fn next_occurrence(
    calendar: &Calendar,
    rule: &RecurrenceRule,
    anchor: &Zoned,
    anchor_is_completion: bool,
) -> Result<Zoned> {
    let calc =
        Calculator { calendar, rule, from_completion: anchor_is_completion };
    let next = calc.next(anchor)?;
    log::trace!(
        "next occurrence of `{rule}` after {kind} `{anchor}` is `{next}`",
        kind = if anchor_is_completion { "completion" } else { "due date" },
    );
    Ok(next)
}

#[derive(Debug)]
struct Calculator<'a> {
    calendar: &'a Calendar,
    rule: &'a RecurrenceRule,
    from_completion: bool,
}

impl<'a> Calculator<'a> {
    fn next(&self, anchor: &Zoned) -> Result<Zoned> {
        if self.rule.interval() < 1 {
            return Err(Error::UnsupportedFrequency(format!(
                "interval `{}` must be at least 1",
                self.rule.interval(),
            )));
        }
        if self.rule.has_weekdays()
            && self.rule.frequency() != Frequency::Weekly
        {
            return Err(Error::UnsupportedFrequency(format!(
                "{} rule cannot have a weekday set",
                self.rule.frequency(),
            )));
        }
        match self.rule.frequency() {
            Frequency::Daily => self.daily(anchor),
            Frequency::Weekly if self.rule.has_weekdays() => {
                if self.from_completion {
                    self.weekly_by_day_from_completion(anchor)
                } else {
                    self.weekly_by_day(anchor)
                }
            }
            Frequency::Weekly => {
                let next = self.calendar.add_weeks(anchor, self.interval())?;
                self.day_if_completion(next)
            }
            Frequency::Monthly => {
                let next = self.calendar.add_months(anchor, self.interval())?;
                self.day_if_completion(next)
            }
            Frequency::Yearly => {
                let next = self.calendar.add_years(anchor, self.interval())?;
                self.day_if_completion(next)
            }
        }
    }

    fn daily(&self, anchor: &Zoned) -> Result<Zoned> {
        if !self.from_completion {
            return self.calendar.add_days(anchor, self.interval());
        }
        let next = self.calendar.add_days(anchor, self.interval())?;
        self.calendar.start_of_day(&next)
    }

    /// Searches forward from the day after a due date anchor.
    ///
    /// Each candidate's week is compared against the anchor's week. If the
    /// distance isn't a multiple of the interval, the search jumps to the
    /// start of the next week that is.
    ///
    /// The search runs on civil dates. Only the date it settles on is
    /// turned back into a datetime, by a single addition to the anchor.
    fn weekly_by_day(&self, anchor: &Zoned) -> Result<Zoned> {
        let interval = self.interval();
        let anchor_week = week_of(anchor.date())?;
        let mut start = shift_date(anchor.date(), 1)?;
        for _ in 0..MAX_SEARCH_STEPS {
            let candidate = self.earliest_weekday(start)?;
            let cycle = week_of(candidate)? - anchor_week;
            let offset = cycle.rem_euclid(interval);
            if offset == 0 {
                return self.calendar.on_date(anchor, candidate);
            }
            log::trace!(
                "skipping `{candidate}` since it is in week {cycle} of an \
                 interval of {interval} weeks",
            );
            start =
                shift_date(first_of_week(candidate), 7 * (interval - offset))?;
        }
        Err(Error::unresolved(format!(
            "no occurrence of `{}` found after `{anchor}` within \
             {MAX_SEARCH_STEPS} steps",
            self.rule,
        )))
    }

    /// Completions don't establish a week cycle, so the search simply starts
    /// `interval - 1` weeks after the day following the completion.
    fn weekly_by_day_from_completion(&self, anchor: &Zoned) -> Result<Zoned> {
        let weeks = self.interval() - 1;
        let start = shift_date(anchor.date(), 1 + 7 * weeks)?;
        let day = self.earliest_weekday(start)?;
        let next = self.calendar.on_date(anchor, day)?;
        self.calendar.start_of_day(&next)
    }

    /// Returns the earliest date on or after `start` whose weekday is in the
    /// rule's weekday set.
    fn earliest_weekday(&self, start: Date) -> Result<Date> {
        let mut earliest: Option<(Weekday, i8)> = None;
        for &weekday in self.rule.weekdays() {
            let days = weekday.since(start.weekday());
            if earliest.map_or(true, |(_, e)| days < e) {
                earliest = Some((weekday, days));
            }
        }
        let Some((weekday, days)) = earliest else {
            return Err(Error::UnsupportedFrequency(format!(
                "weekly rule `{}` has an empty weekday set",
                self.rule,
            )));
        };
        log::trace!("earliest weekday on or after `{start}` is {weekday:?}");
        shift_date(start, i64::from(days))
    }

    fn day_if_completion(&self, next: Zoned) -> Result<Zoned> {
        if self.from_completion {
            self.calendar.start_of_day(&next)
        } else {
            Ok(next)
        }
    }

    fn interval(&self) -> i64 {
        i64::from(self.rule.interval())
    }
}

#[cfg(test)]
mod tests {
    use jiff::{civil::Weekday::*, tz::TimeZone};

    use super::*;

    fn cal() -> Calendar {
        Calendar::new(TimeZone::get("America/New_York").unwrap())
    }

    fn zoned(s: &str) -> Zoned {
        s.parse().unwrap()
    }

    fn rule(s: &str) -> RecurrenceRule {
        s.parse().unwrap()
    }

    fn next(rule: &RecurrenceRule, anchor: &str) -> Zoned {
        next_occurrence(&cal(), rule, &zoned(anchor), false).unwrap()
    }

    fn next_from_completion(rule: &RecurrenceRule, completed: &str) -> Zoned {
        next_occurrence(&cal(), rule, &zoned(completed), true).unwrap()
    }

    /// Follows a chain of due dates, each computed from the last.
    fn chain(rule: &RecurrenceRule, start: &str, count: usize) -> Vec<Zoned> {
        let cal = cal();
        let mut due = zoned(start);
        let mut dues = vec![];
        for _ in 0..count {
            due = next_occurrence(&cal, rule, &due, false).unwrap();
            dues.push(due.clone());
        }
        dues
    }

    fn snapshot<T>(it: impl IntoIterator<Item = T>) -> String
    where
        T: ToString,
    {
        it.into_iter()
            .map(|item| item.to_string())
            .collect::<Vec<String>>()
            .join("\n")
    }

    #[test]
    fn daily() {
        let rule = rule("FREQ=DAILY;INTERVAL=10");
        insta::assert_snapshot!(
            snapshot(chain(&rule, "1997-09-02T09:00[America/New_York]", 6)),
            @r"
        1997-09-12T09:00:00-04:00[America/New_York]
        1997-09-22T09:00:00-04:00[America/New_York]
        1997-10-02T09:00:00-04:00[America/New_York]
        1997-10-12T09:00:00-04:00[America/New_York]
        1997-10-22T09:00:00-04:00[America/New_York]
        1997-11-01T09:00:00-05:00[America/New_York]
        ",
        );
    }

    #[test]
    fn daily_from_completion() {
        let completed = "2024-07-20T16:30:55[America/New_York]";
        insta::assert_snapshot!(
            next_from_completion(&rule("FREQ=DAILY"), completed),
            @"2024-07-21T00:00:00-04:00[America/New_York]",
        );
        insta::assert_snapshot!(
            next_from_completion(&rule("FREQ=DAILY;INTERVAL=3"), completed),
            @"2024-07-23T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn weekly_every_other_week() {
        let rule = rule("FREQ=WEEKLY;INTERVAL=2");
        insta::assert_snapshot!(
            snapshot(chain(&rule, "1997-09-02T09:00[America/New_York]", 6)),
            @r"
        1997-09-16T09:00:00-04:00[America/New_York]
        1997-09-30T09:00:00-04:00[America/New_York]
        1997-10-14T09:00:00-04:00[America/New_York]
        1997-10-28T09:00:00-05:00[America/New_York]
        1997-11-11T09:00:00-05:00[America/New_York]
        1997-11-25T09:00:00-05:00[America/New_York]
        ",
        );
        insta::assert_snapshot!(
            next_from_completion(
                &rule,
                "2024-07-20T16:30:55[America/New_York]",
            ),
            @"2024-08-03T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn weekly_every_other_week_tues_thurs() {
        let rule = rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH");
        insta::assert_snapshot!(
            snapshot(chain(&rule, "1997-09-02T09:00[America/New_York]", 9)),
            @r"
        1997-09-04T09:00:00-04:00[America/New_York]
        1997-09-16T09:00:00-04:00[America/New_York]
        1997-09-18T09:00:00-04:00[America/New_York]
        1997-09-30T09:00:00-04:00[America/New_York]
        1997-10-02T09:00:00-04:00[America/New_York]
        1997-10-14T09:00:00-04:00[America/New_York]
        1997-10-16T09:00:00-04:00[America/New_York]
        1997-10-28T09:00:00-05:00[America/New_York]
        1997-10-30T09:00:00-05:00[America/New_York]
        ",
        );
    }

    #[test]
    fn weekly_every_other_week_mon_wed_fri() {
        let rule = rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR");
        insta::assert_snapshot!(
            snapshot(chain(&rule, "1997-09-01T09:00[America/New_York]", 14)),
            @r"
        1997-09-03T09:00:00-04:00[America/New_York]
        1997-09-05T09:00:00-04:00[America/New_York]
        1997-09-15T09:00:00-04:00[America/New_York]
        1997-09-17T09:00:00-04:00[America/New_York]
        1997-09-19T09:00:00-04:00[America/New_York]
        1997-09-29T09:00:00-04:00[America/New_York]
        1997-10-01T09:00:00-04:00[America/New_York]
        1997-10-03T09:00:00-04:00[America/New_York]
        1997-10-13T09:00:00-04:00[America/New_York]
        1997-10-15T09:00:00-04:00[America/New_York]
        1997-10-17T09:00:00-04:00[America/New_York]
        1997-10-27T09:00:00-05:00[America/New_York]
        1997-10-29T09:00:00-05:00[America/New_York]
        1997-10-31T09:00:00-05:00[America/New_York]
        ",
        );
    }

    #[test]
    fn weekly_own_day_never_qualifies() {
        let mwf = rule("FREQ=WEEKLY;BYDAY=MO,WE,FR");
        // Monday
        insta::assert_snapshot!(
            next(&mwf, "2024-07-22T10:00[America/New_York]"),
            @"2024-07-24T10:00:00-04:00[America/New_York]",
        );
        // Friday
        insta::assert_snapshot!(
            next(&mwf, "2024-07-26T10:00[America/New_York]"),
            @"2024-07-29T10:00:00-04:00[America/New_York]",
        );
        // Sunday
        insta::assert_snapshot!(
            next(&mwf, "2024-07-21[America/New_York]"),
            @"2024-07-22T00:00:00-04:00[America/New_York]",
        );

        let mon = rule("FREQ=WEEKLY;BYDAY=MO");
        insta::assert_snapshot!(
            next(&mon, "2024-07-22[America/New_York]"),
            @"2024-07-29T00:00:00-04:00[America/New_York]",
        );
        let mon = rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO");
        insta::assert_snapshot!(
            next(&mon, "2024-07-22[America/New_York]"),
            @"2024-08-05T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn weekly_multi_week_anchored_on_sunday() {
        // Sunday is the last day of its week, so the Monday right after it
        // is in the next week and gets skipped.
        let rule = rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR");
        insta::assert_snapshot!(
            next(&rule, "2024-07-21[America/New_York]"),
            @"2024-07-29T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn weekly_by_day_from_completion() {
        let completed = "2024-07-20T16:30:55[America/New_York]";
        let rule1 = rule("FREQ=WEEKLY;BYDAY=SA,MO");
        insta::assert_snapshot!(
            next_from_completion(&rule1, completed),
            @"2024-07-22T00:00:00-04:00[America/New_York]",
        );
        let rule1 = rule("FREQ=WEEKLY;BYDAY=SU");
        insta::assert_snapshot!(
            next_from_completion(&rule1, completed),
            @"2024-07-21T00:00:00-04:00[America/New_York]",
        );
        let rule2 = rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR");
        insta::assert_snapshot!(
            next_from_completion(&rule2, completed),
            @"2024-07-29T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn monthly_constrains_day() {
        let rule = rule("FREQ=MONTHLY");
        insta::assert_snapshot!(
            snapshot(chain(&rule, "2024-01-31T09:00[America/New_York]", 4)),
            @r"
        2024-02-29T09:00:00-05:00[America/New_York]
        2024-03-29T09:00:00-04:00[America/New_York]
        2024-04-29T09:00:00-04:00[America/New_York]
        2024-05-29T09:00:00-04:00[America/New_York]
        ",
        );
        insta::assert_snapshot!(
            next_from_completion(
                &rule,
                "2024-07-20T16:30:55[America/New_York]",
            ),
            @"2024-08-20T00:00:00-04:00[America/New_York]",
        );
    }

    #[test]
    fn yearly_leap_day() {
        let yearly = rule("FREQ=YEARLY");
        insta::assert_snapshot!(
            snapshot(chain(&yearly, "2024-02-29[America/New_York]", 2)),
            @r"
        2025-02-28T00:00:00-05:00[America/New_York]
        2026-02-28T00:00:00-05:00[America/New_York]
        ",
        );
        let leap = rule("FREQ=YEARLY;INTERVAL=4");
        insta::assert_snapshot!(
            next(&leap, "2024-02-29[America/New_York]"),
            @"2028-02-29T00:00:00-05:00[America/New_York]",
        );
    }

    #[test]
    fn results_follow_anchor() {
        let cal = cal();
        let anchors = [
            "2024-07-20T16:30:55[America/New_York]",
            "2024-07-21T00:00[America/New_York]",
            "2024-03-09T02:30[America/New_York]",
            "2024-11-03T01:30-04:00[America/New_York]",
            "2024-12-31T23:59:59[America/New_York]",
        ];
        let rules = [
            "FREQ=DAILY",
            "FREQ=DAILY;INTERVAL=2",
            "FREQ=WEEKLY",
            "FREQ=WEEKLY;INTERVAL=3;BYDAY=TU,SU",
            "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR,SA,SU",
            "FREQ=MONTHLY;INTERVAL=5",
            "FREQ=YEARLY",
        ];
        for r in rules {
            let rule = rule(r);
            for a in anchors {
                let anchor = zoned(a);
                let due =
                    next_occurrence(&cal, &rule, &anchor, false).unwrap();
                assert!(due > anchor, "{r} after {a} gave {due}");
                let tomorrow = cal
                    .start_of_day(&cal.add_days(&anchor, 1).unwrap())
                    .unwrap();
                let done =
                    next_occurrence(&cal, &rule, &anchor, true).unwrap();
                assert!(done >= tomorrow, "{r} completed {a} gave {done}");
                assert_eq!(done, cal.start_of_day(&done).unwrap());
                if rule.has_weekdays() {
                    assert!(rule.contains_weekday(due.weekday()));
                    assert!(rule.contains_weekday(done.weekday()));
                }
            }
        }
    }

    // 2024-03-10 has no 02:30 in New York, but the days after it do.
    #[test]
    fn weekday_search_keeps_time_across_gap() {
        let anchor = "2024-03-09T02:30[America/New_York]";
        insta::assert_snapshot!(
            next(&rule("FREQ=WEEKLY;BYDAY=MO"), anchor),
            @"2024-03-11T02:30:00-04:00[America/New_York]",
        );
        insta::assert_snapshot!(
            next(&rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO"), anchor),
            @"2024-03-18T02:30:00-04:00[America/New_York]",
        );
        // Landing on the gap day itself is the one case that shifts.
        insta::assert_snapshot!(
            next(&rule("FREQ=WEEKLY;BYDAY=SU,MO"), anchor),
            @"2024-03-10T03:30:00-04:00[America/New_York]",
        );
        let cal = cal();
        let due = next(&rule("FREQ=WEEKLY;BYDAY=MO"), anchor);
        assert_eq!(due, cal.add_days(&zoned(anchor), 2).unwrap());
    }

    #[test]
    fn completion_across_skipped_midnight() {
        // Sao Paulo skipped midnight on 2015-10-18.
        let cal = Calendar::new(TimeZone::get("America/Sao_Paulo").unwrap());
        let completed = zoned("2015-10-17T12:00[America/Sao_Paulo]");
        let rule = rule("FREQ=DAILY;INTERVAL=2");
        insta::assert_snapshot!(
            next_occurrence(&cal, &rule, &completed, true).unwrap(),
            @"2015-10-19T00:00:00-02:00[America/Sao_Paulo]",
        );
    }

    #[test]
    fn every_day_of_week_is_daily() {
        let all = rule("FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR,SA,SU");
        let cal = cal();
        let mut due = zoned("2024-07-20T08:00[America/New_York]");
        for _ in 0..10 {
            let next = next_occurrence(&cal, &all, &due, false).unwrap();
            assert_eq!(next, cal.add_days(&due, 1).unwrap());
            assert_ne!(next.weekday(), due.weekday());
            due = next;
        }
        assert_eq!(cal.day_of_week(&due), Tuesday);
    }

    #[test]
    fn out_of_range() {
        let cal = cal();
        let rule = rule("FREQ=YEARLY");
        let anchor = zoned("9999-06-01T00:00[America/New_York]");
        let err = next_occurrence(&cal, &rule, &anchor, false).unwrap_err();
        assert!(matches!(err, Error::RecurrenceUnresolved(_)));
    }
}
