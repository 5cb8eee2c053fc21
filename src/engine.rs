use jiff::tz::TimeZone;

use crate::{
    calendar::{Calendar, Clock, SystemClock},
    due::{Codec, DueDate, Precision},
    error::Result,
    next::next_occurrence,
    rule::RecurrenceRule,
};

/// Where the next occurrence of a recurring task is computed from.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorMode {
    /// The schedule is fixed: the next due date follows the existing one,
    /// regardless of when the task was actually completed.
    #[default]
    FromDueDate,
    /// The schedule rolls: the next due date follows the day the task was
    /// completed.
    FromCompletion,
}

impl std::fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            AnchorMode::FromDueDate => f.write_str("from-due-date"),
            AnchorMode::FromCompletion => f.write_str("from-completion"),
        }
    }
}

/// Computes next due dates for recurring tasks.
///
/// An engine pairs a time zone (which determines where days and weeks start)
/// with a clock (which determines when "now" is). Both are fixed at
/// construction, so an engine's results are a pure function of its inputs.
///
/// # Example
///
/// ```
/// use jiff::tz::TimeZone;
/// use nextdue::{AnchorMode, Engine, Precision, RecurrenceRule};
///
/// let engine = Engine::new(TimeZone::get("America/New_York")?);
/// let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=MO,WE,FR".parse()?;
///
/// // Monday, July 22, 2024.
/// let monday = jiff::civil::date(2024, 7, 22).in_tz("America/New_York")?;
/// let due = engine
///     .codec()
///     .encode(monday.timestamp().as_millisecond(), Precision::DateOnly)?;
///
/// let next = engine.compute_next(&rule, due, 0, AnchorMode::FromDueDate)?;
/// let next = engine.codec().decode(next)?;
/// assert_eq!(next.date(), jiff::civil::date(2024, 7, 24));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct Engine<C = SystemClock> {
    calendar: Calendar,
    codec: Codec,
    clock: C,
}

impl Engine<SystemClock> {
    /// Create an engine for the given time zone that reads the system clock.
    pub fn new(tz: TimeZone) -> Engine<SystemClock> {
        Engine::with_clock(tz, SystemClock)
    }

    /// Create an engine for the system's time zone and clock.
    pub fn system() -> Engine<SystemClock> {
        Engine::new(TimeZone::system())
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(tz: TimeZone, clock: C) -> Engine<C> {
        Engine {
            calendar: Calendar::new(tz.clone()),
            codec: Codec::new(tz),
            clock,
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the due date that follows `existing`.
    ///
    /// In [`AnchorMode::FromDueDate`], `completion_millis` is ignored and the
    /// next occurrence is computed from `existing` itself. In
    /// [`AnchorMode::FromCompletion`], it is computed from the day after
    /// `completion_millis`, and when `existing` has a time of day, that time
    /// of day is carried over to the result.
    ///
    /// The result always has the same precision as `existing`.
    ///
    /// # Errors
    ///
    /// This returns an error when the completion instant is negative, or
    /// when the next occurrence falls outside the supported datetime range.
    /// Nothing is modified on failure, so `existing` remains usable.
    pub fn compute_next(
        &self,
        rule: &RecurrenceRule,
        existing: DueDate,
        completion_millis: i64,
        mode: AnchorMode,
    ) -> Result<DueDate> {
        let precision = existing.precision();
        match mode {
            AnchorMode::FromDueDate => {
                let anchor = self.codec.decode(existing)?;
                log::debug!(
                    "computing next occurrence of `{rule}` from due date \
                     `{anchor}` ({precision})",
                );
                let next =
                    next_occurrence(&self.calendar, rule, &anchor, false)?;
                self.codec.encode_zoned(&next, precision)
            }
            AnchorMode::FromCompletion => {
                let anchor = self.calendar.zoned(completion_millis)?;
                log::debug!(
                    "computing next occurrence of `{rule}` from completion \
                     at `{anchor}` ({precision})",
                );
                let next =
                    next_occurrence(&self.calendar, rule, &anchor, true)?;
                let day = self.codec.encode_zoned(&next, Precision::DateOnly)?;
                match precision {
                    Precision::DateOnly => Ok(day),
                    Precision::DateAndTime => {
                        let time = self.codec.time_of_day(existing)?;
                        self.codec.with_time_of_day(day, time)
                    }
                }
            }
        }
    }

    /// Returns the due date that follows `existing` when the task is
    /// completed right now, according to this engine's clock.
    pub fn complete(
        &self,
        rule: &RecurrenceRule,
        existing: DueDate,
        mode: AnchorMode,
    ) -> Result<DueDate> {
        let now = self.clock.now().as_millisecond();
        self.compute_next(rule, existing, now, mode)
    }

    /// Returns an iterator over the due dates following `start`, each one
    /// computed from the last.
    ///
    /// The iterator is unbounded unless an error occurs, in which case the
    /// error is yielded once and iteration stops.
    pub fn upcoming(
        &self,
        rule: &RecurrenceRule,
        start: DueDate,
    ) -> Upcoming<'_, C> {
        Upcoming { engine: self, rule: rule.clone(), cur: Some(start) }
    }
}

/// An iterator over a chain of due dates.
///
/// This is created by [`Engine::upcoming`].
#[derive(Debug)]
pub struct Upcoming<'e, C> {
    engine: &'e Engine<C>,
    rule: RecurrenceRule,
    cur: Option<DueDate>,
}

impl<'e, C: Clock> Iterator for Upcoming<'e, C> {
    type Item = Result<DueDate>;

    fn next(&mut self) -> Option<Result<DueDate>> {
        let cur = self.cur.take()?;
        let result = self.engine.compute_next(
            &self.rule,
            cur,
            cur.epoch_millis(),
            AnchorMode::FromDueDate,
        );
        if let Ok(next) = result {
            self.cur = Some(next);
        }
        Some(result)
    }
}

impl<'e, C: Clock> std::iter::FusedIterator for Upcoming<'e, C> {}
