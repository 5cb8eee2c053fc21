/*!
Computes the next due date of a recurring task.

A recurring task has a [`RecurrenceRule`] (daily, weekly, monthly or yearly,
with an interval and, for weekly rules, an optional set of weekdays) and a
[`DueDate`] (a timestamp that is either a whole day or a specific time). When
the task is completed, an [`Engine`] computes its next due date, either from
the existing due date ([`AnchorMode::FromDueDate`]) or from the instant it was
completed ([`AnchorMode::FromCompletion`]).

All calendar arithmetic is done with [`jiff`] in a single time zone, so
adding a day across a DST transition keeps the wall clock time, and adding a
month to January 31 gives the last day of February.

# Example

```
use jiff::{civil, tz::TimeZone};
use nextdue::{AnchorMode, Engine, Precision, RecurrenceRule};

let engine = Engine::new(TimeZone::get("America/New_York")?);
let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO".parse()?;

let due = civil::date(2024, 7, 22).at(9, 0, 0, 0).in_tz("America/New_York")?;
let due = engine
    .codec()
    .encode(due.timestamp().as_millisecond(), Precision::DateAndTime)?;

let next = engine.compute_next(&rule, due, 0, AnchorMode::FromDueDate)?;
assert_eq!(
    engine.codec().decode(next)?.to_string(),
    "2024-08-05T09:00:00-04:00[America/New_York]",
);
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

#![deny(missing_debug_implementations)]

pub use crate::{
    calendar::{Calendar, Clock, FixedClock, SystemClock},
    due::{Codec, DueDate, Precision},
    engine::{AnchorMode, Engine, Upcoming},
    error::{Error, Result},
    next::{MAX_SEARCH_STEPS, next_occurrence},
    rule::{Frequency, IntoWeekdayIter, RecurrenceRule, RecurrenceRuleBuilder},
};

pub mod calendar;
pub mod due;
mod engine;
mod error;
mod next;
pub mod rule;
