use jiff::{Timestamp, Zoned, civil, tz::TimeZone};

use crate::error::{Error, Result};

/// Whether a due date carries a time of day or represents a whole day.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    /// The due date is a calendar day. Its timestamp is always the first
    /// instant of that day in the codec's time zone.
    #[default]
    DateOnly,
    /// The due date is a specific wall clock time, to the second.
    DateAndTime,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Precision::DateOnly => "date-only",
            Precision::DateAndTime => "date-and-time",
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A due date: a timestamp paired with its precision.
///
/// Due dates are only ever produced by a [`Codec`], which guarantees the
/// precision invariants hold. They are ordered by timestamp first, so a
/// collection of due dates sorts chronologically.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DueDate {
    epoch_millis: i64,
    precision: Precision,
}

impl DueDate {
    /// Milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn is_date_only(&self) -> bool {
        self.precision == Precision::DateOnly
    }
}

/// Encodes and decodes due dates in a particular time zone.
///
/// The time zone determines where a day starts (for date-only due dates) and
/// what wall clock time a timestamp corresponds to.
#[derive(Clone, Debug)]
pub struct Codec {
    tz: TimeZone,
}

impl Codec {
    pub fn new(tz: TimeZone) -> Codec {
        Codec { tz }
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Encode a raw timestamp with the given precision.
    ///
    /// Date-only due dates are floored to the start of their day. Otherwise,
    /// any sub-second fraction is discarded (not rounded).
    pub fn encode(
        &self,
        millis: i64,
        precision: Precision,
    ) -> Result<DueDate> {
        let zdt = zoned_at(&self.tz, millis)?;
        self.encode_zoned(&zdt, precision)
    }

    /// Like `encode`, but for a datetime that has already been resolved.
    pub fn encode_zoned(
        &self,
        zdt: &Zoned,
        precision: Precision,
    ) -> Result<DueDate> {
        let millis = zdt.timestamp().as_millisecond();
        let epoch_millis = match precision {
            Precision::DateOnly => self.floor_zoned(zdt)?,
            Precision::DateAndTime => millis - millis.rem_euclid(1_000),
        };
        // Flooring can cross the epoch, e.g., the first day in a zone west
        // of UTC starts before it.
        if millis < 0 || epoch_millis < 0 {
            return Err(Error::invalid_timestamp(
                millis,
                "timestamps before the Unix epoch are not supported",
            ));
        }
        Ok(DueDate { epoch_millis, precision })
    }

    /// Returns the datetime this due date refers to.
    pub fn decode(&self, due: DueDate) -> Result<Zoned> {
        zoned_at(&self.tz, due.epoch_millis)
    }

    /// Returns the wall clock time of a due date.
    ///
    /// Date-only due dates always report midnight, even on days where the
    /// first instant isn't midnight because of a time zone transition.
    pub fn time_of_day(&self, due: DueDate) -> Result<civil::Time> {
        if due.is_date_only() {
            return Ok(civil::Time::midnight());
        }
        let time = self.decode(due)?.time();
        Ok(civil::time(time.hour(), time.minute(), time.second(), 0))
    }

    /// Returns a date-and-time due date on the same calendar day as `due`,
    /// but at the given wall clock time.
    ///
    /// If the wall clock time doesn't exist on that day (it falls into a
    /// gap), the time after the gap is used.
    pub fn with_time_of_day(
        &self,
        due: DueDate,
        time: civil::Time,
    ) -> Result<DueDate> {
        let zdt = self.decode(due)?;
        let replaced = zdt
            .with()
            .hour(time.hour())
            .minute(time.minute())
            .second(time.second())
            .subsec_nanosecond(0)
            .build()
            .map_err(|err| Error::invalid_timestamp(due.epoch_millis, err))?;
        self.encode_zoned(&replaced, Precision::DateAndTime)
    }

    pub fn is_date_only(&self, due: DueDate) -> bool {
        due.is_date_only()
    }

    /// Drops the time of day from a due date.
    pub fn strip_time(&self, due: DueDate) -> Result<DueDate> {
        self.encode(due.epoch_millis, Precision::DateOnly)
    }

    /// Returns the first instant of the day containing `millis`.
    pub fn floor_to_day(&self, millis: i64) -> Result<i64> {
        let zdt = zoned_at(&self.tz, millis)?;
        self.floor_zoned(&zdt)
    }

    fn floor_zoned(&self, zdt: &Zoned) -> Result<i64> {
        let start = zdt.start_of_day().map_err(|err| {
            Error::invalid_timestamp(zdt.timestamp().as_millisecond(), err)
        })?;
        Ok(start.timestamp().as_millisecond())
    }
}

/// Returns the datetime in `tz` for the given epoch milliseconds.
///
/// This is the only place raw milliseconds become datetimes, so negative
/// values are rejected here for every caller.
pub(crate) fn zoned_at(tz: &TimeZone, millis: i64) -> Result<Zoned> {
    if millis < 0 {
        return Err(Error::invalid_timestamp(
            millis,
            "timestamps before the Unix epoch are not supported",
        ));
    }
    let ts = Timestamp::from_millisecond(millis)
        .map_err(|err| Error::invalid_timestamp(millis, err))?;
    Ok(ts.to_zoned(tz.clone()))
}
