use {
    anyhow::Context,
    bstr::ByteSlice,
    jiff::{Timestamp, Zoned, fmt::temporal::DateTimeParser},
    nextdue::{Codec, DueDate, Precision},
};

static PARSER: DateTimeParser = DateTimeParser::new();

/// A due date as written by an end user, before it is encoded.
///
/// Every due date is resolved in the time zone of "now." That is, an RFC
/// 9557 timestamp in some other zone is converted to the system time zone
/// as the same instant.
#[derive(Clone, Debug)]
pub struct DueArg {
    zdt: Zoned,
    precision: Precision,
}

impl DueArg {
    /// Parse a due date relative to the given "now."
    pub fn parse_relative(now: &Zoned, s: &[u8]) -> anyhow::Result<DueArg> {
        let s = s.trim();
        anyhow::ensure!(
            !s.is_empty(),
            "an empty string is not a valid due date",
        );
        let tz = now.time_zone().clone();
        match s {
            b"now" => return Ok(DueArg::timed(now.clone())),
            b"today" => return Ok(DueArg::dated(now.start_of_day()?)),
            b"tomorrow" => {
                return Ok(DueArg::dated(now.tomorrow()?.start_of_day()?));
            }
            _ => {}
        }
        if let Some(millis) = s.strip_prefix(b"@") {
            let millis: i64 = millis.to_str()?.parse().with_context(|| {
                format!("invalid epoch milliseconds `{}`", millis.as_bstr())
            })?;
            let ts = Timestamp::from_millisecond(millis)?;
            return Ok(DueArg::timed(ts.to_zoned(tz)));
        }
        if s.contains_str("[") {
            let zdt = PARSER.parse_zoned(s)?;
            return Ok(DueArg::timed(zdt.with_time_zone(tz)));
        }
        if let Ok(ts) = PARSER.parse_timestamp(s) {
            return Ok(DueArg::timed(ts.to_zoned(tz)));
        }
        if !s.contains_str("T") && !s.contains_str("t") && !s.contains_str(" ")
        {
            let date = PARSER.parse_date(s)?;
            return Ok(DueArg::dated(date.to_zoned(tz)?));
        }
        let dt = PARSER.parse_datetime(s)?;
        Ok(DueArg::timed(dt.to_zoned(tz)?))
    }

    /// Parse a due date relative to the current time.
    pub fn from_bytes(s: &[u8]) -> anyhow::Result<DueArg> {
        DueArg::parse_relative(&crate::NOW, s)
    }

    fn timed(zdt: Zoned) -> DueArg {
        DueArg { zdt, precision: Precision::DateAndTime }
    }

    fn dated(zdt: Zoned) -> DueArg {
        DueArg { zdt, precision: Precision::DateOnly }
    }

    /// Overrides the precision inferred from how this due date was written.
    pub fn with_precision(self, precision: Precision) -> DueArg {
        DueArg { precision, ..self }
    }

    /// Encodes this due date with the codec given.
    pub fn to_due(&self, codec: &Codec) -> anyhow::Result<DueDate> {
        Ok(codec.encode_zoned(&self.zdt, self.precision)?)
    }
}

impl std::str::FromStr for DueArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<DueArg> {
        DueArg::from_bytes(s.as_bytes())
    }
}
