use {
    anyhow::Context,
    bstr::{BString, ByteSlice, ByteVec},
};

use crate::{
    args::{Configurable, Usage},
    input::DueArg,
    parse,
};

/// The due dates a command operates on.
///
/// Every remaining positional argument is taken as a due date. When there
/// are none, due dates are read from stdin instead, one per line, which lets
/// the output of one `nextdue` command feed into another.
#[derive(Clone, Debug, Default)]
pub struct DueDates {
    given: Vec<BString>,
}

impl DueDates {
    pub const USAGE_ARG: Usage = Usage::arg(
        "<due>",
        "One or more due dates, or read from stdin.",
        r#"
One or more due dates. When none are given, due dates are read from stdin,
one per line.

A due date may be given in any of the following ways:

A civil date like `2024-07-22`. This creates a due date with no time of day.

A civil datetime like `2024-07-22T09:00` or `2024-07-22 09:00`, which is
interpreted in the system time zone. This creates a due date with a time of
day.

An RFC 3339 timestamp like `2024-07-22T13:00Z` or an RFC 9557 timestamp like
`2024-07-22T09:00-04:00[America/New_York]`. These are converted to the system
time zone.

Milliseconds since the Unix epoch, prefixed with an `@`, e.g.,
`@1721653200000`.

The special values `now`, `today` and `tomorrow`. Only `now` carries a time
of day.
"#,
    );

    /// Calls `f` on each due date in order, until it returns false or fails.
    ///
    /// Blank lines on stdin are skipped. Errors for due dates read from stdin
    /// say which line they came from.
    pub fn try_map(
        self,
        mut f: impl FnMut(DueArg) -> anyhow::Result<bool>,
    ) -> anyhow::Result<()> {
        if self.given.is_empty() {
            let stdin = std::io::stdin().lock();
            return parse::each_line(stdin, |line| {
                if line.is_blank() {
                    return Ok(true);
                }
                let number = line.number();
                parse_due(line.content())
                    .and_then(|due| f(due))
                    .with_context(|| format!("line {number} of <stdin>"))
            });
        }
        for raw in self.given.iter() {
            if !f(parse_due(raw)?)? {
                break;
            }
        }
        Ok(())
    }
}

impl Configurable for DueDates {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        let lexopt::Arg::Value(ref mut v) = *arg else { return Ok(false) };
        let raw = Vec::from_os_string(std::mem::take(v)).map_err(|v| {
            anyhow::anyhow!(
                "nextdue requires due dates to be valid UTF-8 on this \
                 platform, but {v:?} is not",
            )
        })?;
        self.given.push(BString::from(raw));
        Ok(true)
    }
}

fn parse_due(raw: &[u8]) -> anyhow::Result<DueArg> {
    DueArg::from_bytes(raw)
        .with_context(|| format!("invalid due date `{}`", raw.as_bstr()))
}
