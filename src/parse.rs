use std::{ffi::OsStr, io::BufRead};

use bstr::{BStr, ByteSlice, io::BufReadExt};

/// Returns the bytes of a command line value.
///
/// Due dates and rules are ASCII, so on Unix any bytes are accepted and
/// rejected later by the parser with a better error. Elsewhere the value
/// must be valid UTF-8.
pub fn os_bytes(value: &OsStr) -> anyhow::Result<&[u8]> {
    <[u8]>::from_os_str(value).ok_or_else(|| {
        anyhow::anyhow!(
            "nextdue requires arguments to be valid UTF-8 on this platform, \
             but {value:?} is not",
        )
    })
}

/// Like [`os_bytes`], but for parsers that need a `&str`.
pub fn os_str(value: &OsStr) -> anyhow::Result<&str> {
    Ok(os_bytes(value)?.to_str()?)
}

/// A single line of line delimited input, without its terminator.
#[derive(Clone, Copy, Debug)]
pub struct Line<'a> {
    number: usize,
    content: &'a BStr,
}

impl<'a> Line<'a> {
    /// The line number, starting at 1.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn content(&self) -> &'a BStr {
        self.content
    }

    /// Blank lines are skipped by every command that reads lines.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Calls `f` on every line in `rdr` until it returns false or fails.
///
/// Both `\n` and `\r\n` terminate a line, and a final line without a
/// terminator is still given to `f`. Errors from `f` are returned as is,
/// while read errors are returned as `std::io::Error`.
pub fn each_line<R: BufRead>(
    mut rdr: R,
    mut f: impl FnMut(Line<'_>) -> anyhow::Result<bool>,
) -> anyhow::Result<()> {
    let mut number = 0;
    let mut failed = None;
    rdr.for_byte_line(|content| {
        number += 1;
        match f(Line { number, content: content.as_bstr() }) {
            Ok(more) => Ok(more),
            Err(err) => {
                failed = Some(err);
                Ok(false)
            }
        }
    })?;
    failed.map_or(Ok(()), Err)
}
