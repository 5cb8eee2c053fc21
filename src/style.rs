use std::{fmt::Display, io::IsTerminal, sync::LazyLock};

use anstyle::{AnsiColor, Color, Style};

const TIMESTAMP: Style =
    Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));
const ERROR: Style =
    Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red)));
const WARN: Style =
    Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const QUIET: Style = Style::new().dimmed();

/// Colors for the parts of a log line.
///
/// Colors are only used when stderr is a terminal, `NO_COLOR` is unset or
/// empty and `TERM` isn't `dumb`.
#[derive(Clone, Copy, Debug)]
pub struct LogStyle {
    colors: bool,
}

impl LogStyle {
    pub fn stderr() -> LogStyle {
        static COLORS: LazyLock<bool> = LazyLock::new(|| {
            let no_color =
                std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
            let dumb = std::env::var_os("TERM").is_some_and(|v| v == "dumb");
            std::io::stderr().is_terminal() && !no_color && !dumb
        });
        LogStyle { colors: *COLORS }
    }

    pub fn timestamp<T: Display>(self, data: T) -> Painted<T> {
        self.paint(TIMESTAMP, data)
    }

    pub fn level(self, level: log::Level) -> Painted<log::Level> {
        let style = match level {
            log::Level::Error => ERROR,
            log::Level::Warn => WARN,
            _ => QUIET,
        };
        self.paint(style, level)
    }

    fn paint<T>(self, style: Style, data: T) -> Painted<T> {
        let style = if self.colors { style } else { Style::new() };
        Painted { style, data }
    }
}

/// Data rendered between the escapes of its style. A plain style renders
/// no escapes at all.
#[derive(Debug)]
pub struct Painted<T> {
    style: Style,
    data: T,
}

impl<T: Display> Display for Painted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.style.render(),
            self.data,
            self.style.render_reset(),
        )
    }
}
