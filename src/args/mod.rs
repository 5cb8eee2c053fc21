use std::{
    fmt::{Debug, Display, Write},
    str::FromStr,
    sync::LazyLock,
};

use {
    anyhow::Context,
    lexopt::{Arg, Parser, ValueExt},
    regex::Regex,
};

pub mod flags;
pub mod positional;

/// A group of command line arguments that some command understands.
///
/// A command splits its arguments among a handful of these. `nextdue next`,
/// for example, hands every argument first to the recurrence rule, then to
/// its own flags and finally to the list of due dates. The first group that
/// claims an argument wins.
pub trait Configurable: Debug {
    /// Returns true when `arg` was claimed by this group.
    fn configure(
        &mut self,
        p: &mut Parser,
        arg: &mut Arg,
    ) -> anyhow::Result<bool>;

    /// Docs for everything `configure` claims.
    fn usage(&self) -> &[Usage] {
        &[]
    }
}

/// Hands every remaining argument in `p` to the first target that claims it.
///
/// `-h`, `--help` and `--version` never reach the targets. They are answered
/// by returning a [`Help`] or [`Version`] error, where help is rendered from
/// the `usage` template of the command.
pub fn configure(
    p: &mut Parser,
    usage: &str,
    targets: &mut [&mut dyn Configurable],
) -> anyhow::Result<()> {
    while let Some(arg) = p.next()? {
        let long: String;
        let mut arg = match arg {
            Arg::Short('h') => {
                return Err(Help::render(usage, Detail::Brief, targets).into());
            }
            Arg::Long("help") => {
                return Err(Help::render(usage, Detail::Full, targets).into());
            }
            Arg::Long("version") => return Err(Version.into()),
            // Owning the name frees `p` for the targets to pull values.
            Arg::Long(name) => {
                long = name.to_string();
                Arg::Long(&long)
            }
            Arg::Short(c) => Arg::Short(c),
            Arg::Value(v) => Arg::Value(v),
        };
        let mut claimed = false;
        for target in targets.iter_mut() {
            if target.configure(p, &mut arg)? {
                claimed = true;
                break;
            }
        }
        if !claimed {
            return Err(arg.unexpected().into());
        }
    }
    Ok(())
}

/// Returns the name of the subcommand to run.
///
/// When no subcommand is given at all, the top-level usage becomes the
/// error.
pub fn next_as_command(usage: &str, p: &mut Parser) -> anyhow::Result<String> {
    let usage = usage.trim();
    match p.next()? {
        None => anyhow::bail!("{usage}"),
        Some(Arg::Value(name)) => Ok(name.string()?),
        Some(Arg::Short('h') | Arg::Long("help")) => {
            Err(Help(usage.to_string()).into())
        }
        Some(Arg::Long("version")) => Err(Version.into()),
        Some(arg) => Err(arg.unexpected().into()),
    }
}

/// Parses the value of `flag` as a `T`, naming the flag in any error.
pub fn parse<T>(p: &mut Parser, flag: &'static str) -> anyhow::Result<T>
where
    T: FromStr,
    // Not `std::error::Error`, since most of our `FromStr` impls return
    // `anyhow::Error`.
    T::Err: Display + Debug + Send + Sync + 'static,
{
    let value = p.value().context(flag)?;
    let value = value
        .into_string()
        .map_err(lexopt::Error::NonUnicodeValue)
        .context(flag)?;
    value.parse().map_err(|err| anyhow::Error::msg(err).context(flag))
}

/// Documentation for a single flag or positional argument.
#[derive(Clone, Copy, Debug)]
pub struct Usage {
    /// Flags are optional and listed under OPTIONS. Everything else is
    /// positional and listed in the order it's given.
    pub flag: bool,
    /// How the flag or argument is written, e.g., `-n/--count <number>`.
    pub format: &'static str,
    /// A one line description, shown by `-h`.
    pub short: &'static str,
    /// Paragraphs separated by blank lines, shown by `--help`.
    pub long: &'static str,
}

impl Usage {
    pub const fn flag(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { flag: true, format, short, long }
    }

    pub const fn arg(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { flag: false, format, short, long }
    }

    /// Flags are listed by their long name, ignoring dashes and any short
    /// alias, so `-n/--count` sorts before `--date-only`.
    fn sort_key(&self) -> &'static str {
        self.format.rsplit_once("--").map_or(self.format, |(_, long)| long)
    }

    fn table(usages: &[Usage], detail: Detail) -> String {
        match detail {
            Detail::Brief => Usage::brief(usages),
            Detail::Full => Usage::full(usages),
        }
    }

    /// One aligned line per usage: the format, then the short description.
    fn brief(usages: &[Usage]) -> String {
        let width = usages.iter().map(|u| u.format.len()).max().unwrap_or(0);
        let mut out = String::new();
        for usage in usages {
            writeln!(
                out,
                "    {:width$}  {}",
                usage.format,
                usage.short,
                width = width,
            )
            .unwrap();
        }
        out
    }

    /// Each usage's format on its own line, followed by its long description
    /// wrapped and indented beneath it.
    fn full(usages: &[Usage]) -> String {
        let wrap = textwrap::Options::new(79)
            .initial_indent("        ")
            .subsequent_indent("        ");
        let mut blocks = vec![];
        for usage in usages {
            let mut block = format!("    {}\n", usage.format);
            let paragraphs = usage
                .long
                .trim()
                .split("\n\n")
                .map(|para| textwrap::fill(&para.replace('\n', " "), &wrap))
                .collect::<Vec<String>>();
            block.push_str(&paragraphs.join("\n\n"));
            block.push('\n');
            blocks.push(block);
        }
        blocks.join("\n")
    }
}

/// How much of a command's documentation to show.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Detail {
    /// `-h`: one line per flag and no `%snip-start%` sections.
    Brief,
    /// `--help`: everything.
    Full,
}

impl Detail {
    /// Drops or keeps the `%snip-start%`/`%snip-end%` sections of a usage
    /// template. The marker lines themselves never survive.
    fn snip(self, template: &str) -> String {
        static SECTIONS: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?m)^\s*%snip-start%\p{any}*?%snip-end%\s*$").unwrap()
        });
        static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?m)^\s*%snip-(start|end)%\s*$").unwrap()
        });
        let re = match self {
            Detail::Brief => &*SECTIONS,
            Detail::Full => &*MARKERS,
        };
        re.replace_all(template, "").into_owned()
    }
}

/// A rendered help message, carried as an error so that it unwinds out of
/// argument parsing. `main` prints it to stdout and exits successfully.
#[derive(Debug)]
pub struct Help(String);

impl Help {
    const USAGE: Usage = Usage::flag(
        "-h/--help",
        "Show help. Use --help for the complete docs.",
        r#"
Show help.

The short flag, -h, shows a summary with one line for each flag and argument.
The long flag, --help, shows the complete docs, including more examples.
"#,
    );

    /// Fills in the `%args%` and `%flags%` sections of a command's usage
    /// template from the docs of its targets.
    fn render(
        template: &str,
        detail: Detail,
        targets: &[&mut dyn Configurable],
    ) -> Help {
        let mut args = vec![];
        let mut flags = vec![Help::USAGE, Version::USAGE];
        for &usage in targets.iter().flat_map(|t| t.usage()) {
            if usage.flag {
                flags.push(usage);
            } else {
                args.push(usage);
            }
        }
        flags.sort_by_key(Usage::sort_key);
        let text = detail
            .snip(template)
            .replace("%args%", &Usage::table(&args, detail))
            .replace("%flags%", &Usage::table(&flags, detail));
        Help(text.trim().to_string())
    }
}

impl std::fmt::Display for Help {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Help {}

/// Like [`Help`], but for `--version`.
#[derive(Debug)]
pub struct Version;

impl Version {
    const USAGE: Usage = Usage::flag(
        "--version",
        "Show the version of nextdue.",
        r#"
Show the version of nextdue.
"#,
    );
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "nextdue {}", env!("CARGO_PKG_VERSION"))
    }
}

impl std::error::Error for Version {}
