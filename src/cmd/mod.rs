mod batch;
mod next;
mod seq;

const USAGE: &'static str = "\
A simple utility for computing when a recurring task is due next.

USAGE:
    nextdue <command> ...

COMMANDS:
    batch  Compute due dates for JSON task records
    next   Compute the next due date of a recurring task
    seq    Preview the upcoming schedule of a recurring task
";

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let cmd = crate::args::next_as_command(USAGE, p)?;
    match &*cmd {
        "batch" => batch::run(p),
        "next" => next::run(p),
        "seq" => seq::run(p),
        unk => anyhow::bail!("unrecognized command '{}'", unk),
    }
}
