//! Entry point for the `btrmount` command-line client.
//!
//! All behaviour lives in [`btrmount_cli::run`]; the binary only wires the
//! process arguments and standard streams into it.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    btrmount_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
