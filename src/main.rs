//! shaderbuild - Command-line tool for compiling engine shaders

use std::process::ExitCode;

use shaderbuild::cli;

fn main() -> ExitCode {
    cli::run()
}
