//! fpipe - Command-line driver for frontpipe build tasks

use std::process::ExitCode;

use frontpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
