use std::process::ExitCode;

use clap::Parser;
use sls_dev::Cli;

fn main() -> ExitCode {
    sls_dev::run_command(Cli::parse())
}
