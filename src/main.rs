use clap::Parser;
use dailytrade::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
