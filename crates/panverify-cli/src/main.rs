use clap::Parser;
use panverify_cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    panverify_cli::run(Cli::parse()).await
}
