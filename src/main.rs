use clap::Parser;
use ezfetch::cli::{self, Args};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::run(Args::parse()).await
}
