mod cli;
mod logging;
mod session;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = cli::Args::parse();
    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
