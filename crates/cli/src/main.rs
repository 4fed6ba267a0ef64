use std::process::ExitCode;

use clap::Parser;

use fitscheck_cli::run::{run, Args};

/// Verify that FITS files conform to the FITS Standard.
fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fitscheck: {e}");
            ExitCode::FAILURE
        }
    }
}
