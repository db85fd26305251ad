use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser;

use tick::cli::Cli;

fn main() -> ExitCode {
    tick::logging::init();
    let cli = Cli::parse();

    match cli.run() {
        Ok(out) => {
            // Warnings bracket stdout so they survive head/tail pipelines.
            for warning in &out.warnings {
                eprintln!("warning: {warning}");
            }
            print!("{}", out.stdout);
            let _ = std::io::stdout().flush();
            for warning in &out.warnings {
                eprintln!("warning: {warning}");
            }
            if out.has_warnings() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
