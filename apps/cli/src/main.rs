//! # Tally Entry Point
//!
//! ```text
//! tally [--db PATH] [--settings PATH] [--json] [-v] <command>
//!
//!   exit 0  success
//!   exit 1  database or internal failure
//!   exit 2  invalid input / not found (also clap usage errors)
//!   exit 3  refused: referenced rows, insufficient stock, business rule
//!   exit 4  settings or CSV file problem
//! ```

use std::process::ExitCode;

use clap::Parser;

use tally_cli::{init_tracing, run, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                match serde_json::to_string(&err) {
                    Ok(payload) => eprintln!("{}", payload),
                    Err(_) => eprintln!("{}", err.message),
                }
            } else {
                eprintln!("error: {}", err.message);
            }
            ExitCode::from(err.code.exit_code())
        }
    }
}
