use clap::Parser;
use picsort::cli::{Args, run_cli};
use picsort::output::OutputFormatter;
use picsort::CancelToken;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        OutputFormatter::warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    match run_cli(&args, cancel) {
        Ok(outcome) if outcome.interrupted() => ExitCode::from(130),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
