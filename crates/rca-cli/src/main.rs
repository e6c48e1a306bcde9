//! `rca` - command-line front end for the RCA closed loop
//!
//! State lives in a JSON file (`--state`, default `rca-state.json`) that is
//! loaded before and saved after every mutating command.
//!
//! Exit codes:
//! - `0` success
//! - `1` internal, persistence or configuration failure
//! - `2` rejected request (unknown id, invalid input, closure gate not met)

use std::process::ExitCode;

use rca_core::WorkflowError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod render;

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::build().get_matches();
    let log_json = matches
        .subcommand()
        .is_some_and(|(_, args)| args.get_flag("log-json"));
    init_tracing(log_json);

    match commands::run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let rejected = err
                .downcast_ref::<WorkflowError>()
                .is_some_and(WorkflowError::is_client_error);
            if rejected {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
