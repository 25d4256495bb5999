//! Runs the agent behind the managed runtime's HTTP contract.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;
use std::sync::Arc;

use tally_agent::runtime::{self, DEFAULT_ADDR};
use tally_agent::{Config, Invoker, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match telemetry::init(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to set up logging: {err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("resolved configuration: {config:?}");
    if config.api_key.is_none() {
        warn!("AWS_BEARER_TOKEN_BEDROCK is not set, invocations will fail");
    }

    let invoker = Arc::new(Invoker::from_config(&config));
    if let Err(err) = runtime::serve(DEFAULT_ADDR, invoker).await {
        error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
