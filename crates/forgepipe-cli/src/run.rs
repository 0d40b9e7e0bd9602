//! Parses arguments, builds a runtime, dispatches to a command handler, and
//! turns any error into a process exit code. All output, including errors,
//! is handled here or in `commands`; `main.rs` only exits with the code.

use clap::Parser;

use crate::args::{Cli, Commands};
use crate::client::{Client, ClientError};
use crate::commands;

pub fn run() -> i32 {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return 1;
        }
    };

    let result = rt.block_on(dispatch(cli));

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        return exit_code_for(&err);
    }
    0
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { host, port, work_dir } => commands::execute_serve(host, port, work_dir).await,
        Commands::Start { spec_path, tenant, user, project } => {
            let client = Client::new(cli.api_url);
            commands::execute_start(&client, &spec_path, &tenant, &user, &project).await
        }
        Commands::Status { build_id, json } => {
            let client = Client::new(cli.api_url);
            commands::execute_status(&client, &build_id, json).await
        }
        Commands::List { json } => {
            let client = Client::new(cli.api_url);
            commands::execute_list(&client, json).await
        }
        Commands::Cancel { build_id } => {
            let client = Client::new(cli.api_url);
            commands::execute_cancel(&client, &build_id).await
        }
        Commands::Retry { build_id } => {
            let client = Client::new(cli.api_url);
            commands::execute_retry(&client, &build_id).await
        }
        Commands::RetryStage { build_id, from } => {
            let client = Client::new(cli.api_url);
            commands::execute_retry_stage(&client, &build_id, from).await
        }
        Commands::Watch { build_id } => {
            let client = Client::new(cli.api_url);
            commands::execute_watch(&client, &build_id).await
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Server { status, .. }) if status.as_u16() == 404 => 2,
        Some(ClientError::Server { .. }) => 3,
        Some(ClientError::Request { .. }) => 4,
        None => 1,
    }
}
