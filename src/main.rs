//! Chat-bridge binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use chat_bridge::api::{serve_with_state, AppState};
use chat_bridge::protocol::sim::SimulatedClient;
use chat_bridge::store::{CredentialStore, Database};
use chat_bridge::{cli, logging, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_with_filter(config.log_filter());
    info!("chat-bridge v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server_config = config.to_server_config()?;
    let logged_out = config.logged_out_policy()?;

    let db = Database::open(&config.store.path)?;
    let store = CredentialStore::new(db);

    // The simulated client stands in for the production protocol library;
    // swap in a real `ChatClient` implementation to go live.
    let state = AppState::new(
        Arc::new(SimulatedClient::default()),
        store,
        config.reconnect_policy(),
        logged_out,
        config.bulk_config(),
    );

    let restored = state.supervisor.restore_all()?;
    info!(restored, "session restore complete");

    serve_with_state(server_config, state).await?;
    Ok(())
}
