//! Box Office - session and seat booking server
//!
//! Serves the booking engine over TCP until interrupted.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod state;

use config::Config;
use error::Result;
use state::AppState;

fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("boxoffice: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Box Office");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(&config, &state)) {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn serve(config: &Config, state: &AppState) -> Result<()> {
    let server =
        boxoffice_net::Server::start(config.listen_port, state.engine(), config.request_timeout())
            .await?;
    info!(addr = %server.addr(), "Accepting bookings");

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    info!("Shut down");
    Ok(())
}
