//! Support Gateway Server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p support-gateway
//! ```
//!
//! Configuration is loaded from environment variables (and `.env` if present).

use support_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        store = ?config.store,
        address = %config.gateway.address(),
        "Configuration loaded"
    );

    // Run the gateway server
    if let Err(e) = support_gateway::run(config).await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}
