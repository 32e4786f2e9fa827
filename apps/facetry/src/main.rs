//! # Facetry - Dispatch Registry Server
//!
//! The main binary for the Facetry dispatch registry.
//!
//! Startup:
//! 1. Load `facetry.toml` (or `FACETRY_CONFIG`) and apply env overrides
//! 2. Deploy the configured facet modules
//! 3. Open the session (redb if a database path is set) and bootstrap
//! 4. Serve the HTTP API until Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! FACETRY_PORT=8080 FACETRY_DB=facetry.redb facetry
//! FACETRY_LOG=facetry=debug FACETRY_LOG_FORMAT=json facetry
//! ```

use facetry::{api, config::Config};
use facetry_core::RegistryError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `FACETRY_LOG` wins over `RUST_LOG`; `FACETRY_LOG_FORMAT=json` switches
/// to machine-parseable output.
fn init_tracing() {
    let log_format = std::env::var("FACETRY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = EnvFilter::try_from_env("FACETRY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "facetry=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

async fn run() -> Result<(), RegistryError> {
    let config = Config::load()?;
    let session = config.open_session()?;

    let registry = session.registry();
    tracing::info!(
        modules = registry.module_count(),
        instances = registry.instance_count(),
        persistent = session.is_persistent(),
        "Facetry v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    api::run_server(&config.bind_addr(), session).await
}
