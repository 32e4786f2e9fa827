//! # Facetry HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Instance, module and event counts
//! - `POST /instances` - Create a root instance
//! - `GET /instances/{id}` - Owner, parent and ancestors
//! - `POST /instances/{id}/clone` - Clone an instance
//! - `POST /instances/{id}/dispatch` - Route a call
//! - `POST /instances/{id}/cut` - Apply a cut batch
//! - `POST /instances/{id}/interfaces` - Toggle interface support
//! - `GET /instances/{id}/interfaces/{iid}` - `supportsInterface`
//! - `GET /instances/{id}/resolve/{selector}` - Traced resolution
//! - `GET /instances/{id}/facets` - Local facet table
//! - `GET /modules` - Deployed modules
//! - `GET /events` - Event log (`?instance=N` filters)
//! - `POST /export` - Binary snapshot, base64
//! - `GET /hash` - BLAKE3 hash of the snapshot
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `FACETRY_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `FACETRY_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `FACETRY_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `facetry::api::*`)
pub use handlers::{
    clone_handler, create_instance_handler, cut_handler, dispatch_handler, events_handler,
    export_handler, facets_handler, hash_handler, health_handler, instance_handler,
    modules_handler, resolve_handler, set_interfaces_handler, status_handler,
    supports_interface_handler,
};
pub use types::{
    ApiError, CloneRequest, CreateInstanceRequest, CreatedResponse, CutJson, CutRequest,
    CutResponse, DispatchRequest, DispatchResponse, ErrorResponse, EventJson, EventsQuery,
    EventsResponse, ExportResponse, FacetJson, FacetsResponse, HashResponse, HealthResponse,
    InstanceResponse, InterfacesRequest, InterfacesResponse, ModuleJson, ModulesResponse,
    ResolveResponse, StatusResponse, SupportsInterfaceResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use facetry_core::{RegistryError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit; comfortably above the largest cut batch.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the registry session.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Origins allowed when `FACETRY_CORS_ORIGINS` is unset or unusable.
const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// CORS from `FACETRY_CORS_ORIGINS`: `*` allows everything, a comma-separated
/// list allows those origins, anything else falls back to localhost.
fn build_cors_layer() -> CorsLayer {
    let setting = std::env::var("FACETRY_CORS_ORIGINS").ok();
    if setting.as_deref() == Some("*") {
        tracing::warn!("CORS: all origins allowed (FACETRY_CORS_ORIGINS=*)");
        return CorsLayer::permissive();
    }

    let mut origins = setting.as_deref().map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        origins = parse_origins(&LOCAL_ORIGINS.join(","));
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "CORS: ignoring invalid origin");
                None
            }
        })
        .collect()
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - global token bucket (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set FACETRY_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/instances", post(handlers::create_instance_handler))
        .route("/instances/{id}", get(handlers::instance_handler))
        .route("/instances/{id}/clone", post(handlers::clone_handler))
        .route("/instances/{id}/dispatch", post(handlers::dispatch_handler))
        .route("/instances/{id}/cut", post(handlers::cut_handler))
        .route(
            "/instances/{id}/interfaces",
            post(handlers::set_interfaces_handler),
        )
        .route(
            "/instances/{id}/interfaces/{iid}",
            get(handlers::supports_interface_handler),
        )
        .route(
            "/instances/{id}/resolve/{selector}",
            get(handlers::resolve_handler),
        )
        .route("/instances/{id}/facets", get(handlers::facets_handler))
        .route("/modules", get(handlers::modules_handler))
        .route("/events", get(handlers::events_handler))
        .route("/export", post(handlers::export_handler))
        .route("/hash", get(handlers::hash_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(addr: &str, session: Session) -> Result<(), RegistryError> {
    let state = AppState::new(session);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RegistryError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Facetry HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RegistryError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
