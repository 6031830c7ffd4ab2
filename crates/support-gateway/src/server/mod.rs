//! Gateway server setup
//!
//! Provides the main WebSocket server configuration and routes.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use support_common::{AppConfig, AppError, JwtService, StoreBackend};
use support_core::{EventPublisher, SnowflakeGenerator};
use support_db::{MemoryStore, PoolConfig, Repositories};
use support_service::ServiceContext;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::connection::{RegistryStats, SessionRegistry};

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/health/stats", get(health_stats))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Connection counters
async fn health_stats(State(state): State<GatewayState>) -> Json<RegistryStats> {
    Json(state.registry().stats())
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured store and create `GatewayState`
pub async fn create_gateway_state(config: &AppConfig) -> Result<GatewayState, AppError> {
    let repositories = match config.store {
        StoreBackend::Postgres => {
            let database = config.database.as_ref().ok_or_else(|| {
                AppError::Config("DATABASE_URL is required for the postgres store".to_string())
            })?;

            tracing::info!("Connecting to PostgreSQL...");
            let pool = support_db::create_pool(&PoolConfig::from(database))
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            support_db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("PostgreSQL connection established");

            Repositories::postgres(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; conversations are lost on restart");
            Repositories::memory(Arc::new(MemoryStore::new()))
        }
    };

    Ok(create_gateway_state_with_repositories(config, repositories))
}

/// Wire the registry, services and the given store adapters together
pub fn create_gateway_state_with_repositories(
    config: &AppConfig,
    repositories: Repositories,
) -> GatewayState {
    let registry = SessionRegistry::new_shared();
    let publisher: Arc<dyn EventPublisher> = registry.clone();

    let service_context = ServiceContext::new(
        repositories,
        publisher,
        Arc::new(JwtService::new(
            &config.jwt.secret,
            config.jwt.access_token_expiry,
        )),
        Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id)),
        config.chat.clone(),
    );

    GatewayState::new(service_context, registry)
}

/// Serve `state` on an already bound listener
pub async fn run_server(listener: TcpListener, state: GatewayState) -> Result<(), AppError> {
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::Config(format!("Failed to read listener address: {e}")))?;
    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, create_app(state))
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();

    // Create gateway state
    let state = create_gateway_state(&config).await?;

    tracing::info!("Starting Gateway server on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    run_server(listener, state).await
}
