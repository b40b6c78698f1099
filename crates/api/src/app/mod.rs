//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend selection and the engine behind it
//! - `routes/`: HTTP handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and input parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use pvz_auth::{Hs256Jwt, JwtIssuer};
use pvz_infra::{AppConfig, StoreError};

use crate::middleware;
use routes::system::MetricsHandle;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Connects to and migrates Postgres first when persistent storage is
/// configured.
pub async fn build_app(config: &AppConfig, metrics: MetricsHandle) -> Result<Router, StoreError> {
    let services = Arc::new(services::build_services(config).await?);
    tracing::info!(backend = services.backend(), "storage ready");
    let jwt = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes()).with_ttl(config.jwt_ttl));
    Ok(build_router(services, jwt, metrics))
}

/// Assemble routes and layers around already-built services.
pub fn build_router(services: Arc<services::AppServices>, jwt: Arc<Hs256Jwt>, metrics: MetricsHandle) -> Router {
    let auth_state = middleware::AuthState { jwt: jwt.clone() };
    let issuer: Arc<dyn JwtIssuer> = jwt;

    // Business routes: require a valid bearer token.
    let protected = routes::router()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .route("/dummyLogin", post(routes::auth::dummy_login))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .merge(protected)
        .layer(Extension(services))
        .layer(Extension(issuer))
        .layer(Extension(metrics))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::track_requests)))
}
