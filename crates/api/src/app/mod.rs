//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: business rules over the store
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: extractors that reject with `errors.rs` bodies

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use profilehub_auth::Hs256Jwt;
use profilehub_infra::{Settings, Store};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// The subset of [`Settings`] the router needs.
#[derive(Clone)]
pub struct AppConfig {
    pub api_v1_str: String,
    /// Mount `/private/users/` (local environment only).
    pub mount_private: bool,
    pub secret_key: String,
    pub token_ttl: chrono::Duration,
}

impl AppConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_v1_str: settings.api_v1_str.clone(),
            mount_private: settings.environment.is_local(),
            secret_key: settings.secret_key.clone(),
            token_ttl: settings.access_token_ttl(),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: AppConfig, store: Store) -> Router {
    let jwt = Arc::new(Hs256Jwt::new(config.secret_key.as_bytes(), config.token_ttl));
    let auth_state = middleware::AuthState {
        jwt: jwt.clone(),
        store: store.clone(),
    };

    let services = Arc::new(services::AppServices::new(store, jwt));

    // Protected routes: require a valid bearer token for an active user.
    let protected = routes::protected().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let api = routes::public(config.mount_private)
        .merge(protected)
        .layer(Extension(services));

    let router = Router::new().route("/health", get(routes::system::health));
    let router = if config.api_v1_str.is_empty() {
        router.merge(api)
    } else {
        router.nest(&config.api_v1_str, api)
    };

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
