//! The full taleforge HTTP surface: `/health` at the root, everything else
//! under `/api/v1`, wrapped in one middleware stack.
//!
//! `main.rs` and the integration tests both build their app here.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application [`Router`].
///
/// Layers are listed innermost first. A request passes CORS, gets its id,
/// is traced under that id, and has the id echoed on the response. Runs
/// and ledger calls are cut off after `request_timeout_secs`, and a panicking
/// handler becomes a 500.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS for the reader front end. Every route is a GET or a POST.
///
/// Panics at startup if a configured origin does not parse.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
