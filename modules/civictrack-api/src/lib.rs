//! HTTP surface of CivicTrack.

pub mod auth;
pub mod error;
pub mod jwt;
pub mod rest;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

use civictrack_common::Config;
use civictrack_engine::reporting::{MAX_IMAGES_PER_ISSUE, MAX_IMAGE_BYTES};
use civictrack_engine::CivicTrack;
use civictrack_store::UserStore;

use jwt::JwtService;

/// Room for a full set of images plus the text fields.
const MAX_BODY_BYTES: usize = MAX_IMAGES_PER_ISSUE * MAX_IMAGE_BYTES + 1024 * 1024;

pub struct AppState {
    pub core: CivicTrack,
    pub users: Arc<dyn UserStore>,
    pub jwt: JwtService,
    pub config: Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Health check
        .route("/health", get(|| async { "ok" }))
        // Issues
        .route("/api/issues", post(rest::issues::create_issue))
        .route("/api/issues/nearby", get(rest::issues::nearby_issues))
        .route("/api/issues/{id}", get(rest::issues::get_issue))
        .route("/api/issues/{id}/flag", post(rest::issues::flag_issue))
        // Admin
        .route("/api/admin/flags/issues", get(rest::admin::flagged_issues))
        .route("/api/admin/flags/issues/{id}/unflag", post(rest::admin::unflag_issue))
        .route("/api/admin/issues/{id}/status", post(rest::admin::set_issue_status))
        .route("/api/admin/users/{id}/ban", post(rest::admin::ban_user))
        .route("/api/admin/analytics", get(rest::admin::analytics))
        .with_state(state)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only (no query params, no IP)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
