//! Admin API.
//!
//! Read-only views of target health plus manual taint overrides, all
//! behind a bearer token. Mounted only when `admin.enabled` is set.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::require_api_key;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/targets", get(get_targets))
        .route("/admin/targets/{name}/taint", post(taint_target))
        .route("/admin/targets/{name}/untaint", post(untaint_target))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}
