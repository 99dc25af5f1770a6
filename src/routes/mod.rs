//! Router assembly.

mod auth;
mod common;
mod entity;

pub use auth::auth_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Full application: common routes at the root, auth and entities under `/api`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth_routes(state.clone()))
        .merge(entity_routes(state.clone()));
    Router::new()
        .merge(common_routes(state))
        .nest("/api", api)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
}
