//! Entity CRUD routes. Handlers resolve the entity from the path segment, so one set of
//! routes serves every configured entity. All of them require a bearer token.

use crate::auth::require_bearer;
use crate::handlers::entity::{create, delete, dependencies, read, search, update};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(search).post(create))
        .route("/:path_segment/:id", get(read).put(update).delete(delete))
        .route("/:path_segment/:id/dependencies", get(dependencies))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}
