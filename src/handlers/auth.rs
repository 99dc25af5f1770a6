//! Register and login.

use crate::auth::{self, LoginRequest, LoginResponse, RegisterResponse};
use crate::case::keys_to_snake_case;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::Value;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<RegisterResponse>, AppError> {
    let Value::Object(body) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    let body = keys_to_snake_case(body);
    let resp = auth::register(state.users.as_ref(), &state.hasher, &state.tokens, &body).await?;
    Ok(Json(resp))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let resp = auth::login(state.users.as_ref(), &state.hasher, &state.tokens, &req).await?;
    Ok(Json(resp))
}
