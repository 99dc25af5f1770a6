//! Entity CRUD handlers: search, create, read, update, delete, dependencies.

use crate::auth::AuthUser;
use crate::case::keys_to_snake_case;
use crate::config::{Operation, ResolvedEntity};
use crate::error::AppError;
use crate::response::{row_body, DeleteResponse, DependenciesResponse, PagedResponse};
use crate::service::{CrudService, DeleteOutcome, PageRequest, SearchParams};
use crate::state::AppState;
use crate::store::Row;
use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

fn resolve_entity<'s>(state: &'s AppState, path_segment: &str, op: Operation) -> Result<&'s ResolvedEntity, AppError> {
    let entity = state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity: {}", path_segment)))?;
    if !entity.allows(op) {
        return Err(AppError::NotFound(format!(
            "{} does not support {}",
            path_segment,
            op.as_str()
        )));
    }
    Ok(entity)
}

fn body_to_row(value: Value) -> Result<Row, AppError> {
    match value {
        Value::Object(m) => Ok(keys_to_snake_case(m)),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn service(state: &AppState) -> CrudService<'_> {
    CrudService::new(state.store.as_ref(), state.model.as_ref())
}

pub async fn search(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PagedResponse>, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Search)?;
    let page = PageRequest::from_params(&params, state.bounds);
    let result = service(&state).search(entity, &page).await?;
    Ok(Json(result.into()))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Create)?;
    let row = service(&state).create(entity, &body_to_row(body)?).await?;
    let id = row.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    tracing::debug!(entity = %entity.id, id = %id, by = %caller.sub, "create request served");
    let location = format!("/api/{}/{}", entity.path_segment, id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], row_body(row)).into_response())
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<Json<Row>, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Read)?;
    let row = service(&state).get(entity, &id).await?;
    Ok(row_body(row))
}

/// PUT: the path id is authoritative, an `id` in the body is ignored.
pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((path_segment, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Row>, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Update)?;
    let row = service(&state).update(entity, &id, &body_to_row(body)?).await?;
    tracing::debug!(entity = %entity.id, id = %id, by = %caller.sub, "update request served");
    Ok(row_body(row))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<DeleteResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Delete)?;
    let outcome = service(&state).delete(entity, &id).await?;
    tracing::debug!(entity = %entity.id, id = %id, by = %caller.sub, outcome = ?outcome, "delete request served");
    Ok(match outcome {
        DeleteOutcome::Deleted => DeleteResponse::deleted(&entity.label),
        DeleteOutcome::Blocked(deps) => DeleteResponse::blocked(&entity.label, deps),
    })
}

pub async fn dependencies(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<Json<DependenciesResponse>, AppError> {
    let entity = resolve_entity(&state, &path_segment, Operation::Read)?;
    let dependencies = service(&state).dependencies(entity, &id).await?;
    Ok(Json(DependenciesResponse {
        has_dependencies: !dependencies.is_empty(),
        dependencies,
    }))
}
