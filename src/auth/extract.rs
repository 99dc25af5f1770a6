//! Bearer token extraction for protected routes.

use super::Claims;
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

const BEARER_PREFIX: &str = "Bearer ";

/// The verified caller. Rejects with 401 when the `Authorization` header is missing,
/// not a bearer token, or fails verification.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(AuthUser(claims.clone()));
        }
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        let Some(token) = header.and_then(|h| h.strip_prefix(BEARER_PREFIX)).map(str::trim) else {
            tracing::warn!(path = %parts.uri.path(), "missing bearer token");
            return Err(AppError::Unauthorized("missing bearer token".into()));
        };
        match state.tokens.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                tracing::warn!(path = %parts.uri.path(), error = %e, "bearer token rejected");
                Err(e)
            }
        }
    }
}

/// Route layer: verifies the caller and leaves the claims in request extensions for handlers.
pub async fn require_bearer(AuthUser(claims): AuthUser, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(claims);
    next.run(req).await
}
