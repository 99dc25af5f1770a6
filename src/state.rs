//! Shared application state for all routes.

use crate::auth::{PasswordHasher, TokenIssuer};
use crate::config::ResolvedModel;
use crate::service::PageBounds;
use crate::store::{EntityStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub users: Arc<dyn UserStore>,
    pub model: Arc<ResolvedModel>,
    pub tokens: TokenIssuer,
    pub hasher: PasswordHasher,
    pub bounds: PageBounds,
}
