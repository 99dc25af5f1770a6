//! Entity storage behind a repository trait: PostgreSQL in production, in-memory for tests and local runs.
//!
//! Rows travel as JSON objects keyed by snake_case column name. Ids are hyphenated lowercase
//! UUID strings and timestamps are RFC 3339 strings, whichever backend produced them.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::auth::UserRecord;
use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::service::PageRequest;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Persistence operations the CRUD service needs. Validation, timestamps and ids are the
/// caller's job; the store persists what it is given.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_by_id(&self, entity: &ResolvedEntity, id: &str) -> Result<Option<Row>, AppError>;

    /// Rows whose id is in `ids`, in no particular order. Unknown ids are skipped.
    async fn find_by_ids(&self, entity: &ResolvedEntity, ids: &[String]) -> Result<Vec<Row>, AppError>;

    /// One page of rows matching the search term, plus the total number of matching rows.
    async fn search(&self, entity: &ResolvedEntity, page: &PageRequest) -> Result<(Vec<Row>, u64), AppError>;

    /// Case-insensitive existence check on `column`, ignoring the row `exclude_id`.
    async fn exists_by_column(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, AppError>;

    /// Insert a fully-formed row and return it as stored.
    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError>;

    /// Replace the writable columns (and updated_at) of row `id`. None when the row is gone.
    async fn update(&self, entity: &ResolvedEntity, id: &str, row: &Row) -> Result<Option<Row>, AppError>;

    /// Delete by id. Returns true if a row was deleted.
    async fn delete(&self, entity: &ResolvedEntity, id: &str) -> Result<bool, AppError>;

    /// Number of rows whose `column` holds `id`.
    async fn count_referencing(&self, entity: &ResolvedEntity, column: &str, id: &str) -> Result<u64, AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Account storage for the auth endpoints and bootstrap.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup by login email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError>;

    async fn count_users(&self) -> Result<u64, AppError>;
}
