//! PostgreSQL-backed stores using the safe SQL builder.

use super::{EntityStore, Row, UserStore};
use crate::auth::UserRecord;
use crate::config::{ColumnType, ResolvedEntity};
use crate::error::{AppError, FieldErrors};
use crate::service::PageRequest;
use crate::sql::{self, unique_index_name, PgBindValue, QueryBuf};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryScalar};
use sqlx::{ConnectOptions, PgPool, Postgres, Row as _};
use std::str::FromStr;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    fn bind_all<'q>(q: &'q QueryBuf) -> Result<Query<'q, Postgres, PgArguments>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p)?);
        }
        Ok(query)
    }

    fn bind_scalar<'q, T>(q: &'q QueryBuf) -> Result<QueryScalar<'q, Postgres, T, PgArguments>, AppError>
    where
        T: Send + Unpin,
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, T>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p)?);
        }
        Ok(query)
    }

    async fn fetch_rows(&self, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        let rows = Self::bind_all(q)?.fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_json(entity, r)).collect()
    }

    async fn fetch_optional_row(&self, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        let row = Self::bind_all(q)?.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }

    async fn count(&self, q: &QueryBuf) -> Result<u64, AppError> {
        let n: i64 = Self::bind_scalar::<i64>(q)?.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }
}

/// Map constraint violations raised by the database to the same errors the pre-checks produce.
fn map_write_error(entity: &ResolvedEntity, e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        let constraint = db.constraint().unwrap_or_default();
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                if let Some(key) = entity
                    .unique
                    .iter()
                    .find(|u| unique_index_name(&entity.table_name, &u.column) == constraint)
                {
                    return AppError::Validation(FieldErrors::single(key.column.as_str(), key.message.as_str()));
                }
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                if let Some(r) = entity.references.iter().find(|r| constraint.contains(&r.column)) {
                    return AppError::Validation(FieldErrors::single(r.column.as_str(), r.not_found_message.as_str()));
                }
            }
            _ => {}
        }
    }
    AppError::Db(e)
}

fn row_to_json(entity: &ResolvedEntity, row: &PgRow) -> Result<Row, AppError> {
    let mut map = Row::new();
    for col in &entity.columns {
        let name = col.name.as_str();
        let v = match col.type_ {
            ColumnType::Text => row
                .try_get::<Option<String>, _>(name)?
                .map(Value::String),
            ColumnType::Uuid => row
                .try_get::<Option<uuid::Uuid>, _>(name)?
                .map(|u| Value::String(u.to_string())),
            ColumnType::Timestamptz => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Micros, true))),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(map)
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_by_id(&self, entity: &ResolvedEntity, id: &str) -> Result<Option<Row>, AppError> {
        let mut q = sql::select_by_id(entity);
        q.params.push(Value::String(id.to_string()));
        self.fetch_optional_row(entity, &q).await
    }

    async fn find_by_ids(&self, entity: &ResolvedEntity, ids: &[String]) -> Result<Vec<Row>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = ids.iter().map(|s| Value::String(s.clone())).collect();
        let q = sql::select_by_ids(entity, &values);
        self.fetch_rows(entity, &q).await
    }

    async fn search(&self, entity: &ResolvedEntity, page: &PageRequest) -> Result<(Vec<Row>, u64), AppError> {
        let term = page.search_term.as_deref();
        let total = self.count(&sql::count_matching(entity, term)).await?;
        let q = sql::select_page(entity, term, page.limit(), page.offset());
        let rows = self.fetch_rows(entity, &q).await?;
        Ok((rows, total))
    }

    async fn exists_by_column(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let q = sql::exists_ci(entity, column, value, exclude_id);
        Ok(Self::bind_scalar::<bool>(&q)?.fetch_one(&self.pool).await?)
    }

    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let q = sql::insert(entity, row);
        let stored = Self::bind_all(&q)?
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(entity, e))?;
        row_to_json(entity, &stored)
    }

    async fn update(&self, entity: &ResolvedEntity, id: &str, row: &Row) -> Result<Option<Row>, AppError> {
        let q = sql::update(entity, id, row);
        let stored = Self::bind_all(&q)?
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(entity, e))?;
        stored.map(|r| row_to_json(entity, &r)).transpose()
    }

    async fn delete(&self, entity: &ResolvedEntity, id: &str) -> Result<bool, AppError> {
        let mut q = sql::delete(entity);
        q.params.push(Value::String(id.to_string()));
        let result = Self::bind_all(&q)?.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_referencing(&self, entity: &ResolvedEntity, column: &str, id: &str) -> Result<u64, AppError> {
        self.count(&sql::count_referencing(entity, column, id)).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let sql = "SELECT id, email, password_hash, first_name, last_name, created_at, updated_at \
                   FROM users WHERE lower(email) = lower($1)";
        tracing::debug!(sql = %sql, "query");
        let user = sqlx::query_as::<_, UserRecord>(sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let sql = "INSERT INTO users (id, email, password_hash, first_name, last_name, created_at, updated_at) \
                   VALUES ($1, $2, $3, $4, $5, $6, $7)";
        tracing::debug!(sql = %sql, email = %user.email, "query");
        sqlx::query(sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .and_then(|d| d.code())
                    .is_some_and(|c| c == UNIQUE_VIOLATION);
                if duplicate {
                    AppError::Validation(FieldErrors::single("email", "a user with this email already exists"))
                } else {
                    AppError::Db(e)
                }
            })?;
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_name_from_url() {
        let (admin, name) = parse_db_name_from_url("postgres://u:p@localhost:5432/admin_db?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "admin_db");
    }
}
