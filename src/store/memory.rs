//! In-process store with the same observable behavior as `PgStore`: case-insensitive sorting,
//! search and uniqueness. Backs the test suite and `STORE=memory`.

use super::{EntityStore, Row, UserStore};
use crate::auth::UserRecord;
use crate::config::{ResolvedEntity, PK_COLUMN, UPDATED_AT};
use crate::error::{AppError, FieldErrors};
use crate::service::PageRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn str_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn id_of(row: &Row) -> Option<&str> {
    str_field(row, PK_COLUMN)
}

fn matches_term(entity: &ResolvedEntity, row: &Row, term: Option<&str>) -> bool {
    match term {
        Some(t) if !entity.search_columns.is_empty() => entity
            .search_columns
            .iter()
            .filter_map(|c| str_field(row, c))
            .any(|v| v.to_lowercase().contains(t)),
        _ => true,
    }
}

/// Lowercased order column, then its exact bytes, then id.
fn compare_rows(entity: &ResolvedEntity, a: &Row, b: &Row) -> Ordering {
    fn order_key<'r>(entity: &ResolvedEntity, r: &'r Row) -> &'r str {
        str_field(r, &entity.order_by).unwrap_or("")
    }
    let key = |r| order_key(entity, r);
    key(a)
        .to_lowercase()
        .cmp(&key(b).to_lowercase())
        .then_with(|| key(a).cmp(key(b)))
        .then_with(|| id_of(a).unwrap_or("").cmp(id_of(b).unwrap_or("")))
}

/// Same outcome a unique index on lower(column) would produce.
fn check_unique(entity: &ResolvedEntity, rows: &[Row], candidate: &Row, exclude_id: Option<&str>) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    for key in &entity.unique {
        let Some(value) = str_field(candidate, &key.column) else {
            continue;
        };
        let lowered = value.to_lowercase();
        let taken = rows.iter().any(|r| {
            id_of(r) != exclude_id
                && str_field(r, &key.column).is_some_and(|v| v.to_lowercase() == lowered)
        });
        if taken {
            errors.add(key.column.as_str(), key.message.as_str());
        }
    }
    errors.into_result()
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_by_id(&self, entity: &ResolvedEntity, id: &str) -> Result<Option<Row>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&entity.table_name)
            .and_then(|rows| rows.iter().find(|r| id_of(r) == Some(id)))
            .cloned())
    }

    async fn find_by_ids(&self, entity: &ResolvedEntity, ids: &[String]) -> Result<Vec<Row>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&entity.table_name)
            .map(|rows| {
                rows.iter()
                    .filter(|r| id_of(r).is_some_and(|id| ids.iter().any(|x| x == id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search(&self, entity: &ResolvedEntity, page: &PageRequest) -> Result<(Vec<Row>, u64), AppError> {
        let tables = self.tables.read().await;
        let term = page.search_term.as_deref();
        let mut matching: Vec<&Row> = tables
            .get(&entity.table_name)
            .map(|rows| rows.iter().filter(|r| matches_term(entity, r, term)).collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| compare_rows(entity, a, b));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn exists_by_column(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        let lowered = value.to_lowercase();
        Ok(tables.get(&entity.table_name).is_some_and(|rows| {
            rows.iter().any(|r| {
                id_of(r) != exclude_id && str_field(r, column).is_some_and(|v| v.to_lowercase() == lowered)
            })
        }))
    }

    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(entity.table_name.clone()).or_default();
        check_unique(entity, rows, row, None)?;
        let stored: Row = entity
            .columns
            .iter()
            .map(|c| (c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null)))
            .collect();
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &ResolvedEntity, id: &str, row: &Row) -> Result<Option<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(entity.table_name.clone()).or_default();
        if !rows.iter().any(|r| id_of(r) == Some(id)) {
            return Ok(None);
        }
        check_unique(entity, rows, row, Some(id))?;
        let Some(existing) = rows.iter_mut().find(|r| id_of(r) == Some(id)) else {
            return Ok(None);
        };
        for c in &entity.columns {
            if c.writable || (c.name == UPDATED_AT && entity.has_updated_at) {
                existing.insert(c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null));
            }
        }
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, entity: &ResolvedEntity, id: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&entity.table_name) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| id_of(r) != Some(id));
        Ok(rows.len() < before)
    }

    async fn count_referencing(&self, entity: &ResolvedEntity, column: &str, id: &str) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&entity.table_name)
            .map(|rows| rows.iter().filter(|r| str_field(r, column) == Some(id)).count() as u64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Validation(FieldErrors::single(
                "email",
                "a user with this email already exists",
            )));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, AppError> {
        Ok(self.users.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResolvedModel};
    use crate::service::{PageBounds, SearchParams};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_config().unwrap()).unwrap()
    }

    fn product(id: &str, name: &str) -> Row {
        json!({"id": id, "name": name, "created_at": "2024-01-01T00:00:00.000000Z", "updated_at": null})
            .as_object()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn search_sorts_ignoring_case_and_pages() {
        let model = model();
        let products = model.entity_by_path("products").unwrap();
        let store = MemoryStore::new();
        for (i, name) in ["banana", "Apple", "cherry", "Zebra", "avocado"].iter().enumerate() {
            store.insert(products, &product(&format!("id-{i}"), name)).await.unwrap();
        }
        let params = SearchParams {
            search_term: None,
            page: Some(1),
            page_size: Some(2),
        };
        let page = PageRequest::from_params(&params, PageBounds::default());
        let (items, total) = store.search(products, &page).await.unwrap();
        assert_eq!(total, 5);
        let names: Vec<&str> = items.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Apple", "avocado"]);

        let all = PageRequest::from_params(&SearchParams::default(), PageBounds::default());
        let (items, _) = store.search(products, &all).await.unwrap();
        let names: Vec<&str> = items.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Apple", "avocado", "banana", "cherry", "Zebra"]);
    }

    #[tokio::test]
    async fn unique_columns_compare_case_insensitively() {
        let model = model();
        let products = model.entity_by_path("products").unwrap();
        let store = MemoryStore::new();
        store.insert(products, &product("a", "Widget")).await.unwrap();
        let err = store.insert(products, &product("b", "WIDGET")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.exists_by_column(products, "name", "widget", None).await.unwrap());
        assert!(!store.exists_by_column(products, "name", "widget", Some("a")).await.unwrap());
    }

    #[tokio::test]
    async fn update_keeps_created_at() {
        let model = model();
        let products = model.entity_by_path("products").unwrap();
        let store = MemoryStore::new();
        store.insert(products, &product("a", "Widget")).await.unwrap();
        let patch = json!({"name": "Gadget", "updated_at": "2024-02-01T00:00:00.000000Z", "created_at": "ignored"});
        let updated = store
            .update(products, "a", patch.as_object().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "Gadget");
        assert_eq!(updated["created_at"], "2024-01-01T00:00:00.000000Z");
        assert!(store.update(products, "missing", patch.as_object().unwrap()).await.unwrap().is_none());
    }
}
