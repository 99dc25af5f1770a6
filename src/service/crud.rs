//! Generic CRUD for any configured entity: validation, uniqueness, references, display fields.

use super::pagination::{total_pages, PageRequest};
use super::validation::RequestValidator;
use crate::config::{ColumnInfo, ColumnType, ResolvedEntity, ResolvedModel, ResolvedReference, CREATED_AT, PK_COLUMN, UPDATED_AT};
use crate::error::{AppError, FieldErrors};
use crate::store::{EntityStore, Row};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// One page of search results. `items` are storage rows with display fields resolved.
#[derive(Clone, Debug)]
pub struct Page {
    pub items: Vec<Row>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Path segments of the entities that still reference the row.
    Blocked(Vec<String>),
}

pub struct CrudService<'a> {
    store: &'a dyn EntityStore,
    model: &'a ResolvedModel,
}

/// Parse and normalize a path id. Anything that is not a UUID cannot name a row.
pub fn parse_id(id: &str) -> Result<String, AppError> {
    Uuid::parse_str(id.trim())
        .map(|u| u.to_string())
        .map_err(|_| AppError::BadRequest(format!("invalid id: {}", id)))
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn label<'e>(entity: &'e ResolvedEntity, col: &'e ColumnInfo) -> &'e str {
    entity
        .validation
        .get(&col.name)
        .and_then(|r| r.label.as_deref())
        .unwrap_or(col.name.as_str())
}

impl<'a> CrudService<'a> {
    pub fn new(store: &'a dyn EntityStore, model: &'a ResolvedModel) -> Self {
        CrudService { store, model }
    }

    /// Validate `body` and project it onto the writable columns. Every violation is collected.
    /// Strings are trimmed first, blank strings become null and uuid values are normalized.
    fn prepare(&self, entity: &ResolvedEntity, body: &Row) -> (Row, FieldErrors) {
        let body: Row = body
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k.clone(), Value::String(s.trim().to_string())),
                other => (k.clone(), other.clone()),
            })
            .collect();
        let mut errors = RequestValidator::validate(&body, &entity.validation);
        let mut row = Row::new();
        for col in entity.writable_columns() {
            let raw = body.get(&col.name).cloned().unwrap_or(Value::Null);
            let seen = errors.get(&col.name).is_some();
            let value = match raw {
                Value::String(s) if s.is_empty() => Value::Null,
                Value::String(s) if col.type_ == ColumnType::Uuid => match Uuid::parse_str(&s) {
                    Ok(u) => Value::String(u.to_string()),
                    Err(_) => {
                        if !seen {
                            errors.add(col.name.as_str(), format!("{} must be a valid UUID", label(entity, col)));
                        }
                        Value::Null
                    }
                },
                Value::String(s) => Value::String(s),
                Value::Null => Value::Null,
                _ => {
                    if !seen {
                        errors.add(col.name.as_str(), format!("{} must be a string", label(entity, col)));
                    }
                    Value::Null
                }
            };
            if value.is_null() && !col.nullable && errors.get(&col.name).is_none() {
                errors.add(col.name.as_str(), format!("{} is required", label(entity, col)));
            }
            row.insert(col.name.clone(), value);
        }
        (row, errors)
    }

    fn target(&self, reference: &ResolvedReference) -> Result<&'a ResolvedEntity, AppError> {
        self.model
            .entity_by_id(&reference.target_entity)
            .ok_or_else(|| AppError::Internal(format!("unknown entity {}", reference.target_entity)))
    }

    /// References in `row` that point at no existing row.
    async fn missing_references<'e>(
        &self,
        entity: &'e ResolvedEntity,
        row: &Row,
    ) -> Result<Vec<&'e ResolvedReference>, AppError> {
        let mut missing = Vec::new();
        for r in &entity.references {
            let Some(id) = row.get(&r.column).and_then(Value::as_str) else {
                continue;
            };
            let target = self.target(r)?;
            if self.store.find_by_id(target, id).await?.is_none() {
                missing.push(r);
            }
        }
        Ok(missing)
    }

    async fn unique_violations(
        &self,
        entity: &ResolvedEntity,
        row: &Row,
        exclude_id: Option<&str>,
    ) -> Result<FieldErrors, AppError> {
        let mut errors = FieldErrors::new();
        for key in &entity.unique {
            let Some(value) = row.get(&key.column).and_then(Value::as_str) else {
                continue;
            };
            if self.store.exists_by_column(entity, &key.column, value, exclude_id).await? {
                errors.add(key.column.as_str(), key.message.as_str());
            }
        }
        Ok(errors)
    }

    /// Add each reference's display field to every row, one lookup per reference.
    async fn resolve_display(&self, entity: &ResolvedEntity, rows: &mut [Row]) -> Result<(), AppError> {
        for r in &entity.references {
            let Some((display_col, field)) = &r.display else {
                continue;
            };
            let ids: BTreeSet<String> = rows
                .iter()
                .filter_map(|row| row.get(&r.column).and_then(Value::as_str).map(str::to_string))
                .collect();
            let ids: Vec<String> = ids.into_iter().collect();
            let target = self.target(r)?;
            let names: HashMap<String, Value> = self
                .store
                .find_by_ids(target, &ids)
                .await?
                .into_iter()
                .filter_map(|t| {
                    let id = t.get(PK_COLUMN)?.as_str()?.to_string();
                    Some((id, t.get(display_col).cloned().unwrap_or(Value::Null)))
                })
                .collect();
            for row in rows.iter_mut() {
                let value = row
                    .get(&r.column)
                    .and_then(Value::as_str)
                    .and_then(|id| names.get(id).cloned())
                    .unwrap_or(Value::Null);
                row.insert(field.clone(), value);
            }
        }
        Ok(())
    }

    async fn present(&self, entity: &ResolvedEntity, mut rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        self.resolve_display(entity, &mut rows).await?;
        for row in rows.iter_mut() {
            for c in &entity.sensitive_columns {
                row.remove(c);
            }
        }
        Ok(rows)
    }

    async fn present_one(&self, entity: &ResolvedEntity, row: Row) -> Result<Row, AppError> {
        self.present(entity, vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("row vanished while resolving display fields".into()))
    }

    pub async fn create(&self, entity: &ResolvedEntity, body: &Row) -> Result<Row, AppError> {
        let (mut row, errors) = self.prepare(entity, body);
        errors.into_result()?;
        self.unique_violations(entity, &row, None).await?.into_result()?;

        let mut errors = FieldErrors::new();
        for r in self.missing_references(entity, &row).await? {
            errors.add(r.column.as_str(), r.not_found_message.as_str());
        }
        errors.into_result()?;

        let id = Uuid::new_v4().to_string();
        row.insert(PK_COLUMN.to_string(), Value::String(id.clone()));
        row.insert(CREATED_AT.to_string(), now());
        if entity.has_updated_at {
            row.insert(UPDATED_AT.to_string(), Value::Null);
        }
        let stored = self.store.insert(entity, &row).await?;
        tracing::info!(entity = %entity.id, id = %id, "created");
        self.present_one(entity, stored).await
    }

    pub async fn get(&self, entity: &ResolvedEntity, id: &str) -> Result<Row, AppError> {
        let id = parse_id(id)?;
        let row = self
            .store
            .find_by_id(entity, &id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", entity.label, id)))?;
        self.present_one(entity, row).await
    }

    pub async fn search(&self, entity: &ResolvedEntity, page: &PageRequest) -> Result<Page, AppError> {
        let (rows, total_count) = self.store.search(entity, page).await?;
        let items = self.present(entity, rows).await?;
        Ok(Page {
            items,
            total_count,
            page: page.page,
            page_size: page.page_size,
            total_pages: total_pages(total_count, page.page_size),
        })
    }

    /// Full replace of the writable fields. A missing row is NotFound whatever the body holds.
    pub async fn update(&self, entity: &ResolvedEntity, id: &str, body: &Row) -> Result<Row, AppError> {
        let id = parse_id(id)?;
        let (mut row, errors) = self.prepare(entity, body);
        let not_found = || AppError::NotFound(format!("{} {} not found", entity.label, id));
        if self.store.find_by_id(entity, &id).await?.is_none() {
            return Err(not_found());
        }
        errors.into_result()?;

        if let Some(r) = self.missing_references(entity, &row).await?.first() {
            return Err(AppError::NotFound(r.not_found_message.clone()));
        }
        self.unique_violations(entity, &row, Some(&id)).await?.into_result()?;

        if entity.has_updated_at {
            row.insert(UPDATED_AT.to_string(), now());
        }
        let stored = self.store.update(entity, &id, &row).await?.ok_or_else(not_found)?;
        tracing::info!(entity = %entity.id, id = %id, "updated");
        self.present_one(entity, stored).await
    }

    /// Path segments of entities holding a reference to row `id`, in config order.
    async fn dependents(&self, entity: &ResolvedEntity, id: &str) -> Result<Vec<String>, AppError> {
        let mut found: Vec<String> = Vec::new();
        for (dependent, r) in self.model.dependents_of(&entity.id) {
            if found.contains(&dependent.path_segment) {
                continue;
            }
            if self.store.count_referencing(dependent, &r.column, id).await? > 0 {
                found.push(dependent.path_segment.clone());
            }
        }
        Ok(found)
    }

    pub async fn dependencies(&self, entity: &ResolvedEntity, id: &str) -> Result<Vec<String>, AppError> {
        let id = parse_id(id)?;
        if self.store.find_by_id(entity, &id).await?.is_none() {
            return Err(AppError::NotFound(format!("{} {} not found", entity.label, id)));
        }
        self.dependents(entity, &id).await
    }

    /// Delete unless another row still references this one.
    pub async fn delete(&self, entity: &ResolvedEntity, id: &str) -> Result<DeleteOutcome, AppError> {
        let dependents = self.dependencies(entity, id).await?;
        if !dependents.is_empty() {
            tracing::info!(entity = %entity.id, id = %id, dependents = ?dependents, "delete blocked");
            return Ok(DeleteOutcome::Blocked(dependents));
        }
        let id = parse_id(id)?;
        if !self.store.delete(entity, &id).await? {
            return Err(AppError::NotFound(format!("{} {} not found", entity.label, id)));
        }
        tracing::info!(entity = %entity.id, id = %id, "deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve};
    use crate::service::{PageBounds, SearchParams};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_config().unwrap()).unwrap()
    }

    fn body(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn id_of(row: &Row) -> String {
        row["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_then_get_resolves_display_field() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let persons = model.entity_by_path("persons").unwrap();
        let cities = model.entity_by_path("cities").unwrap();

        let homer = svc
            .create(persons, &body(json!({"name": "Homer", "email": "homer@example.com"})))
            .await
            .unwrap();
        let city = svc
            .create(cities, &body(json!({"name": "Springfield", "mayor_id": id_of(&homer)})))
            .await
            .unwrap();
        assert_eq!(city["mayor_name"], "Homer");
        assert!(city["updated_at"].is_null());

        let fetched = svc.get(cities, &id_of(&city)).await.unwrap();
        assert_eq!(fetched["name"], "Springfield");
        assert_eq!(fetched["mayor_name"], "Homer");
    }

    #[tokio::test]
    async fn create_collects_every_field_error() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let customers = model.entity_by_path("customers").unwrap();
        let err = svc
            .create(customers, &body(json!({"name": "Al", "cpf": "12ab", "city_id": 5})))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else { panic!("expected validation error") };
        assert!(errors.get("name").is_some());
        assert!(errors.get("cpf").unwrap().len() >= 2);
        assert!(errors.get("city_id").is_some());
    }

    #[tokio::test]
    async fn unknown_mayor_is_rejected_on_create_and_not_found_on_update() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let cities = model.entity_by_path("cities").unwrap();
        let ghost = Uuid::new_v4().to_string();
        let err = svc
            .create(cities, &body(json!({"name": "Shelbyville", "mayor_id": ghost})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(e) if e.get("mayor_id").is_some()));

        let city = svc.create(cities, &body(json!({"name": "Shelbyville"}))).await.unwrap();
        let err = svc
            .update(cities, &id_of(&city), &body(json!({"name": "Shelbyville", "mayor_id": ghost})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found_even_with_invalid_body() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let products = model.entity_by_path("products").unwrap();
        let err = svc
            .update(products, &Uuid::new_v4().to_string(), &body(json!({"name": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_excludes_self_from_uniqueness() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let persons = model.entity_by_path("persons").unwrap();
        let ana = svc
            .create(persons, &body(json!({"name": "Ana", "email": "ana@example.com"})))
            .await
            .unwrap();
        svc.create(persons, &body(json!({"name": "Bia", "email": "bia@example.com"})))
            .await
            .unwrap();

        let updated = svc
            .update(persons, &id_of(&ana), &body(json!({"name": "Ana Maria", "email": "ANA@example.com"})))
            .await
            .unwrap();
        assert_eq!(updated["name"], "Ana Maria");
        assert!(updated["updated_at"].is_string());

        let err = svc
            .update(persons, &id_of(&ana), &body(json!({"name": "Ana", "email": "bia@example.com"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(e) if e.get("email").is_some()));
    }

    #[tokio::test]
    async fn search_pages_and_counts() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let products = model.entity_by_path("products").unwrap();
        for i in 0..15 {
            svc.create(products, &body(json!({"name": format!("Product {:02}", i)})))
                .await
                .unwrap();
        }
        let params = SearchParams {
            search_term: None,
            page: Some(2),
            page_size: Some(10),
        };
        let page = svc
            .search(products, &PageRequest::from_params(&params, PageBounds::default()))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_count, 15);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0]["name"], "Product 10");
    }

    #[tokio::test]
    async fn delete_is_blocked_while_referenced_as_mayor() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let persons = model.entity_by_path("persons").unwrap();
        let cities = model.entity_by_path("cities").unwrap();
        let homer = svc
            .create(persons, &body(json!({"name": "Homer", "email": "homer@example.com"})))
            .await
            .unwrap();
        let city = svc
            .create(cities, &body(json!({"name": "Springfield", "mayor_id": id_of(&homer)})))
            .await
            .unwrap();

        let outcome = svc.delete(persons, &id_of(&homer)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Blocked(vec!["cities".to_string()]));

        svc.update(cities, &id_of(&city), &body(json!({"name": "Springfield"})))
            .await
            .unwrap();
        assert_eq!(svc.delete(persons, &id_of(&homer)).await.unwrap(), DeleteOutcome::Deleted);
        assert!(matches!(svc.get(persons, &id_of(&homer)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_trimmed_before_uniqueness() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let cities = model.entity_by_path("cities").unwrap();
        let city = svc.create(cities, &body(json!({"name": "  Springfield "}))).await.unwrap();
        assert_eq!(city["name"], "Springfield");
        let err = svc
            .create(cities, &body(json!({"name": " springfield "})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(e) if e.get("name").is_some()));
    }

    #[tokio::test]
    async fn search_matches_any_search_column() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let persons = model.entity_by_path("persons").unwrap();
        let cities = model.entity_by_path("cities").unwrap();
        let customers = model.entity_by_path("customers").unwrap();
        svc.create(persons, &body(json!({"name": "Marge", "email": "marge.bouvier@example.com"})))
            .await
            .unwrap();
        svc.create(persons, &body(json!({"name": "Ned", "email": "ned@example.com"})))
            .await
            .unwrap();
        let city = svc.create(cities, &body(json!({"name": "Ogdenville"}))).await.unwrap();
        for (name, cpf) in [("Lisa Simpson", "12345678901"), ("Bart Simpson", "98765432100")] {
            svc.create(customers, &body(json!({"name": name, "cpf": cpf, "city_id": id_of(&city)})))
                .await
                .unwrap();
        }

        let search = |term: &str| SearchParams {
            search_term: Some(term.to_string()),
            page: None,
            page_size: None,
        };
        let by_cpf = svc
            .search(customers, &PageRequest::from_params(&search("4567"), PageBounds::default()))
            .await
            .unwrap();
        assert_eq!(by_cpf.total_count, 1);
        assert_eq!(by_cpf.items[0]["name"], "Lisa Simpson");
        assert_eq!(by_cpf.items[0]["city_name"], "Ogdenville");

        let by_email = svc
            .search(persons, &PageRequest::from_params(&search("BOUVIER"), PageBounds::default()))
            .await
            .unwrap();
        assert_eq!(by_email.total_count, 1);
        assert_eq!(by_email.items[0]["name"], "Marge");
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let model = model();
        let store = MemoryStore::new();
        let svc = CrudService::new(&store, &model);
        let persons = model.entity_by_path("persons").unwrap();
        assert!(matches!(svc.get(persons, "42").await, Err(AppError::BadRequest(_))));
    }
}
