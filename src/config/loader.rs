//! Load entity config from the built-in declaration or a JSON file, and resolve it.

use crate::config::resolved::{
    ColumnInfo, Operation, ResolvedEntity, ResolvedModel, ResolvedReference, UniqueKey, CREATED_AT, PK_COLUMN,
    UPDATED_AT,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_ENTITIES: &str = include_str!("entities.json");

/// The shipped declaration of persons, cities, customers and products.
pub fn builtin_config() -> Result<FullConfig, ConfigError> {
    serde_json::from_str(BUILTIN_ENTITIES).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Load a full config from a JSON file shaped like `entities.json`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();
    let mut entity_by_id = HashMap::new();

    for e in &config.entities {
        let mut columns = vec![ColumnInfo {
            name: PK_COLUMN.to_string(),
            type_: ColumnType::Uuid,
            nullable: false,
            max_length: None,
            writable: false,
        }];
        columns.extend(e.columns.iter().map(|c| ColumnInfo {
            name: c.name.clone(),
            type_: c.type_,
            nullable: c.nullable,
            max_length: c.max_length,
            writable: true,
        }));
        columns.push(ColumnInfo {
            name: CREATED_AT.to_string(),
            type_: ColumnType::Timestamptz,
            nullable: false,
            max_length: None,
            writable: false,
        });
        if e.timestamps.updated_at {
            columns.push(ColumnInfo {
                name: UPDATED_AT.to_string(),
                type_: ColumnType::Timestamptz,
                nullable: true,
                max_length: None,
                writable: false,
            });
        }

        let label = e.label.clone().unwrap_or_else(|| e.id.clone());
        let unique = e
            .unique
            .iter()
            .map(|u| UniqueKey {
                column: u.column.clone(),
                message: u
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("a {} with this {} already exists", label, u.column)),
            })
            .collect();
        let references = e
            .references
            .iter()
            .map(|r| ResolvedReference {
                column: r.column.clone(),
                target_entity: r.entity.clone(),
                display: r.display.as_ref().map(|d| (d.column.clone(), d.as_.clone())),
                on_delete: r.on_delete,
                not_found_message: r
                    .not_found_message
                    .clone()
                    .unwrap_or_else(|| format!("{} not found", r.entity)),
            })
            .collect();
        let operations: HashSet<Operation> = e.operations.iter().filter_map(|o| Operation::parse(o)).collect();
        let order_by = e
            .order_by
            .clone()
            .or_else(|| e.columns.iter().find(|c| c.name == "name").map(|c| c.name.clone()))
            .unwrap_or_else(|| CREATED_AT.to_string());

        let entity = ResolvedEntity {
            id: e.id.clone(),
            table_name: e.table.clone(),
            path_segment: e.path_segment.clone(),
            label,
            operations,
            columns,
            has_updated_at: e.timestamps.updated_at,
            validation: e.validation.clone(),
            unique,
            references,
            search_columns: e.search.clone(),
            order_by,
            sensitive_columns: e.sensitive_columns.iter().cloned().collect(),
        };
        entity_by_path.insert(entity.path_segment.clone(), entity.clone());
        entity_by_id.insert(entity.id.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
        entity_by_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_builtin_entities() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        assert_eq!(model.entities.len(), 4);

        let customers = model.entity_by_path("customers").unwrap();
        assert!(!customers.has_updated_at);
        assert!(customers.column(UPDATED_AT).is_none());
        assert_eq!(customers.order_by, "name");
        assert_eq!(customers.references[0].target_entity, "city");
        assert_eq!(
            customers.references[0].display,
            Some(("name".to_string(), "city_name".to_string()))
        );

        let persons = model.entity_by_path("persons").unwrap();
        assert!(persons.allows(Operation::Delete));
        assert!(!model.entity_by_path("cities").unwrap().allows(Operation::Delete));
    }

    #[test]
    fn writable_columns_exclude_server_owned() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let cities = model.entity_by_id("city").unwrap();
        let names: Vec<&str> = cities.writable_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "mayor_id"]);
    }

    #[test]
    fn dependents_follow_reference_columns() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let deps = model.dependents_of("person");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0.id, "city");
        assert_eq!(deps[0].1.column, "mayor_id");
        assert!(model.dependents_of("product").is_empty());
    }
}
