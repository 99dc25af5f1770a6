//! Config validation: referential integrity and API consistency.

use crate::config::{EntityConfig, FullConfig};
use crate::config::resolved::{Operation, CREATED_AT, PK_COLUMN, UPDATED_AT};
use crate::error::ConfigError;
use std::collections::HashSet;

fn known_columns(e: &EntityConfig) -> HashSet<&str> {
    let mut cols: HashSet<&str> = e.columns.iter().map(|c| c.name.as_str()).collect();
    cols.insert(PK_COLUMN);
    cols.insert(CREATED_AT);
    if e.timestamps.updated_at {
        cols.insert(UPDATED_AT);
    }
    cols
}

fn check_column(entity: &EntityConfig, cols: &HashSet<&str>, column: &str) -> Result<(), ConfigError> {
    if cols.contains(column) {
        Ok(())
    } else {
        Err(ConfigError::UnknownColumn {
            entity: entity.id.clone(),
            column: column.to_string(),
        })
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }
    let entity_ids: HashSet<&str> = config.entities.iter().map(|e| e.id.as_str()).collect();
    if entity_ids.len() != config.entities.len() {
        return Err(ConfigError::Validation("duplicate entity id".into()));
    }

    let mut path_segments = HashSet::new();
    for e in &config.entities {
        if !path_segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
        }
        if e.path_segment == "auth" {
            return Err(ConfigError::Validation("path segment 'auth' is reserved".into()));
        }
        for op in &e.operations {
            if Operation::parse(op).is_none() {
                return Err(ConfigError::Validation(format!("{}: unknown operation '{}'", e.id, op)));
            }
        }

        let mut declared = HashSet::new();
        for c in &e.columns {
            if [PK_COLUMN, CREATED_AT, UPDATED_AT].contains(&c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: column '{}' is managed by the server",
                    e.id, c.name
                )));
            }
            if !declared.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!("{}: duplicate column '{}'", e.id, c.name)));
            }
        }

        let cols = known_columns(e);
        for col in e.validation.keys() {
            check_column(e, &cols, col)?;
        }
        for u in &e.unique {
            check_column(e, &cols, &u.column)?;
        }
        for s in &e.search {
            check_column(e, &cols, s)?;
        }
        if let Some(order) = &e.order_by {
            check_column(e, &cols, order)?;
        }
        for r in &e.references {
            check_column(e, &cols, &r.column)?;
            let nullable = e.columns.iter().any(|c| c.name == r.column && c.nullable);
            if r.required && nullable {
                return Err(ConfigError::Validation(format!(
                    "{}: required reference '{}' must not be nullable",
                    e.id, r.column
                )));
            }
            let target = config
                .entities
                .iter()
                .find(|t| t.id == r.entity)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: r.entity.clone(),
                })?;
            if let Some(display) = &r.display {
                check_column(target, &known_columns(target), &display.column)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_config;

    #[test]
    fn builtin_config_is_valid() {
        let config = builtin_config().expect("builtin config parses");
        validate(&config).expect("builtin config validates");
    }

    #[test]
    fn rejects_reference_to_unknown_entity() {
        let mut config = builtin_config().unwrap();
        let city = config.entities.iter_mut().find(|e| e.id == "city").unwrap();
        city.references[0].entity = "mayor".into();
        match validate(&config) {
            Err(ConfigError::MissingReference { kind, id }) => {
                assert_eq!(kind, "entity");
                assert_eq!(id, "mayor");
            }
            other => panic!("expected missing reference, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unique_on_unknown_column() {
        let mut config = builtin_config().unwrap();
        config.entities[0].unique[0].column = "phone".into();
        assert!(matches!(validate(&config), Err(ConfigError::UnknownColumn { .. })));
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut config = builtin_config().unwrap();
        config.entities[1].path_segment = config.entities[0].path_segment.clone();
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn auth_path_segment_is_reserved() {
        let mut config = builtin_config().unwrap();
        config.entities[0].path_segment = "auth".into();
        match validate(&config) {
            Err(ConfigError::Validation(msg)) => assert_eq!(msg, "path segment 'auth' is reserved"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn required_reference_column_must_not_be_nullable() {
        let mut config = builtin_config().unwrap();
        let customer = config.entities.iter_mut().find(|e| e.id == "customer").unwrap();
        let city_id = customer.columns.iter_mut().find(|c| c.name == "city_id").unwrap();
        city_id.nullable = true;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(m)) if m.contains("city_id")));
    }

    #[test]
    fn rejects_server_managed_column() {
        let mut config = builtin_config().unwrap();
        config.entities[0].columns.push(crate::config::ColumnConfig {
            name: "created_at".into(),
            type_: crate::config::ColumnType::Timestamptz,
            nullable: false,
            max_length: None,
        });
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
