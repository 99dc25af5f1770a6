//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{ColumnType, OnDelete, ValidationRule};
use std::collections::{HashMap, HashSet};

/// Primary key column shared by every entity.
pub const PK_COLUMN: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Search,
    Update,
    Delete,
}

impl Operation {
    pub fn parse(s: &str) -> Option<Operation> {
        match s.to_lowercase().as_str() {
            "create" => Some(Operation::Create),
            "read" => Some(Operation::Read),
            "search" | "list" => Some(Operation::Search),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Search => "search",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub type_: ColumnType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    /// False for id and timestamps: the server owns those.
    pub writable: bool,
}

impl ColumnInfo {
    pub fn pg_type(&self) -> &'static str {
        self.type_.pg_type()
    }
}

#[derive(Clone, Debug)]
pub struct UniqueKey {
    pub column: String,
    pub message: String,
}

/// Our `column` holds the id of a row of `target_entity`.
#[derive(Clone, Debug)]
pub struct ResolvedReference {
    pub column: String,
    pub target_entity: String,
    /// (column on the target, response field name on us)
    pub display: Option<(String, String)>,
    pub on_delete: OnDelete,
    pub not_found_message: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub id: String,
    pub table_name: String,
    pub path_segment: String,
    pub label: String,
    pub operations: HashSet<Operation>,
    /// id, configured columns, created_at, then updated_at when enabled.
    pub columns: Vec<ColumnInfo>,
    pub has_updated_at: bool,
    pub validation: HashMap<String, ValidationRule>,
    pub unique: Vec<UniqueKey>,
    pub references: Vec<ResolvedReference>,
    pub search_columns: Vec<String>,
    pub order_by: String,
    /// Column names to strip from all API responses (sensitive data).
    pub sensitive_columns: HashSet<String>,
}

impl ResolvedEntity {
    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.writable)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
    pub entity_by_id: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    pub fn entity_by_id(&self, id: &str) -> Option<&ResolvedEntity> {
        self.entity_by_id.get(id)
    }

    /// Every (entity, reference) pair whose reference points at `entity_id`.
    pub fn dependents_of(&self, entity_id: &str) -> Vec<(&ResolvedEntity, &ResolvedReference)> {
        self.entities
            .iter()
            .flat_map(|e| e.references.iter().map(move |r| (e, r)))
            .filter(|(_, r)| r.target_entity == entity_id)
            .collect()
    }
}
