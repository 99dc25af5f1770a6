//! Raw config types matching the entity declaration JSON (see `config/entities.json`).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Column storage type. Every entity also gets `id` (uuid), `created_at` and optionally `updated_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Uuid,
    Timestamptz,
}

impl ColumnType {
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Uuid => "uuid",
            ColumnType::Timestamptz => "timestamptz",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_text")]
    pub type_: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    /// Becomes `varchar(n)` in DDL.
    #[serde(default)]
    pub max_length: Option<u32>,
}

fn default_text() -> ColumnType {
    ColumnType::Text
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    /// Exact length in characters.
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub digits_only: Option<bool>,
    /// Human-readable field label used in messages; defaults to the column name.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniqueConfig {
    pub column: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// What a referenced row contributes to responses: its `column` exposed under `as`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub column: String,
    #[serde(rename = "as")]
    pub as_: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OnDelete {
    Restrict,
    SetNull,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

impl<'de> Deserialize<'de> for OnDelete {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().replace('_', " ").as_str() {
            "restrict" | "no action" => Ok(OnDelete::Restrict),
            "set null" => Ok(OnDelete::SetNull),
            other => Err(serde::de::Error::custom(format!(
                "on_delete must be \"restrict\" or \"set null\"; got {}",
                other
            ))),
        }
    }
}

fn default_restrict() -> OnDelete {
    OnDelete::Restrict
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub column: String,
    /// Id of the referenced entity.
    pub entity: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub display: Option<DisplayConfig>,
    #[serde(default = "default_restrict")]
    pub on_delete: OnDelete,
    #[serde(default)]
    pub not_found_message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimestampsConfig {
    #[serde(default = "default_true")]
    pub updated_at: bool,
}

impl Default for TimestampsConfig {
    fn default() -> Self {
        TimestampsConfig { updated_at: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub id: String,
    pub table: String,
    pub path_segment: String,
    /// Singular display name used in messages (e.g. "city").
    #[serde(default)]
    pub label: Option<String>,
    pub operations: Vec<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub timestamps: TimestampsConfig,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub unique: Vec<UniqueConfig>,
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

/// All entity declarations in one struct.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub entities: Vec<EntityConfig>,
}
