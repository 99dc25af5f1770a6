//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::config::{ColumnInfo, ResolvedEntity, PK_COLUMN, UPDATED_AT};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Name of the case-insensitive unique index guarding `column`.
pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("ux_{}_{}", table, column)
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// `$n::type` so text binds land in uuid/timestamptz columns.
fn placeholder(n: u32, col: &ColumnInfo) -> String {
    format!("${}::{}", n, col.pg_type())
}

fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE wildcards so a search for "50%" matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// WHERE clause matching `term` as a case-insensitive substring of any search column.
fn search_clause(q: &mut QueryBuf, entity: &ResolvedEntity, term: Option<&str>) -> String {
    match term {
        Some(t) if !entity.search_columns.is_empty() => {
            let n = q.push_param(Value::String(like_pattern(&t.to_lowercase())));
            let parts: Vec<String> = entity
                .search_columns
                .iter()
                .map(|c| format!("lower({}) LIKE ${}", quoted(c), n))
                .collect();
            format!(" WHERE ({})", parts.join(" OR "))
        }
        _ => String::new(),
    }
}

/// SELECT by primary key. Caller adds id as sole param.
pub fn select_by_id(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1::uuid",
        select_column_list(entity),
        quoted(&entity.table_name),
        quoted(PK_COLUMN)
    );
    q
}

/// SELECT rows whose primary key is in `ids`. Used for batch-loading referenced rows.
pub fn select_by_ids(entity: &ResolvedEntity, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.table_name);
    let cols = select_column_list(entity);
    if ids.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let placeholders: Vec<String> = ids
        .iter()
        .map(|v| format!("${}::uuid", q.push_param(v.clone())))
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        cols,
        table,
        quoted(PK_COLUMN),
        placeholders.join(", ")
    );
    q
}

/// One page of search results, ordered alphabetically ignoring case, then by exact bytes, then id.
pub fn select_page(entity: &ResolvedEntity, term: Option<&str>, limit: u64, offset: u64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = search_clause(&mut q, entity, term);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY lower({order}) COLLATE \"C\" ASC, {order} COLLATE \"C\" ASC, {} ASC LIMIT {} OFFSET {}",
        select_column_list(entity),
        quoted(&entity.table_name),
        where_clause,
        quoted(PK_COLUMN),
        limit,
        offset,
        order = quoted(&entity.order_by)
    );
    q
}

/// COUNT of rows matching the same search filter as `select_page`.
pub fn count_matching(entity: &ResolvedEntity, term: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = search_clause(&mut q, entity, term);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&entity.table_name), where_clause);
    q
}

/// EXISTS check for a case-insensitive value in `column`, optionally excluding one row by id.
pub fn exists_ci(entity: &ResolvedEntity, column: &str, value: &str, exclude_id: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(value.to_string()));
    let mut sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE lower({}) = lower(${})",
        quoted(&entity.table_name),
        quoted(column),
        n
    );
    if let Some(id) = exclude_id {
        let n = q.push_param(Value::String(id.to_string()));
        sql.push_str(&format!(" AND {} <> ${}::uuid", quoted(PK_COLUMN), n));
    }
    sql.push(')');
    q.sql = sql;
    q
}

/// COUNT of rows whose `column` holds `id`. Used by the delete dependency check.
pub fn count_referencing(entity: &ResolvedEntity, column: &str, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ${}::uuid",
        quoted(&entity.table_name),
        quoted(column),
        n
    );
    q
}

/// INSERT every entity column; missing values bind as NULL.
pub fn insert(entity: &ResolvedEntity, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let val = row.get(&c.name).cloned().unwrap_or(Value::Null);
        let n = q.push_param(val);
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(n, c));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&entity.table_name),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// Full-replace UPDATE by id: SET every writable column plus updated_at when the entity has one.
pub fn update(entity: &ResolvedEntity, id: &str, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if !(c.writable || (c.name == UPDATED_AT && entity.has_updated_at)) {
            continue;
        }
        let val = row.get(&c.name).cloned().unwrap_or(Value::Null);
        let n = q.push_param(val);
        sets.push(format!("{} = {}", quoted(&c.name), placeholder(n, c)));
    }
    let id_param = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::uuid RETURNING {}",
        quoted(&entity.table_name),
        sets.join(", "),
        quoted(PK_COLUMN),
        id_param,
        select_column_list(entity)
    );
    q
}

/// DELETE by id. Caller adds id as sole param.
pub fn delete(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1::uuid",
        quoted(&entity.table_name),
        quoted(PK_COLUMN)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_config().unwrap()).unwrap()
    }

    #[test]
    fn search_matches_every_search_column_with_one_param() {
        let model = model();
        let persons = model.entity_by_path("persons").unwrap();
        let q = select_page(persons, Some("Ana"), 10, 20);
        assert!(q.sql.contains("WHERE (lower(\"name\") LIKE $1 OR lower(\"email\") LIKE $1)"));
        assert!(q.sql.ends_with("ORDER BY lower(\"name\") COLLATE \"C\" ASC, \"name\" COLLATE \"C\" ASC, \"id\" ASC LIMIT 10 OFFSET 20"));
        assert_eq!(q.params, vec![json!("%ana%")]);
    }

    #[test]
    fn search_without_term_has_no_where() {
        let model = model();
        let products = model.entity_by_path("products").unwrap();
        let q = count_matching(products, None);
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"products\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn exists_excludes_own_row_on_update() {
        let model = model();
        let cities = model.entity_by_path("cities").unwrap();
        let q = exists_ci(cities, "name", "Springfield", Some("00000000-0000-0000-0000-000000000001"));
        assert!(q.sql.contains("lower(\"name\") = lower($1) AND \"id\" <> $2::uuid"));
        assert_eq!(q.params.len(), 2);
        let q = exists_ci(cities, "name", "Springfield", None);
        assert!(!q.sql.contains("<>"));
    }

    #[test]
    fn insert_casts_typed_columns() {
        let model = model();
        let customers = model.entity_by_path("customers").unwrap();
        let row = json!({"id": "x", "name": "Ana", "cpf": "12345678901", "city_id": "y", "created_at": "z"});
        let q = insert(customers, row.as_object().unwrap());
        assert!(q.sql.starts_with(
            "INSERT INTO \"customers\" (\"id\", \"name\", \"cpf\", \"city_id\", \"created_at\") VALUES ($1::uuid, $2::text, $3::text, $4::uuid, $5::timestamptz)"
        ));
        assert_eq!(q.params.len(), 5);
    }

    #[test]
    fn update_sets_writable_columns_and_updated_at() {
        let model = model();
        let cities = model.entity_by_path("cities").unwrap();
        let row = json!({"name": "Shelbyville", "mayor_id": null, "updated_at": "now"});
        let q = update(cities, "abc", row.as_object().unwrap());
        assert!(q.sql.contains("SET \"name\" = $1::text, \"mayor_id\" = $2::uuid, \"updated_at\" = $3::timestamptz"));
        assert!(q.sql.contains("WHERE \"id\" = $4::uuid"));
        assert!(!q.sql.contains("\"created_at\" ="));
    }

    #[test]
    fn update_without_updated_at_column() {
        let model = model();
        let customers = model.entity_by_path("customers").unwrap();
        let row = json!({"name": "Ana", "cpf": "12345678901", "city_id": "c"});
        let q = update(customers, "abc", row.as_object().unwrap());
        assert!(!q.sql.contains("updated_at"));
    }

    #[test]
    fn batch_select_by_ids() {
        let model = model();
        let cities = model.entity_by_path("cities").unwrap();
        let q = select_by_ids(cities, &[json!("a"), json!("b")]);
        assert!(q.sql.ends_with("WHERE \"id\" IN ($1::uuid, $2::uuid)"));
        assert!(select_by_ids(cities, &[]).sql.ends_with("WHERE 1 = 0"));
    }
}
