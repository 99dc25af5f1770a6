//! Schema migrations derived from the resolved model: users, one table per entity, then foreign keys.
//! Every step is named and reversible; applied names are recorded in `_schema_migrations`.

use crate::config::{ColumnInfo, ResolvedModel, CREATED_AT, PK_COLUMN, UPDATED_AT};
use crate::error::AppError;
use crate::sql::{quoted, unique_index_name};
use sqlx::PgPool;
use std::collections::HashSet;

pub const USERS_STEP: &str = "0001_create_users";
const LEDGER_TABLE: &str = "_schema_migrations";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationStep {
    pub name: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

fn column_def(col: &ColumnInfo) -> String {
    let name = quoted(&col.name);
    if col.name == PK_COLUMN {
        return format!("{} uuid PRIMARY KEY", name);
    }
    if col.name == CREATED_AT {
        return format!("{} timestamptz NOT NULL DEFAULT now()", name);
    }
    let typ = match (col.pg_type(), col.max_length) {
        ("text", Some(n)) => format!("varchar({})", n),
        (t, _) => t.to_string(),
    };
    let null = if col.nullable || col.name == UPDATED_AT { "" } else { " NOT NULL" };
    format!("{} {}{}", name, typ, null)
}

fn users_step() -> MigrationStep {
    MigrationStep {
        name: USERS_STEP.to_string(),
        up: vec![
            "CREATE TABLE \"users\" (\n  \"id\" uuid PRIMARY KEY,\n  \"email\" varchar(256) NOT NULL,\n  \
             \"password_hash\" text NOT NULL,\n  \"first_name\" varchar(100) NOT NULL,\n  \
             \"last_name\" varchar(100) NOT NULL,\n  \"created_at\" timestamptz NOT NULL DEFAULT now(),\n  \
             \"updated_at\" timestamptz\n)"
                .to_string(),
            format!(
                "CREATE UNIQUE INDEX {} ON \"users\" (lower(\"email\"))",
                quoted(&unique_index_name("users", "email"))
            ),
        ],
        down: vec!["DROP TABLE IF EXISTS \"users\"".to_string()],
    }
}

/// Ordered steps for `model`. Tables come before any foreign key, so entity order does not matter.
pub fn plan(model: &ResolvedModel) -> Vec<MigrationStep> {
    let mut steps = vec![users_step()];
    for e in &model.entities {
        let table = quoted(&e.table_name);
        let cols: Vec<String> = e.columns.iter().map(column_def).collect();
        let mut up = vec![format!("CREATE TABLE {} (\n  {}\n)", table, cols.join(",\n  "))];
        for u in &e.unique {
            up.push(format!(
                "CREATE UNIQUE INDEX {} ON {} (lower({}))",
                quoted(&unique_index_name(&e.table_name, &u.column)),
                table,
                quoted(&u.column)
            ));
        }
        up.push(format!(
            "CREATE INDEX {} ON {} (lower({order}) COLLATE \"C\", {order} COLLATE \"C\", {})",
            quoted(&format!("ix_{}_{}", e.table_name, e.order_by)),
            table,
            quoted(PK_COLUMN),
            order = quoted(&e.order_by)
        ));
        steps.push(MigrationStep {
            name: format!("create_{}", e.table_name),
            up,
            down: vec![format!("DROP TABLE IF EXISTS {}", table)],
        });
    }
    for e in &model.entities {
        let table = quoted(&e.table_name);
        for r in &e.references {
            let Some(target) = model.entity_by_id(&r.target_entity) else {
                continue;
            };
            let index = quoted(&format!("ix_{}_{}", e.table_name, r.column));
            let constraint = quoted(&format!("fk_{}_{}", e.table_name, r.column));
            steps.push(MigrationStep {
                name: format!("add_{}_{}_fk", e.table_name, r.column),
                up: vec![
                    format!("CREATE INDEX {} ON {} ({})", index, table, quoted(&r.column)),
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                        table,
                        constraint,
                        quoted(&r.column),
                        quoted(&target.table_name),
                        quoted(PK_COLUMN),
                        r.on_delete.sql()
                    ),
                ],
                down: vec![
                    format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}", table, constraint),
                    format!("DROP INDEX IF EXISTS {}", index),
                ],
            });
        }
    }
    steps
}

async fn ensure_ledger(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  \"seq\" bigserial PRIMARY KEY,\n  \"name\" text NOT NULL UNIQUE,\n  \
         \"applied_at\" timestamptz NOT NULL DEFAULT now()\n)",
        quoted(LEDGER_TABLE)
    ))
    .execute(pool)
    .await?;
    Ok(())
}

async fn applied_names(pool: &PgPool) -> Result<HashSet<String>, AppError> {
    let names: Vec<String> = sqlx::query_scalar(&format!("SELECT \"name\" FROM {}", quoted(LEDGER_TABLE)))
        .fetch_all(pool)
        .await?;
    Ok(names.into_iter().collect())
}

/// Run every step not yet recorded, in plan order, each in its own transaction.
/// Returns the names of the steps applied by this call.
pub async fn apply_migrations(pool: &PgPool, steps: &[MigrationStep]) -> Result<Vec<String>, AppError> {
    ensure_ledger(pool).await?;
    let done = applied_names(pool).await?;
    let mut applied = Vec::new();
    for step in steps.iter().filter(|s| !done.contains(&s.name)) {
        let mut tx = pool.begin().await?;
        for stmt in &step.up {
            tracing::debug!(step = %step.name, sql = %stmt, "migration");
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        sqlx::query(&format!("INSERT INTO {} (\"name\") VALUES ($1)", quoted(LEDGER_TABLE)))
            .bind(&step.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(step = %step.name, "migration applied");
        applied.push(step.name.clone());
    }
    Ok(applied)
}

/// Undo the most recently applied step. None when nothing has been applied.
pub async fn revert_last(pool: &PgPool, steps: &[MigrationStep]) -> Result<Option<String>, AppError> {
    ensure_ledger(pool).await?;
    let last: Option<String> = sqlx::query_scalar(&format!(
        "SELECT \"name\" FROM {} ORDER BY \"seq\" DESC LIMIT 1",
        quoted(LEDGER_TABLE)
    ))
    .fetch_optional(pool)
    .await?;
    let Some(name) = last else {
        return Ok(None);
    };
    let step = steps
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| AppError::Internal(format!("applied migration {} is not in the plan", name)))?;
    let mut tx = pool.begin().await?;
    for stmt in &step.down {
        tracing::debug!(step = %step.name, sql = %stmt, "migration revert");
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    sqlx::query(&format!("DELETE FROM {} WHERE \"name\" = $1", quoted(LEDGER_TABLE)))
        .bind(&step.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    tracing::info!(step = %step.name, "migration reverted");
    Ok(Some(name))
}
