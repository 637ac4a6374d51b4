//! Direct Postgres data store
//!
//! Wraps each statement in a `json_agg` so rows come back as one JSON text
//! value, matching the shape the RPC procedure returns.

use crate::db::connection::DbPool;
use crate::db::data_store::{
    columns_sql, foreign_keys_sql, DataStore, IntrospectedColumn, IntrospectedForeignKey,
    IntrospectedTable, TABLES_SQL,
};
use crate::error::{OttoError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use tracing::debug;

#[derive(Clone)]
pub struct PgDataStore {
    pool: DbPool,
}

impl PgDataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn wrap_as_json(query: &str) -> String {
    let trimmed = query.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT COALESCE(json_agg(t), '[]'::json)::text AS payload FROM ({}) t",
        trimmed
    )
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn execute_raw_query(&self, query: &str) -> Result<Value> {
        debug!("pg execute_raw_query");
        let row = sqlx::query(&wrap_as_json(query))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| OttoError::Execution(e.to_string()))?;
        let text: String = row.try_get("payload")?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn introspect(&self) -> Result<Vec<IntrospectedTable>> {
        let tables = sqlx::query(TABLES_SQL).fetch_all(&self.pool).await?;
        let column_query = columns_sql("$1");
        let fk_query = foreign_keys_sql("$1");

        let mut out = Vec::with_capacity(tables.len());
        for table in tables {
            let name: String = table.try_get("table_name")?;

            let columns = sqlx::query(&column_query)
                .bind(&name)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| {
                    Ok(IntrospectedColumn {
                        name: row.try_get("column_name")?,
                        data_type: row.try_get("data_type")?,
                        is_nullable: row
                            .try_get::<String, _>("is_nullable")?
                            .eq_ignore_ascii_case("YES"),
                        is_primary_key: row.try_get::<Option<bool>, _>("is_primary_key")?.unwrap_or(false),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let foreign_keys = sqlx::query(&fk_query)
                .bind(&name)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| {
                    Ok(IntrospectedForeignKey {
                        column: row.try_get("column_name")?,
                        referenced_table: row.try_get("referenced_table_name")?,
                        referenced_column: row.try_get("referenced_column_name")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            out.push(IntrospectedTable { name, columns, foreign_keys });
        }
        Ok(out)
    }
}
