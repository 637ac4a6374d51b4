//! Hosted RPC data store
//!
//! Talks to a PostgREST-style `execute_raw_query` procedure. Introspection
//! goes through the same procedure against `information_schema`.

use crate::db::data_store::{
    columns_sql, foreign_keys_sql, quote_literal, DataStore, IntrospectedColumn,
    IntrospectedForeignKey, IntrospectedTable, TABLES_SQL,
};
use crate::error::{OttoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct RpcDataStore {
    http: reqwest::Client,
    project_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct TableRow {
    table_name: String,
}

#[derive(Deserialize)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    #[serde(default)]
    is_primary_key: Option<bool>,
}

#[derive(Deserialize)]
struct ForeignKeyRow {
    column_name: String,
    referenced_table_name: String,
    referenced_column_name: String,
}

impl RpcDataStore {
    pub fn new(project_url: String, service_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, project_url, service_key })
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/execute_raw_query", self.project_url)
    }

    async fn rows<T: for<'de> Deserialize<'de>>(&self, sql: &str) -> Result<Vec<T>> {
        let data = self.execute_raw_query(sql).await?;
        let data = if data.is_null() { json!([]) } else { data };
        serde_json::from_value(data)
            .map_err(|e| OttoError::Schema(format!("Unexpected introspection row shape: {}", e)))
    }
}

/// Reject results that the procedure reports as failed.
pub(crate) fn check_rpc_result(data: Value) -> Result<Value> {
    if let Some(obj) = data.as_object() {
        let flagged = match obj.get("error") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if flagged {
            let message = obj
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .or_else(|| obj.get("error").map(|e| e.to_string()))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(OttoError::Execution(message));
        }
    }
    Ok(data)
}

#[async_trait]
impl DataStore for RpcDataStore {
    async fn execute_raw_query(&self, query: &str) -> Result<Value> {
        debug!("rpc execute_raw_query");
        let response = self
            .http
            .post(self.rpc_url())
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| OttoError::Execution(format!("RPC call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            return Err(OttoError::Execution(format!("RPC error ({}): {}", status, message)));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| OttoError::Execution(format!("Failed to decode RPC result: {}", e)))?;
        check_rpc_result(data)
    }

    async fn introspect(&self) -> Result<Vec<IntrospectedTable>> {
        let tables: Vec<TableRow> = self.rows(TABLES_SQL).await?;
        let mut out = Vec::with_capacity(tables.len());

        for table in tables {
            let literal = quote_literal(&table.table_name);
            let columns: Vec<ColumnRow> = self.rows(&columns_sql(&literal)).await?;
            let foreign_keys: Vec<ForeignKeyRow> = self.rows(&foreign_keys_sql(&literal)).await?;

            out.push(IntrospectedTable {
                name: table.table_name,
                columns: columns
                    .into_iter()
                    .map(|c| IntrospectedColumn {
                        name: c.column_name,
                        data_type: c.data_type,
                        is_nullable: c.is_nullable.eq_ignore_ascii_case("YES"),
                        is_primary_key: c.is_primary_key.unwrap_or(false),
                    })
                    .collect(),
                foreign_keys: foreign_keys
                    .into_iter()
                    .map(|fk| IntrospectedForeignKey {
                        column: fk.column_name,
                        referenced_table: fk.referenced_table_name,
                        referenced_column: fk.referenced_column_name,
                    })
                    .collect(),
            });
        }
        Ok(out)
    }
}
