use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base-table metadata as reported by the live database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntrospectedTable {
    pub name: String,
    pub columns: Vec<IntrospectedColumn>,
    pub foreign_keys: Vec<IntrospectedForeignKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntrospectedColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntrospectedForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run one finalized SQL statement and return its rows as JSON.
    async fn execute_raw_query(&self, query: &str) -> Result<Value>;

    /// Base tables of the public schema with columns and foreign keys.
    async fn introspect(&self) -> Result<Vec<IntrospectedTable>>;
}

/// Render `value` as a single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) const TABLES_SQL: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

pub(crate) fn columns_sql(table_literal: &str) -> String {
    format!(
        "SELECT c.column_name::text AS column_name, c.data_type::text AS data_type, \
                c.is_nullable::text AS is_nullable, \
                COALESCE((SELECT true \
                          FROM information_schema.table_constraints tc \
                          JOIN information_schema.key_column_usage kcu \
                            ON kcu.constraint_schema = tc.constraint_schema \
                           AND kcu.constraint_name = tc.constraint_name \
                          WHERE tc.table_schema = c.table_schema \
                            AND tc.table_name = c.table_name \
                            AND kcu.table_schema = c.table_schema \
                            AND kcu.table_name = c.table_name \
                            AND kcu.column_name = c.column_name \
                            AND tc.constraint_type = 'PRIMARY KEY' \
                          LIMIT 1), false) AS is_primary_key \
         FROM information_schema.columns c \
         WHERE c.table_schema = 'public' AND c.table_name = {} \
         ORDER BY c.ordinal_position",
        table_literal
    )
}

pub(crate) fn foreign_keys_sql(table_literal: &str) -> String {
    format!(
        "SELECT kcu.column_name::text AS column_name, \
                ccu.table_name::text AS referenced_table_name, \
                ccu.column_name::text AS referenced_column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON kcu.constraint_schema = tc.constraint_schema \
          AND kcu.constraint_name = tc.constraint_name \
         JOIN information_schema.constraint_column_usage ccu \
           ON ccu.constraint_schema = tc.constraint_schema \
          AND ccu.constraint_name = tc.constraint_name \
         WHERE tc.constraint_type = 'FOREIGN KEY' \
           AND tc.table_schema = 'public' \
           AND tc.table_name = {}",
        table_literal
    )
}
