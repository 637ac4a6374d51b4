//! Time-boxed schema cache
//!
//! The table map is swapped wholesale on each refresh, so readers holding an
//! earlier snapshot keep a consistent view. Concurrent refreshes may race;
//! the last one to finish wins.

use crate::db::{DataStore, IntrospectedTable};
use crate::error::Result;
use crate::schema::descriptions::{
    column_description, relationship_description, table_description, table_examples,
};
use crate::schema::{ColumnSchema, RelationshipSchema, TableSchema};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

pub type SchemaMap = BTreeMap<String, TableSchema>;

struct CacheState {
    tables: Arc<SchemaMap>,
    /// `None` until the first successful refresh.
    last_refresh: Option<Instant>,
}

pub struct SchemaCache {
    store: Arc<dyn DataStore>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl SchemaCache {
    pub fn new(store: Arc<dyn DataStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: RwLock::new(CacheState { tables: Arc::new(SchemaMap::new()), last_refresh: None }),
        }
    }

    /// Current table map, refreshing first when forced or older than the TTL.
    pub async fn get_schema(&self, force_refresh: bool) -> Result<Arc<SchemaMap>> {
        {
            let state = self.state.read().await;
            let fresh = state
                .last_refresh
                .map(|at| at.elapsed() <= self.ttl)
                .unwrap_or(false);
            if fresh && !force_refresh {
                return Ok(Arc::clone(&state.tables));
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<Arc<SchemaMap>> {
        match self.store.introspect().await {
            Ok(introspected) => {
                let tables: SchemaMap = introspected
                    .into_iter()
                    .map(|t| (t.name.clone(), enrich(t)))
                    .collect();
                info!(tables = tables.len(), "schema refreshed");

                let tables = Arc::new(tables);
                let mut state = self.state.write().await;
                state.tables = Arc::clone(&tables);
                state.last_refresh = Some(Instant::now());
                Ok(tables)
            }
            Err(e) => {
                let state = self.state.read().await;
                if state.last_refresh.is_some() {
                    warn!(error = %e, "schema refresh failed, serving stale schema");
                    Ok(Arc::clone(&state.tables))
                } else {
                    Err(e)
                }
            }
        }
    }

    pub async fn table_info(&self, table: &str) -> Option<TableSchema> {
        self.state.read().await.tables.get(table).cloned()
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.state.read().await.tables.keys().cloned().collect()
    }

    /// Prompt-ready rendering of the (optionally filtered) schema.
    pub async fn format_schema(&self, filter: Option<&[String]>) -> Result<String> {
        let tables = self.get_schema(false).await?;
        Ok(format_tables(&tables, filter))
    }
}

fn enrich(table: IntrospectedTable) -> TableSchema {
    let name = table.name;
    let columns = table
        .columns
        .into_iter()
        .map(|c| ColumnSchema {
            description: column_description(&name, &c.name),
            name: c.name,
            data_type: c.data_type,
            is_nullable: c.is_nullable,
            is_primary_key: c.is_primary_key,
        })
        .collect();
    let relationships = table
        .foreign_keys
        .into_iter()
        .map(|fk| RelationshipSchema {
            description: relationship_description(&name, &fk.column),
            from_column: fk.column,
            target_table: fk.referenced_table,
            target_column: fk.referenced_column,
        })
        .collect();

    TableSchema {
        description: table_description(&name),
        examples: table_examples(&name),
        name,
        columns,
        relationships,
    }
}

/// Render tables for a prompt. With a filter, only the named tables appear and
/// relationships are kept only when their target is also included.
pub fn format_tables(tables: &SchemaMap, filter: Option<&[String]>) -> String {
    let included = |name: &str| filter.map_or(true, |f| f.iter().any(|t| t == name));
    let mut out = String::new();

    for table in tables.values().filter(|t| included(&t.name)) {
        let _ = writeln!(out, "Table: {}", table.name);
        let _ = writeln!(out, "Description: {}\n", table.description);

        out.push_str("Columns:\n");
        for col in &table.columns {
            let _ = writeln!(
                out,
                "  - {} ({}){}{}",
                col.name,
                col.data_type,
                if col.is_primary_key { " PRIMARY KEY" } else { "" },
                if col.is_nullable { " NULL" } else { " NOT NULL" },
            );
            if !col.description.is_empty() {
                let _ = writeln!(out, "    Description: {}", col.description);
            }
        }

        let relationships: Vec<_> = table
            .relationships
            .iter()
            .filter(|r| included(&r.target_table))
            .collect();
        if !relationships.is_empty() {
            out.push_str("\nRelationships:\n");
            for rel in relationships {
                let _ = writeln!(out, "  - {} -> {}.{}", rel.from_column, rel.target_table, rel.target_column);
                if !rel.description.is_empty() {
                    let _ = writeln!(out, "    Description: {}", rel.description);
                }
            }
        }

        if !table.examples.is_empty() {
            out.push_str("\nExample Queries:\n");
            for ex in &table.examples {
                let _ = writeln!(out, "  - {}:\n    {}", ex.description, ex.query);
            }
        }
        out.push('\n');
    }
    out
}
