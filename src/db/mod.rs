//! Data-store boundary
//!
//! Exactly two capabilities are used by the agent: the "execute raw query"
//! procedure and schema metadata introspection.

pub mod connection;
pub mod data_store;
pub mod pg_store;
pub mod rpc_store;

pub use connection::{init_pool, DbPool};
pub use data_store::{
    quote_literal, DataStore, IntrospectedColumn, IntrospectedForeignKey, IntrospectedTable,
};
pub use pg_store::PgDataStore;
pub use rpc_store::RpcDataStore;
