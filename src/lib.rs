pub mod agent;
pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod function_schema;
pub mod llm;
pub mod schema;
pub mod security;
pub mod tools;

pub use agent::{Message, OttoResponse, OttoServices, OttoSystem, QueryContext};
pub use config::{DataStoreConfig, OttoConfig};
pub use error::{OttoError, Result};
pub use execution::UserIdentity;
