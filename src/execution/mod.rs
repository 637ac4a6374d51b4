//! Parameter binding and statement execution.

pub mod executor;
pub mod parameters;

pub use executor::{
    ExecutionEnvelope, ExecutionFailure, ExecutionSuccess, FailureMetadata, QueryExecutor,
    SuccessMetadata,
};
pub use parameters::{substitute, UserIdentity, CURRENT_USER_TOKEN};
