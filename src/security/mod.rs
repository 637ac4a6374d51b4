pub mod query_guards;

pub use query_guards::*;
