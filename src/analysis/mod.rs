//! Question analysis: table relevance, query planning, and SQL review.

pub mod column_fixer;
pub mod plan;
pub mod query_analyzer;
pub mod query_validator;
pub mod table_analyzer;

pub use column_fixer::fix_column_names;
pub use plan::{DateRange, Filters, QueryPlan, TicketPriority, TicketStatus, TicketType, ValidationResult};
pub use query_analyzer::{normalize_question, QueryAnalyzer};
pub use query_validator::QueryValidator;
pub use table_analyzer::{TableAnalysis, TableInfo, TableRelevanceAnalyzer};
