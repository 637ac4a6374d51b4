use crate::agent::metrics::AgentMetrics;
use crate::analysis::{QueryAnalyzer, QueryValidator, TableRelevanceAnalyzer};
use crate::config::{DataStoreConfig, OttoConfig};
use crate::db::{init_pool, DataStore, PgDataStore, RpcDataStore};
use crate::error::Result;
use crate::execution::{QueryExecutor, UserIdentity};
use crate::llm::{ChatModel, LlmClient};
use crate::schema::cache::SchemaCache;
use crate::tools::{
    AnalyzeTablesTool, CurrentTimeTool, DatabaseQueryTool, ExecuteSqlTool, FilterSchemaTool,
    ToolRegistry, WriteSqlTool,
};
use std::sync::Arc;
use tracing::info;

/// Everything shared across callers: one model client, one data store and
/// one schema cache per process.
pub struct OttoServices {
    pub config: OttoConfig,
    pub model: Arc<dyn ChatModel>,
    pub store: Arc<dyn DataStore>,
    pub schema: Arc<SchemaCache>,
    pub tables: Arc<TableRelevanceAnalyzer>,
    pub analyzer: Arc<QueryAnalyzer>,
    pub validator: Arc<QueryValidator>,
    pub executor: Arc<QueryExecutor>,
    pub metrics: Arc<AgentMetrics>,
}

impl OttoServices {
    pub fn new(config: OttoConfig, model: Arc<dyn ChatModel>, store: Arc<dyn DataStore>) -> Self {
        let schema = Arc::new(SchemaCache::new(store.clone(), config.schema_ttl));
        let tables = Arc::new(TableRelevanceAnalyzer::new(model.clone()));
        let analyzer = Arc::new(QueryAnalyzer::new(model.clone(), schema.clone(), tables.clone()));
        let validator = Arc::new(QueryValidator::new(model.clone()));
        let executor = Arc::new(QueryExecutor::new(analyzer.clone(), validator.clone(), store.clone()));

        Self {
            config,
            model,
            store,
            schema,
            tables,
            analyzer,
            validator,
            executor,
            metrics: Arc::new(AgentMetrics::new()),
        }
    }

    /// Connect the hosted model and the configured data store.
    pub async fn from_config(config: OttoConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(LlmClient::new(
            config.openai_api_key.clone(),
            config.model.clone(),
            config.openai_base_url.clone(),
            config.request_timeout,
        )?);

        let store: Arc<dyn DataStore> = match &config.data_store {
            DataStoreConfig::Rpc { project_url, service_key } => {
                info!(url = %project_url, "using RPC data store");
                Arc::new(RpcDataStore::new(
                    project_url.clone(),
                    service_key.clone(),
                    config.request_timeout,
                )?)
            }
            DataStoreConfig::Postgres { database_url } => {
                let pool = init_pool(database_url, config.request_timeout).await?;
                info!("using Postgres data store");
                Arc::new(PgDataStore::new(pool))
            }
        };

        Ok(Self::new(config, model, store))
    }

    /// Tools bound to one caller. `currentTime` and `databaseQuery` are always
    /// present; the raw SQL tools only when enabled in config.
    pub fn tool_registry(&self, identity: &UserIdentity) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CurrentTimeTool));
        registry.register(Arc::new(DatabaseQueryTool::new(self.executor.clone(), identity.clone())));

        if self.config.sql_tools {
            registry.register(Arc::new(FilterSchemaTool::new(self.schema.clone(), self.tables.clone())));
            registry.register(Arc::new(AnalyzeTablesTool::new(self.tables.clone())));
            registry.register(Arc::new(WriteSqlTool::new(self.model.clone())));
            registry.register(Arc::new(ExecuteSqlTool::new(self.executor.clone(), identity.clone())));
        }
        registry
    }
}
