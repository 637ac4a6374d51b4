mod common;

use common::*;
use otto_agent::execution::UserIdentity;
use otto_agent::llm::ChatReply;
use otto_agent::tools::{AnalyzeTablesTool, ExecuteSqlTool, FilterSchemaTool, Tool, WriteSqlTool};
use serde_json::{json, Value};
use std::sync::Arc;

async fn run(tool: &dyn Tool, args: Value) -> Value {
    let body = tool.execute(args).await.unwrap();
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn test_execute_sql_runs_the_validator_fix() {
    let fix = r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = :currentUserId AND "status" = 'open'"#;
    let model = Arc::new(ScriptedModel::new().verdict(json!({
        "isValid": false,
        "issues": ["status filter missing"],
        "suggestedFix": fix,
        "securityRisks": []
    })));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model.clone(), store.clone());
    let tool = ExecuteSqlTool::new(services.executor.clone(), UserIdentity::new(USER_ID).unwrap());

    let body = run(
        &tool,
        json!({"sql": r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = :currentUserId"#}),
    )
    .await;

    assert_eq!(body["success"], true);
    assert_eq!(body["result"], json!([{"count": 4}]));
    assert_eq!(store.executed(), vec![fix.replace(":currentUserId", &format!("'{}'", USER_ID))]);
    assert_eq!(model.forced_calls("validate_query"), 1);
}

#[tokio::test]
async fn test_execute_sql_refuses_writes() {
    let store = Arc::new(MemoryDataStore::new());
    let services = services(Arc::new(ScriptedModel::new()), store.clone());
    let tool = ExecuteSqlTool::new(services.executor.clone(), UserIdentity::new(USER_ID).unwrap());

    let body = run(&tool, json!({"sql": r#"DELETE FROM "Tickets" WHERE "assigneeId" = :currentUserId"#})).await;

    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("rejected by guard"));
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_execute_sql_refuses_quoted_user_token() {
    let store = Arc::new(MemoryDataStore::new());
    let services = services(Arc::new(ScriptedModel::new()), store.clone());
    let tool = ExecuteSqlTool::new(services.executor.clone(), UserIdentity::new("a' OR 'a'='a").unwrap());

    let body = run(&tool, json!({"sql": r#"SELECT * FROM "Tickets" WHERE "assigneeId" = ':currentUserId'"#})).await;

    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("must be used bare"));
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_execute_sql_missing_argument_is_an_error() {
    let services = services(Arc::new(ScriptedModel::new()), Arc::new(MemoryDataStore::new()));
    let tool = ExecuteSqlTool::new(services.executor.clone(), UserIdentity::new(USER_ID).unwrap());

    assert!(tool.execute(json!({"query": "SELECT 1"})).await.is_err());
}

#[tokio::test]
async fn test_write_sql_extracts_and_fixes_columns() {
    let reply = "Here:\nSELECT ticket_id FROM \"Tickets\"\nWHERE assignee_id = :currentUserId\n\nDone";
    let model = Arc::new(ScriptedModel::new().turn(ChatReply::text(reply)));
    let tool = WriteSqlTool::new(model.clone());

    let body = run(
        &tool,
        json!({"query": "Which tickets are mine?", "filteredSchema": "Table: Tickets"}),
    )
    .await;

    assert_eq!(body["success"], true);
    assert_eq!(body["sql"], r#"SELECT ticketId FROM "Tickets" WHERE assigneeId = :currentUserId"#);

    let requests = model.requests.lock().unwrap();
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.contains("Which tickets are mine?"));
    assert!(prompt.contains("Table: Tickets"));
    assert!(prompt.contains("Never wrap it in quotes"));
}

#[tokio::test]
async fn test_filter_schema_returns_relevant_tables() {
    let services = services(Arc::new(ScriptedModel::new()), Arc::new(MemoryDataStore::new()));
    let tool = FilterSchemaTool::new(services.schema.clone(), services.tables.clone());

    let body = run(&tool, json!({"query": "Show my tickets"})).await;

    assert_eq!(body["success"], true);
    let relevant: Vec<String> = serde_json::from_value(body["relevantTables"].clone()).unwrap();
    assert!(relevant.contains(&"Tickets".to_string()));
    assert!(relevant.contains(&"UserProfiles".to_string()));
    let schema = body["schema"].as_str().unwrap();
    assert!(schema.contains("Table: Tickets"));
    assert!(schema.contains("Table: UserProfiles"));
}

#[tokio::test]
async fn test_analyze_tables_without_related_keeps_agreed_tables() {
    let model = Arc::new(ScriptedModel::new().turn(ChatReply::text(r#"["Tickets", "KBArticles"]"#)));
    let services = services(model, Arc::new(MemoryDataStore::new()));
    let tool = AnalyzeTablesTool::new(services.tables.clone());

    let body = run(&tool, json!({"query": "Show my tickets", "includeRelatedTables": false})).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["tables"], json!(["Tickets"]));
    assert_eq!(body["llmMatches"], json!(["Tickets", "KBArticles"]));
}

#[tokio::test]
async fn test_analyze_tables_with_related_merges_both_passes() {
    let model = Arc::new(ScriptedModel::new().turn(ChatReply::text(r#"["Tickets", "KBArticles"]"#)));
    let services = services(model, Arc::new(MemoryDataStore::new()));
    let tool = AnalyzeTablesTool::new(services.tables.clone());

    let body = run(&tool, json!({"query": "Show my tickets"})).await;

    let tables: Vec<String> = serde_json::from_value(body["tables"].clone()).unwrap();
    assert_eq!(&tables[..2], &["Tickets".to_string(), "KBArticles".to_string()]);
    assert!(tables.contains(&"TicketComments".to_string()));
}
