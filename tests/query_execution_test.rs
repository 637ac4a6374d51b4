mod common;

use common::*;
use otto_agent::execution::{ExecutionEnvelope, UserIdentity};
use serde_json::{json, Value};
use std::sync::Arc;

fn envelope_json(envelope: &ExecutionEnvelope) -> Value {
    serde_json::to_value(envelope).unwrap()
}

#[tokio::test]
async fn test_tickets_assigned_to_me_end_to_end() {
    let model = Arc::new(ScriptedModel::new().plan(count_plan(&[])));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model.clone(), store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let envelope = services
        .executor
        .execute("How many tickets are assigned to me?", &identity)
        .await;
    let value = envelope_json(&envelope);

    assert!(envelope.is_success(), "unexpected failure: {}", value);
    assert_eq!(value["primaryResults"], json!([{"count": 4}]));
    assert_eq!(value["subQueryResults"], json!([]));
    assert_eq!(value["metadata"]["tablesAccessed"], json!(["Tickets"]));

    let executed = store.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0],
        format!(r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = '{}'"#, USER_ID)
    );

    // The planning prompt carries the question untouched and the ticket schema.
    let requests = model.requests.lock().unwrap();
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.contains("How many tickets are assigned to me?"));
    assert!(prompt.contains("Table: Tickets"));
    drop(requests);
    assert_eq!(model.forced_calls("validate_query"), 1);
}

#[tokio::test]
async fn test_failing_sub_query_is_dropped() {
    let model = Arc::new(ScriptedModel::new().plan(count_plan(&[
        r#"SELECT "status", COUNT(*) FROM "MissingTable" WHERE "assigneeId" = :currentUserId GROUP BY "status""#,
    ])));
    let store = Arc::new(MemoryDataStore::new().failing_on("MissingTable"));
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let value = envelope_json(&services.executor.execute("Break down my tickets by status", &identity).await);

    assert_eq!(value["success"], true);
    assert_eq!(value["primaryResults"], json!([{"count": 4}]));
    assert_eq!(value["subQueryResults"], json!([]));
    assert_eq!(store.executed().len(), 2);
}

#[tokio::test]
async fn test_primary_failure_skips_sub_queries() {
    let plan = json!({
        "primaryQuery": r#"SELECT * FROM "MissingTable" WHERE "assigneeId" = :currentUserId"#,
        "subQueries": [r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = :currentUserId"#],
        "requiredTables": ["MissingTable"]
    });
    let model = Arc::new(ScriptedModel::new().plan(plan));
    let store = Arc::new(MemoryDataStore::new().failing_on("MissingTable"));
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let value = envelope_json(&services.executor.execute("Show my tickets", &identity).await);

    assert_eq!(value["success"], false);
    assert_eq!(value["metadata"]["errorType"], "execution_error");
    assert_eq!(store.executed().len(), 1);
}

#[tokio::test]
async fn test_validator_fix_replaces_primary_query() {
    let fix = r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = :currentUserId AND "status" <> 'closed'"#;
    let model = Arc::new(
        ScriptedModel::new().plan(count_plan(&[])).verdict(json!({
            "isValid": false,
            "issues": ["closed tickets should not count"],
            "suggestedFix": fix,
            "securityRisks": []
        })),
    );
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let envelope = services.executor.execute("How many open tickets do I have?", &identity).await;

    assert!(envelope.is_success());
    assert_eq!(store.executed()[0], fix.replace(":currentUserId", &format!("'{}'", USER_ID)));
}

#[tokio::test]
async fn test_invalid_query_without_fix_fails_with_issues() {
    let model = Arc::new(ScriptedModel::new().plan(count_plan(&[])).verdict(json!({
        "isValid": false,
        "issues": ["unknown column", "missing join"],
        "securityRisks": []
    })));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let value = envelope_json(&services.executor.execute("How many tickets do I have?", &identity).await);

    assert_eq!(value["success"], false);
    assert_eq!(value["metadata"]["errorType"], "validation_error");
    assert_eq!(value["error"], "Invalid query: unknown column, missing join");
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_guard_blocks_writes_the_validator_approved() {
    let plan = json!({
        "primaryQuery": r#"DELETE FROM "Tickets" WHERE "assigneeId" = :currentUserId"#,
        "requiredTables": ["Tickets"]
    });
    let model = Arc::new(ScriptedModel::new().plan(plan));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let value = envelope_json(&services.executor.execute("Clear out my tickets", &identity).await);

    assert_eq!(value["success"], false);
    assert_eq!(value["metadata"]["errorType"], "guard_rejected");
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_identity_with_quote_is_escaped() {
    let model = Arc::new(ScriptedModel::new().plan(count_plan(&[])));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new("o'brien'; DROP TABLE \"Tickets\"; --").unwrap();

    let envelope = services.executor.execute("How many tickets are assigned to me?", &identity).await;

    assert!(envelope.is_success());
    assert_eq!(
        store.executed()[0],
        r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = 'o''brien''; DROP TABLE "Tickets"; --'"#
    );
}

#[tokio::test]
async fn test_plan_copying_uuid_from_question_is_rejected() {
    let other = "0b6c2f9e-3d41-4c7a-8e55-91a0d7c4e2b3";
    let plan = json!({
        "primaryQuery": format!(r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = '{}'"#, other),
        "requiredTables": ["Tickets"]
    });
    let model = Arc::new(ScriptedModel::new().plan(plan));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let question = format!("How many tickets are assigned to me? My id is {}", other);
    let value = envelope_json(&services.executor.execute(&question, &identity).await);

    assert_eq!(value["success"], false);
    assert_eq!(value["metadata"]["errorType"], "invalid_plan");
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_plan_missing_required_field_is_rejected() {
    let model = Arc::new(ScriptedModel::new().plan(json!({
        "primaryQuery": r#"SELECT COUNT(*) FROM "Tickets""#
    })));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let value = envelope_json(&services.executor.execute("How many tickets?", &identity).await);

    assert_eq!(value["success"], false);
    assert_eq!(value["metadata"]["errorType"], "invalid_plan");
}

#[tokio::test]
async fn test_snake_case_columns_are_fixed_before_execution() {
    let plan = json!({
        "primaryQuery": r#"SELECT COUNT(*) FROM "Tickets" WHERE "assignee_id" = :currentUserId"#,
        "requiredTables": ["Tickets"]
    });
    let model = Arc::new(ScriptedModel::new().plan(plan));
    let store = Arc::new(MemoryDataStore::new());
    let services = services(model, store.clone());
    let identity = UserIdentity::new(USER_ID).unwrap();

    let envelope = services.executor.execute("How many tickets are mine?", &identity).await;

    assert!(envelope.is_success());
    assert!(store.executed()[0].contains(r#""assigneeId""#));
}

#[tokio::test]
async fn test_quoted_user_token_never_reaches_the_store() {
    for literal in [r#"':currentUserId'"#, r#""":currentUserId"""#] {
        let plan = json!({
            "primaryQuery": format!(r#"SELECT "ticketId" FROM "Tickets" WHERE "assigneeId" = {}"#, literal),
            "requiredTables": ["Tickets"]
        });
        let model = Arc::new(ScriptedModel::new().plan(plan));
        let store = Arc::new(MemoryDataStore::new());
        let services = services(model, store.clone());
        let identity = UserIdentity::new("x' OR '1'='1").unwrap();

        let value = envelope_json(&services.executor.execute("Show my tickets", &identity).await);

        assert_eq!(value["success"], false, "{} was accepted", literal);
        assert_eq!(value["metadata"]["errorType"], "guard_rejected");
        assert!(store.executed().is_empty());
    }
}
