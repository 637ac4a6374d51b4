//! Static business descriptions layered over the introspected schema.
//!
//! These only help the model read the schema; nothing depends on them for
//! correctness. Unknown names resolve to an empty description.

use crate::execution::parameters::CURRENT_USER_TOKEN;
use crate::schema::TableExample;
use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref TABLE_DESCRIPTIONS: HashMap<&'static str, &'static str> = HashMap::from([
        (
            "Tickets",
            "Central table for managing support tickets. Each record represents a support \
             request, incident, problem, or task that needs attention. For staff users, tickets \
             are work items assigned to them or their groups for resolution. For regular users, \
             tickets are support requests they have submitted. Tickets can be linked to problems \
             (for incident tickets) and can be either public or private.",
        ),
    ]);

    static ref TICKET_COLUMNS: HashMap<&'static str, &'static str> = HashMap::from([
        ("ticketId", "Unique identifier for the ticket"),
        ("accountId", "ID of the account this ticket belongs to"),
        ("brandId", "ID of the brand this ticket is associated with"),
        ("requesterId", "ID of the user who needs help (the end-user/customer requesting support)"),
        (
            "submitterId",
            "ID of the user who actually created the ticket (might differ from requester if created on behalf of someone)",
        ),
        (
            "assigneeId",
            "ID of the staff member assigned to handle this ticket. For staff users querying their tickets, this is typically the most relevant field.",
        ),
        (
            "assigneeGroupId",
            "ID of the group assigned to handle this ticket. A ticket is assigned to an individual or a group, not both.",
        ),
        ("subject", "Brief summary or title of the ticket (limited to 150 characters)"),
        ("description", "Detailed explanation of the issue, request, or task"),
        ("status", "Current state of the ticket (new, open, pending, on_hold, solved, closed)"),
        ("type", "Category of the ticket (question, incident, problem, task)"),
        ("priority", "Urgency level of the ticket (low, normal, high, urgent)"),
        ("dueDate", "When the ticket needs to be completed by (primarily used for tasks)"),
        ("isShared", "Whether the ticket is shared with other organizations"),
        ("isPublic", "Whether the ticket is visible to end-users"),
        (
            "problemTicketId",
            "For incident tickets, links to the problem ticket that tracks the underlying issue",
        ),
        ("createdAt", "When the ticket was created"),
        ("updatedAt", "When the ticket was last modified"),
        ("solvedAt", "When the ticket was marked as solved"),
        ("closedAt", "When the ticket was closed"),
        ("ticketNumber", "Sequential identifier for the ticket, unique within the account"),
    ]);

    static ref TICKET_RELATIONSHIPS: HashMap<&'static str, &'static str> = HashMap::from([
        (
            "accountId",
            "Links to the organization/account that owns this ticket. Used for multi-tenant support and access control.",
        ),
        (
            "brandId",
            "Links to the brand this ticket belongs to, determining the support portal and branding context.",
        ),
        (
            "requesterId",
            "Links to the user who needs help. Connects the ticket to the customer who needs support.",
        ),
        (
            "submitterId",
            "Links to the user who created the ticket, which might differ from the requester.",
        ),
        (
            "assigneeId",
            "Links to the staff member assigned to resolve the ticket.",
        ),
        (
            "assigneeGroupId",
            "Links to the group assigned to handle the ticket instead of an individual staff member.",
        ),
        (
            "problemTicketId",
            "For incident tickets, links to the problem ticket that tracks the root cause.",
        ),
    ]);
}

pub fn table_description(table: &str) -> String {
    TABLE_DESCRIPTIONS.get(table).copied().unwrap_or_default().to_string()
}

pub fn column_description(table: &str, column: &str) -> String {
    let columns: Option<&HashMap<&str, &str>> = match table {
        "Tickets" => Some(&*TICKET_COLUMNS),
        _ => None,
    };
    lookup(columns, column)
}

pub fn relationship_description(table: &str, column: &str) -> String {
    let relationships: Option<&HashMap<&str, &str>> = match table {
        "Tickets" => Some(&*TICKET_RELATIONSHIPS),
        _ => None,
    };
    lookup(relationships, column)
}

fn lookup(map: Option<&HashMap<&str, &str>>, key: &str) -> String {
    map.and_then(|m| m.get(key)).copied().unwrap_or_default().to_string()
}

/// Canonical example queries for a table, written against the reserved token.
pub fn table_examples(table: &str) -> Vec<TableExample> {
    match table {
        "Tickets" => vec![
            example(
                "Count tickets assigned to current staff user",
                format!(r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = {}"#, CURRENT_USER_TOKEN),
            ),
            example(
                "Count tickets submitted by current user",
                format!(r#"SELECT COUNT(*) FROM "Tickets" WHERE "requesterId" = {}"#, CURRENT_USER_TOKEN),
            ),
            example(
                "Count tickets assigned to current user's group",
                format!(
                    r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeGroupId" IN (SELECT "groupId" FROM "UserGroups" WHERE "userId" = {})"#,
                    CURRENT_USER_TOKEN
                ),
            ),
        ],
        _ => Vec::new(),
    }
}

fn example(description: &str, query: String) -> TableExample {
    TableExample { description: description.to_string(), query }
}
