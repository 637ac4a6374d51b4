//! Rewrites known snake_case column spellings to the canonical camelCase
//! names used by the schema.

use regex::{Captures, Regex};
use std::collections::HashMap;

const COLUMN_FIXES: &[(&str, &str)] = &[
    ("assignee_id", "assigneeId"),
    ("user_id", "userId"),
    ("ticket_id", "ticketId"),
    ("account_id", "accountId"),
    ("created_at", "createdAt"),
    ("updated_at", "updatedAt"),
    ("company_id", "accountId"),
    ("companyId", "accountId"),
    ("organization_id", "organizationId"),
    ("org_id", "organizationId"),
    ("group_id", "groupId"),
    ("brand_id", "brandId"),
    ("role_id", "roleId"),
    ("requester_id", "requesterId"),
    ("submitter_id", "submitterId"),
    ("macro_id", "macroId"),
    ("category_id", "categoryId"),
    ("channel_id", "channelId"),
    ("permission_id", "permissionId"),
    ("tag_id", "tagId"),
    ("solved_at", "solvedAt"),
    ("closed_at", "closedAt"),
    ("due_date", "dueDate"),
    ("last_read_at", "lastReadAt"),
    ("read_at", "readAt"),
    ("first_response_at", "firstResponseAt"),
    ("is_active", "isActive"),
    ("is_default", "isDefault"),
    ("is_enabled", "isEnabled"),
    ("is_shared", "isShared"),
    ("is_public", "isPublic"),
    ("is_suspended", "isSuspended"),
    ("is_verified", "isVerified"),
    ("is_online", "isOnline"),
    ("is_enterprise", "isEnterpriseOnly"),
    ("is_staff", "isStaffRole"),
    ("is_personal", "isPersonal"),
];

lazy_static::lazy_static! {
    static ref FIX_MAP: HashMap<&'static str, &'static str> = COLUMN_FIXES.iter().copied().collect();

    static ref FIX_RE: Regex = {
        let mut names: Vec<&str> = COLUMN_FIXES.iter().map(|(from, _)| *from).collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        Regex::new(&format!(r"\b(?:{})\b", names.join("|"))).expect("valid column fixer regex")
    };
}

/// Single pass over `sql`; whole identifiers only, so the result is stable
/// under repeated application.
pub fn fix_column_names(sql: &str) -> String {
    FIX_RE
        .replace_all(sql, |caps: &Captures| {
            let found = &caps[0];
            FIX_MAP.get(found).copied().unwrap_or(found).to_string()
        })
        .into_owned()
}
