//! Query Guards
//!
//! Deterministic checks applied to every statement right before it reaches
//! the data store, independent of the model-based validator.

use crate::error::{OttoError, Result};
use crate::execution::parameters::{contains_token, CURRENT_USER_TOKEN};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::warn;

pub struct QueryGuards {
    pub max_query_length: usize,
}

impl Default for QueryGuards {
    fn default() -> Self {
        Self { max_query_length: 20_000 }
    }
}

impl QueryGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `:name` outside string literals, quoted identifiers, comments,
    /// and dollar-quoted bodies must be the reserved token. The token itself
    /// may only appear as a bare value, since substitution supplies the quotes.
    /// Positional `$n` parameters are rejected outright.
    pub fn check_placeholders(&self, template: &str) -> Result<()> {
        let expected = &CURRENT_USER_TOKEN[1..];
        let chars: Vec<char> = template.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            if let Some(end) = opaque_span(&chars, i) {
                let span: String = chars[i..end].iter().collect();
                if contains_token(&span) {
                    return Err(reject(format!(
                        "{} must be used bare, not inside quotes or comments",
                        CURRENT_USER_TOKEN
                    )));
                }
                i = end;
                continue;
            }
            match chars[i] {
                ':' if chars.get(i + 1) == Some(&':') => i += 2,
                ':' if chars.get(i + 1).map_or(false, |c| c.is_alphabetic() || *c == '_') => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    if name != expected {
                        return Err(reject(format!(
                            "unsupported placeholder ':{}'; only {} is allowed",
                            name, CURRENT_USER_TOKEN
                        )));
                    }
                    i = end;
                }
                '$' if chars.get(i + 1).map_or(false, |c| c.is_ascii_digit()) => {
                    return Err(reject(format!(
                        "positional parameters are not supported; use {}",
                        CURRENT_USER_TOKEN
                    )));
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    /// The finalized SQL must parse as exactly one read-only query.
    pub fn check_statement(&self, sql: &str) -> Result<()> {
        if sql.len() > self.max_query_length {
            return Err(reject(format!(
                "query is {} bytes (max: {})",
                sql.len(),
                self.max_query_length
            )));
        }

        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| reject(format!("query could not be parsed: {}", e)))?;

        match statements.as_slice() {
            [Statement::Query(query)] => check_query(query),
            [_] => Err(reject("only SELECT statements are allowed".to_string())),
            [] => Err(reject("query is empty".to_string())),
            many => Err(reject(format!(
                "expected a single statement, found {}",
                many.len()
            ))),
        }
    }
}

/// End (exclusive) of the quoted literal, quoted identifier, comment, or
/// dollar-quoted body opening at `i`. Unterminated spans run to the end.
fn opaque_span(chars: &[char], i: usize) -> Option<usize> {
    match chars[i] {
        quote @ ('\'' | '"') => {
            let mut j = i + 1;
            while j < chars.len() {
                if chars[j] == quote {
                    if chars.get(j + 1) == Some(&quote) {
                        j += 2;
                        continue;
                    }
                    return Some(j + 1);
                }
                j += 1;
            }
            Some(chars.len())
        }
        '-' if chars.get(i + 1) == Some(&'-') => Some(
            chars[i..]
                .iter()
                .position(|c| *c == '\n')
                .map_or(chars.len(), |p| i + p + 1),
        ),
        '/' if chars.get(i + 1) == Some(&'*') => {
            Some(find(chars, i + 2, &['*', '/']).map_or(chars.len(), |p| p + 2))
        }
        '$' => {
            if chars.get(i + 1).map_or(false, |c| c.is_ascii_digit()) {
                return None;
            }
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            if chars.get(j) != Some(&'$') {
                return None;
            }
            let tag = &chars[i..=j];
            Some(find(chars, j + 1, tag).map_or(chars.len(), |p| p + tag.len()))
        }
        _ => None,
    }
}

fn find(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    chars
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn check_query(query: &Query) -> Result<()> {
    if !query.locks.is_empty() {
        return Err(reject("locking clauses are not allowed".to_string()));
    }
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(body: &SetExpr) -> Result<()> {
    match body {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err(reject("SELECT ... INTO is not allowed".to_string()));
            }
            Ok(())
        }
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        _ => Err(reject("only SELECT statements are allowed".to_string())),
    }
}

fn reject(reason: String) -> OttoError {
    warn!(reason = %reason, "query rejected by guard");
    OttoError::Guard(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_check_accepts_token_and_casts() {
        let guards = QueryGuards::new();
        assert!(guards
            .check_placeholders(r#"SELECT "createdAt"::date FROM "Tickets" WHERE "assigneeId" = :currentUserId"#)
            .is_ok());
        assert!(guards
            .check_placeholders("SELECT 'time: 10:30 :name' FROM \"Tickets\"")
            .is_ok());
    }

    #[test]
    fn test_placeholder_check_rejects_other_spellings() {
        let guards = QueryGuards::new();
        for sql in [
            "SELECT * FROM \"Tickets\" WHERE \"assigneeId\" = :current_user_id",
            "SELECT * FROM \"Tickets\" WHERE \"assigneeId\" = :userId",
            "SELECT * FROM \"Tickets\" WHERE \"assigneeId\" = $1",
        ] {
            let err = guards.check_placeholders(sql).unwrap_err();
            assert_eq!(err.error_type(), "guard_rejected", "{}", sql);
        }
    }

    #[test]
    fn test_quoted_token_is_rejected() {
        let guards = QueryGuards::new();
        for sql in [
            r#"SELECT "ticketId" FROM "Tickets" WHERE "assigneeId" = ':currentUserId'"#,
            r#"SELECT "ticketId" FROM "Tickets" WHERE "assigneeId" = ":currentUserId""#,
            r#"SELECT * FROM "Tickets" WHERE "subject" LIKE '%' || ':currentUserId' || '%'"#,
        ] {
            let err = guards.check_placeholders(sql).unwrap_err();
            assert!(matches!(err, OttoError::Guard(_)), "{}", sql);
        }
    }

    #[test]
    fn test_comments_and_dollar_bodies_are_skipped() {
        let guards = QueryGuards::new();
        for sql in [
            "SELECT * FROM \"Tickets\" -- filter on :assignee later\nWHERE \"assigneeId\" = :currentUserId",
            "SELECT /* :draft */ * FROM \"Tickets\" WHERE \"assigneeId\" = :currentUserId",
            "SELECT $$ :anything $$ AS note, $tag$ it's :here $tag$ FROM \"Tickets\"",
        ] {
            assert!(guards.check_placeholders(sql).is_ok(), "{}", sql);
        }
    }

    #[test]
    fn test_token_hidden_in_comment_or_dollar_body_is_rejected() {
        let guards = QueryGuards::new();
        for sql in [
            "SELECT * FROM \"Tickets\" -- :currentUserId\n",
            "SELECT /* :currentUserId */ 1",
            "SELECT $q$:currentUserId$q$",
        ] {
            assert!(guards.check_placeholders(sql).is_err(), "{}", sql);
        }
    }

    #[test]
    fn test_statement_guard_allows_reads() {
        let guards = QueryGuards::new();
        for sql in [
            r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = 'u1'"#,
            r#"WITH mine AS (SELECT * FROM "Tickets" WHERE "assigneeId" = 'u1') SELECT status, COUNT(*) FROM mine GROUP BY status"#,
            r#"SELECT "ticketId" FROM "Tickets" UNION SELECT "ticketId" FROM "TicketComments""#,
            r#"SELECT * FROM "Tickets";"#,
        ] {
            assert!(guards.check_statement(sql).is_ok(), "{}", sql);
        }
    }

    #[test]
    fn test_statement_guard_rejects_writes_and_batches() {
        let guards = QueryGuards::new();
        for sql in [
            r#"DELETE FROM "Tickets""#,
            r#"UPDATE "Tickets" SET status = 'closed'"#,
            r#"SELECT 1; DROP TABLE "Tickets""#,
            r#"SELECT * INTO backup FROM "Tickets""#,
            r#"SELECT * FROM "Tickets" FOR UPDATE"#,
            "",
            "NOT SQL AT ALL",
        ] {
            let err = guards.check_statement(sql).unwrap_err();
            assert!(matches!(err, OttoError::Guard(_)), "{}", sql);
        }
    }

    #[test]
    fn test_statement_guard_length_limit() {
        let guards = QueryGuards { max_query_length: 16 };
        assert!(guards.check_statement("SELECT * FROM \"Tickets\"").is_err());
    }
}
