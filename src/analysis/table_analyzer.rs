//! Table relevance analysis
//!
//! Narrows the catalog to the tables a question plausibly needs. A
//! deterministic keyword pass is merged with one model classification call;
//! the model pass is optional and its failure only costs precision.

use crate::llm::{ChatModel, ChatRequest};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use strsim::jaro_winkler;
use tracing::{debug, warn};

const TABLE_DOCUMENTATION: &str = include_str!("table_catalog.md");

/// Catalog names closer than this to a model-returned name are taken as a match.
const NAME_SIMILARITY_THRESHOLD: f64 = 0.92;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("ticket", &["issue", "case", "request", "incident", "problem", "task"]),
    ("user", &["agent", "staff", "customer", "person", "member"]),
    ("organization", &["org", "company", "business", "enterprise"]),
    ("comment", &["note", "reply", "response", "message"]),
    ("attachment", &["file", "document", "upload"]),
    ("article", &["post", "entry", "document", "guide", "tutorial"]),
];

const RELATED_TABLES: &[(&str, &[&str])] = &[
    ("Tickets", &["TicketComments", "TicketAttachments", "UserProfiles"]),
    ("UserProfiles", &["Organizations", "Groups"]),
    ("KBArticles", &["KBSections", "KBCategories"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub description: String,
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableAnalysis {
    pub tables: Vec<String>,
    pub keyword_matches: Vec<String>,
    pub llm_matches: Vec<String>,
}

pub struct TableRelevanceAnalyzer {
    model: Arc<dyn ChatModel>,
    catalog: Vec<TableInfo>,
}

impl TableRelevanceAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, catalog: parse_catalog(TABLE_DOCUMENTATION) }
    }

    pub fn catalog(&self) -> &[TableInfo] {
        &self.catalog
    }

    pub async fn analyze(&self, question: &str) -> TableAnalysis {
        self.analyze_with(question, true).await
    }

    /// With `include_related` off, only tables found by both passes are kept.
    pub async fn analyze_with(&self, question: &str, include_related: bool) -> TableAnalysis {
        let keyword_matches = self.keyword_matches(question);

        let llm_matches = match self.classify(question).await {
            Some(matches) => matches,
            None => {
                return TableAnalysis {
                    tables: keyword_matches.clone(),
                    keyword_matches,
                    llm_matches: Vec::new(),
                }
            }
        };

        let tables = if include_related {
            llm_matches
                .iter()
                .chain(keyword_matches.iter())
                .unique()
                .cloned()
                .collect()
        } else {
            llm_matches
                .iter()
                .filter(|t| keyword_matches.contains(*t))
                .cloned()
                .collect()
        };

        TableAnalysis { tables, keyword_matches, llm_matches }
    }

    /// Keyword and synonym hits in catalog order, then one hop of related tables.
    pub fn keyword_matches(&self, question: &str) -> Vec<String> {
        let tokens = tokenize(question);
        let mut matched: Vec<String> = self
            .catalog
            .iter()
            .filter(|t| t.keywords.iter().any(|k| contains_phrase(&tokens, k)))
            .map(|t| t.name.clone())
            .collect();

        let direct = matched.clone();
        for table in &direct {
            if let Some((_, related)) = RELATED_TABLES.iter().find(|(name, _)| *name == table.as_str()) {
                for r in related.iter() {
                    if !matched.iter().any(|m| m == r) {
                        matched.push(r.to_string());
                    }
                }
            }
        }
        matched
    }

    /// Tables whose schema should be shown when planning SQL for `question`.
    /// Tickets is always present; first-person questions add UserProfiles.
    pub fn schema_tables(&self, question: &str) -> Vec<String> {
        let mut tables = self.keyword_matches(question);
        let tokens = tokenize(question);
        let personal = tokens
            .iter()
            .any(|t| matches!(t.as_str(), "i" | "me" | "my" | "assigned"));

        for (needed, table) in [(true, "Tickets"), (personal, "UserProfiles")] {
            if needed && !tables.iter().any(|t| t == table) {
                tables.push(table.to_string());
            }
        }
        tables
    }

    async fn classify(&self, question: &str) -> Option<Vec<String>> {
        let catalog = self
            .catalog
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .join("\n");
        let prompt = format!(
            "Given the following user query and available database tables, determine which tables are most relevant for answering the query.\n\
             Consider both direct mentions and implied needs based on the query context.\n\n\
             User Query: {}\n\n\
             Available Tables:\n{}\n\n\
             Return only a JSON array of table names, ordered by relevance. Include tables needed for common joins.\n\
             Example: [\"Tickets\", \"UserProfiles\", \"Organizations\"]",
            question, catalog
        );

        let reply = match self.model.complete(ChatRequest::prompt(prompt, 0.0)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "table classification call failed, using keyword matches");
                return None;
            }
        };

        let content = reply.content.unwrap_or_default();
        let names = match parse_name_array(&content) {
            Some(names) => names,
            None => {
                warn!("table classification reply was not a JSON array, using keyword matches");
                return None;
            }
        };
        let resolved: Vec<String> = names
            .iter()
            .filter_map(|n| self.resolve_name(n))
            .unique()
            .collect();
        debug!(?resolved, "model table matches");
        Some(resolved)
    }

    /// Map a model-returned name onto the catalog.
    fn resolve_name(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if let Some(exact) = self.catalog.iter().find(|t| t.name.eq_ignore_ascii_case(name)) {
            return Some(exact.name.clone());
        }
        let (best, score) = self
            .catalog
            .iter()
            .map(|t| (t, jaro_winkler(&t.name.to_lowercase(), &name.to_lowercase())))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if score >= NAME_SIMILARITY_THRESHOLD {
            Some(best.name.clone())
        } else {
            debug!(name, "dropping unknown table name from model");
            None
        }
    }
}

fn parse_name_array(content: &str) -> Option<Vec<String>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(words.len())
        .any(|w| w.iter().zip(&words).all(|(a, b)| a == b))
}

fn split_camel(name: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let next = chars.get(i + 1).copied();
        // A trailing plural "s" after an acronym does not start a new word.
        let plural_tail = next == Some('s') && i + 2 == chars.len();
        let boundary = i > 0
            && c.is_uppercase()
            && (chars[i - 1].is_lowercase()
                || (next.map_or(false, |n| n.is_lowercase()) && !plural_tail));
        if boundary {
            out.push(' ');
        }
        out.push(*c);
    }
    out
}

fn generate_keywords(table: &str) -> Vec<String> {
    let spaced = split_camel(table).to_lowercase();
    let mut keywords = vec![spaced.clone(), table.to_lowercase()];
    match spaced.strip_suffix('s') {
        Some(singular) => keywords.push(singular.to_string()),
        None => keywords.push(format!("{}s", spaced)),
    }

    let lower = table.to_lowercase();
    for (base, variations) in SYNONYMS {
        if lower.contains(base) {
            keywords.extend(variations.iter().map(|v| v.to_string()));
        }
    }
    keywords.into_iter().unique().collect()
}

/// Parse `## Category` / `### Table` markdown into catalog entries.
pub fn parse_catalog(doc: &str) -> Vec<TableInfo> {
    let mut catalog = Vec::new();
    let mut category = String::new();
    let mut current: Option<TableInfo> = None;

    for line in doc.lines() {
        if let Some(name) = line.strip_prefix("### ") {
            catalog.extend(current.take());
            let name = name.trim().to_string();
            current = Some(TableInfo {
                keywords: generate_keywords(&name),
                name,
                description: String::new(),
                category: category.clone(),
            });
        } else if let Some(cat) = line.strip_prefix("## ") {
            catalog.extend(current.take());
            category = cat.trim().to_string();
        } else if let Some(table) = current.as_mut() {
            let text = line.trim();
            if !text.is_empty() {
                if !table.description.is_empty() {
                    table.description.push(' ');
                }
                table.description.push_str(text);
            }
        }
    }
    catalog.extend(current);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OttoError, Result};
    use crate::llm::ChatReply;
    use async_trait::async_trait;

    struct FixedModel(Option<&'static str>);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatReply> {
            match self.0 {
                Some(text) => Ok(ChatReply::text(text)),
                None => Err(OttoError::Llm("rate limited".to_string())),
            }
        }
    }

    fn analyzer(reply: Option<&'static str>) -> TableRelevanceAnalyzer {
        TableRelevanceAnalyzer::new(Arc::new(FixedModel(reply)))
    }

    #[test]
    fn test_catalog_parsing() {
        let a = analyzer(None);
        let tickets = a.catalog().iter().find(|t| t.name == "Tickets").unwrap();
        assert_eq!(tickets.category, "Ticket Management");
        assert!(tickets.description.starts_with("Central table"));
        assert!(tickets.keywords.contains(&"ticket".to_string()));
        assert!(tickets.keywords.contains(&"issue".to_string()));

        let comments = a.catalog().iter().find(|t| t.name == "TicketComments").unwrap();
        assert!(comments.keywords.contains(&"ticket comments".to_string()));
        assert!(a.catalog().iter().any(|t| t.name == "AuditLogs"));
        assert!(a.catalog().iter().any(|t| t.name == "KBArticles"));
    }

    #[test]
    fn test_split_camel_handles_acronyms() {
        assert_eq!(split_camel("TicketCCs"), "Ticket CCs");
        assert_eq!(split_camel("KBArticles"), "KB Articles");
        assert_eq!(split_camel("UserProfiles"), "User Profiles");
    }

    #[test]
    fn test_keyword_matches_with_one_hop_expansion() {
        let a = analyzer(None);
        let matches = a.keyword_matches("How many tickets are assigned to me?");
        assert_eq!(matches[0], "Tickets");
        for related in ["TicketComments", "TicketAttachments", "UserProfiles"] {
            assert!(matches.contains(&related.to_string()), "{}", related);
        }
        assert!(!matches.contains(&"Organizations".to_string()));
    }

    #[test]
    fn test_schema_tables_always_include_tickets() {
        let a = analyzer(None);
        let tables = a.schema_tables("what is on my plate");
        assert!(tables.contains(&"Tickets".to_string()));
        assert!(tables.contains(&"UserProfiles".to_string()));
    }

    #[tokio::test]
    async fn test_merge_puts_model_order_first() {
        let a = analyzer(Some(r#"["UserProfiles", "Tickets", "Tickts", "Nonsense"]"#));
        let result = a.analyze("Show my open tickets").await;
        assert_eq!(result.llm_matches, vec!["UserProfiles", "Tickets"]);
        assert_eq!(&result.tables[..2], &["UserProfiles".to_string(), "Tickets".to_string()]);
        assert!(result.tables.contains(&"TicketComments".to_string()));
    }

    #[tokio::test]
    async fn test_strict_mode_intersects() {
        let a = analyzer(Some("```json\n[\"Organizations\", \"Tickets\"]\n```"));
        let result = a.analyze_with("Show my open tickets", false).await;
        assert_eq!(result.tables, vec!["Tickets"]);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_keywords() {
        let a = analyzer(None);
        let result = a.analyze_with("list kb articles", false).await;
        assert!(result.llm_matches.is_empty());
        assert_eq!(result.tables, result.keyword_matches);
        assert!(result.tables.contains(&"KBArticles".to_string()));

        let garbled = analyzer(Some("Tickets, probably"));
        assert_eq!(garbled.analyze("tickets").await.llm_matches, Vec::<String>::new());
    }
}
