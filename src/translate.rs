//! Natural-language-to-query translation collaborator.
//!
//! A translator receives the user's prompt plus a description of the input
//! shape and answers with a fragment and its output shape, or with a
//! question back to the user. The wire format model-backed translators are
//! asked to produce is JSON:
//!
//! ```text
//! {"sql": "SELECT ... FROM {parent} WHERE ...", "schema": [{"name": "col", "type": "VARCHAR"}]}
//! {"error": "What salary range? Give me numbers."}
//! ```
//!
//! [`parse_response`] decodes that format, tolerating prose around the JSON
//! object.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::compose::placeholder_count;
use crate::node::PARENT_PLACEHOLDER;
use crate::shape::Shape;

/// Instructions for a model-backed translator.
pub const SYSTEM_PROMPT: &str = r#"You are a SQL generator for an H1B visa data explorer. Generate DuckDB-compatible SQL.

DATA CONTEXT:
- CASE_STATUS values: 'Certified', 'Denied', 'Withdrawn' (case-sensitive)
- WAGE_RATE_OF_PAY_FROM: annual salary in USD
- NEW_EMPLOYMENT: 1 if new hire, 0 otherwise
- CONTINUED_EMPLOYMENT: 1 if continuing, 0 otherwise

RULES:
1. Output ONLY valid JSON: {"sql": "...", "schema": [{"name": "...", "type": "..."}]}
2. If the request is unclear, output: {"error": "your direct question here"}
3. If something is ambiguous, ask for clarification instead of guessing.
4. SQL must reference {parent} exactly once as the source table.
5. Schema must list ALL output columns with types (VARCHAR, INTEGER, DOUBLE, BIGINT, BOOLEAN)
6. Supported operations: SELECT, WHERE, GROUP BY, HAVING, ORDER BY, aggregations (COUNT, SUM, AVG, MIN, MAX)
7. No CTEs, no subqueries, no JOINs - single SELECT statement only
8. Column names and values are case-sensitive, use exact names/values"#;

/// User message sent alongside [`SYSTEM_PROMPT`].
pub fn user_message(prompt: &str, parent_shape: &str) -> String {
    format!(
        "Parent table columns: {}\n\nUser request: \"{}\"\n\nGenerate SQL. Ask if unclear.",
        parent_shape, prompt
    )
}

/// What a translator produced for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Generated { fragment: String, shape: Shape },
    /// The prompt was too vague; the message is a question for the user.
    Clarification(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// The translation service itself failed
    Service(String),
    /// The service answered, but not in the expected format
    MalformedResponse(String),
    /// The fragment does not contain exactly one placeholder
    Placeholder { found: usize },
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::Service(msg) => write!(f, "{}", msg),
            TranslateError::MalformedResponse(msg) => write!(f, "Invalid AI response: {}", msg),
            TranslateError::Placeholder { found } => write!(
                f,
                "Generated SQL must reference {} exactly once (found {})",
                PARENT_PLACEHOLDER, found
            ),
        }
    }
}

impl std::error::Error for TranslateError {}

#[async_trait]
pub trait Translator: Send + Sync {
    /// `parent_shape` is the input shape rendered by [`crate::shape::describe`].
    async fn translate(&self, prompt: &str, parent_shape: &str) -> Result<Translation, TranslateError>;
}

/// Reject fragments that do not reference their input exactly once.
pub fn check_fragment(fragment: &str) -> Result<(), TranslateError> {
    match placeholder_count(fragment) {
        1 => Ok(()),
        found => Err(TranslateError::Placeholder { found }),
    }
}

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static pattern"));

#[derive(Deserialize)]
struct WireResponse {
    sql: Option<String>,
    schema: Option<Shape>,
    error: Option<String>,
}

/// Decode a collaborator's JSON answer.
pub fn parse_response(text: &str) -> Result<Translation, TranslateError> {
    let json = JSON_OBJECT
        .find(text)
        .ok_or_else(|| TranslateError::MalformedResponse("no JSON object found".to_string()))?;

    let wire: WireResponse = serde_json::from_str(json.as_str())
        .map_err(|e| TranslateError::MalformedResponse(e.to_string()))?;

    if let Some(question) = wire.error.filter(|q| !q.trim().is_empty()) {
        return Ok(Translation::Clarification(question));
    }

    match (wire.sql, wire.schema) {
        (Some(fragment), Some(shape)) if !fragment.trim().is_empty() => {
            Ok(Translation::Generated { fragment, shape })
        }
        _ => Err(TranslateError::MalformedResponse(
            "missing sql or schema in response".to_string(),
        )),
    }
}

/// Translator that answers every prompt with one fixed collaborator response.
///
/// Lets a caller that already holds a response (pasted, piped, recorded)
/// drive the same validation and commit path as a live service.
#[derive(Debug, Clone)]
pub struct ResponseTranslator {
    response: String,
}

impl ResponseTranslator {
    pub fn new(response: impl Into<String>) -> Self {
        ResponseTranslator {
            response: response.into(),
        }
    }
}

#[async_trait]
impl Translator for ResponseTranslator {
    async fn translate(&self, _prompt: &str, _parent_shape: &str) -> Result<Translation, TranslateError> {
        parse_response(&self.response)
    }
}
