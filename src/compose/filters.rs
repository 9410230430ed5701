use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dataset::{
    CASE_STATUS, CONTINUED_EMPLOYMENT, EMPLOYER_NAME, JOB_TITLE, NEW_EMPLOYMENT,
    WAGE_RATE_OF_PAY_FROM, WORKSITE_STATE,
};

/// Which employment flag a row must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Employment {
    New,
    Continued,
}

impl FromStr for Employment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Employment::New),
            "continued" => Ok(Employment::Continued),
            other => Err(format!("unknown employment type '{}' (expected new or continued)", other)),
        }
    }
}

impl fmt::Display for Employment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Employment::New => f.write_str("new"),
            Employment::Continued => f.write_str("continued"),
        }
    }
}

/// Row-level predicates applied to the output of the active step.
///
/// The set of fields is fixed. Empty strings, empty lists and `None` mean
/// "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSet {
    pub employers: Vec<String>,
    pub job_titles: Vec<String>,
    /// Used only while `employers` is empty
    pub employer_search: String,
    /// Used only while `job_titles` is empty
    pub job_title_search: String,
    pub state: String,
    pub min_salary: Option<Decimal>,
    pub max_salary: Option<Decimal>,
    pub status: String,
    pub employment: Option<Employment>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions().is_empty()
    }

    /// Add `employer` to the multi-select list, or remove it if present.
    pub fn toggle_employer(&mut self, employer: &str) {
        toggle(&mut self.employers, employer);
    }

    pub fn toggle_job_title(&mut self, title: &str) {
        toggle(&mut self.job_titles, title);
    }

    /// ` WHERE ...` for the active predicates, or an empty string.
    pub fn where_clause(&self) -> String {
        let conditions = self.conditions();
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    /// One SQL predicate per active field, in a fixed order.
    pub fn conditions(&self) -> Vec<String> {
        let mut conditions = Vec::new();

        if let Some(c) = membership_or_search(EMPLOYER_NAME, &self.employers, &self.employer_search) {
            conditions.push(c);
        }
        if let Some(c) = membership_or_search(JOB_TITLE, &self.job_titles, &self.job_title_search) {
            conditions.push(c);
        }
        if !self.state.is_empty() {
            conditions.push(format!("{} = {}", WORKSITE_STATE, quote_literal(&self.state)));
        }
        if let Some(min) = self.min_salary {
            conditions.push(format!("{} >= {}", WAGE_RATE_OF_PAY_FROM, min.normalize()));
        }
        if let Some(max) = self.max_salary {
            conditions.push(format!("{} <= {}", WAGE_RATE_OF_PAY_FROM, max.normalize()));
        }
        if !self.status.is_empty() {
            conditions.push(format!("{} = {}", CASE_STATUS, quote_literal(&self.status)));
        }
        match self.employment {
            Some(Employment::New) => conditions.push(format!("{} > 0", NEW_EMPLOYMENT)),
            Some(Employment::Continued) => conditions.push(format!("{} > 0", CONTINUED_EMPLOYMENT)),
            None => {}
        }

        conditions
    }
}

fn toggle(list: &mut Vec<String>, value: &str) {
    match list.iter().position(|v| v == value) {
        Some(index) => {
            list.remove(index);
        }
        None => list.push(value.to_string()),
    }
}

fn membership_or_search(column: &str, selected: &[String], search: &str) -> Option<String> {
    if !selected.is_empty() {
        let list = selected
            .iter()
            .map(|v| quote_literal(v))
            .collect::<Vec<_>>()
            .join(",");
        return Some(format!("{} IN ({})", column, list));
    }
    if !search.is_empty() {
        // Both sides go through the engine's LOWER so they fold the same way.
        let pattern = format!("%{}%", escape_like(search));
        return Some(format!(
            "LOWER({}) LIKE LOWER({}) ESCAPE '\\'",
            column,
            quote_literal(&pattern)
        ));
    }
    None
}

/// Quote `text` as a SQL string literal, doubling embedded single quotes.
///
/// ```
/// use sift_chain::compose::quote_literal;
///
/// assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
/// ```
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Escape LIKE wildcards so `text` matches literally under `ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
