//! Query compositor: linearize a node chain into one executable query.
//!
//! A chain `[a, b, c]` (root first) becomes
//!
//! ```text
//! WITH
//! node_a AS (
//!   <a.fragment with {parent} := h1b>
//! ),
//! node_b AS (
//!   <b.fragment with {parent} := node_a>
//! ),
//! node_c AS (
//!   <c.fragment with {parent} := node_b>
//! )
//! SELECT * FROM node_c WHERE ... ORDER BY ... LIMIT ... OFFSET ...
//! ```
//!
//! Only system-generated aliases are ever substituted for the placeholder.
//! User text reaches the query through [`FilterSet`] alone, always quoted.

pub mod filters;
pub mod order;

pub use filters::{Employment, FilterSet, escape_like, quote_literal};
pub use order::{DEFAULT_PAGE_SIZE, Direction, Pagination, SortSpec, quote_ident};

use crate::dataset::BASE_RELATION;
use crate::node::{Node, PARENT_PLACEHOLDER};

/// Row query and matching count query for one view of the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub data: String,
    pub count: String,
}

/// Number of `{parent}` placeholders in a fragment.
pub fn placeholder_count(fragment: &str) -> usize {
    fragment.matches(PARENT_PLACEHOLDER).count()
}

/// Replace the placeholder with `input`, dropping trailing `--` comments and
/// statement terminators.
pub fn substitute(fragment: &str, input: &str) -> String {
    let mut body = fragment.trim();
    loop {
        body = body.trim_end_matches(';').trim_end();
        match trailing_comment_start(body) {
            Some(start) => body = body[..start].trim_end(),
            None => break,
        }
    }
    body.replace(PARENT_PLACEHOLDER, input)
}

/// Byte offset of a `--` comment that runs to the end of `text`, skipping
/// quoted literals and identifiers.
fn trailing_comment_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'-' && bytes.get(i + 1) == Some(&b'-') => {
                match text[i..].find('\n') {
                    Some(offset) => i += offset,
                    None => return Some(i),
                }
            }
            None => {}
        }
        i += 1;
    }
    None
}

/// The `WITH` prefix for a chain and the relation the outer query reads.
///
/// An empty chain has no prefix and reads the base relation.
pub fn with_clause(chain: &[&Node]) -> (String, String) {
    let Some(last) = chain.last() else {
        return (String::new(), BASE_RELATION.to_string());
    };

    let mut input = BASE_RELATION.to_string();
    let mut ctes = Vec::with_capacity(chain.len());
    for node in chain {
        let alias = node.id.alias();
        ctes.push(format!("{} AS (\n  {}\n)", alias, substitute(&node.fragment, &input)));
        input = alias;
    }

    (format!("WITH\n{}\n", ctes.join(",\n")), last.id.alias())
}

/// Compose the paged row query for `chain` (root first).
pub fn compose_query(
    chain: &[&Node],
    filters: &FilterSet,
    sort: &SortSpec,
    page: &Pagination,
) -> String {
    let (prefix, relation) = with_clause(chain);
    let sql = format!(
        "{}SELECT * FROM {}{}{}{}",
        prefix,
        relation,
        filters.where_clause(),
        sort.order_clause(),
        page.limit_clause()
    );
    tracing::debug!(query = %sql, "composed data query");
    sql
}

/// Compose the total-row count for `chain` under `filters`, as column `cnt`.
pub fn count_query(chain: &[&Node], filters: &FilterSet) -> String {
    let (prefix, relation) = with_clause(chain);
    let sql = format!(
        "{}SELECT COUNT(*) AS cnt FROM {}{}",
        prefix,
        relation,
        filters.where_clause()
    );
    tracing::debug!(query = %sql, "composed count query");
    sql
}

pub fn compose_pair(
    chain: &[&Node],
    filters: &FilterSet,
    sort: &SortSpec,
    page: &Pagination,
) -> QueryPair {
    QueryPair {
        data: compose_query(chain, filters, sort, page),
        count: count_query(chain, filters),
    }
}

/// One-row probe for a proposed step attached below `parent_chain`.
///
/// Cheap enough to run before committing: it surfaces execution errors and
/// empty results without materializing the output.
pub fn validation_query(parent_chain: &[&Node], proposed: &Node) -> String {
    let mut chain = parent_chain.to_vec();
    chain.push(proposed);
    compose_query(
        &chain,
        &FilterSet::default(),
        &SortSpec::none(),
        &Pagination::new(1, 1),
    )
}
