//! The fixed base dataset every chain starts from.

use crate::shape::{Column, ColumnType, Shape};
use crate::value::Row;

/// Relation name of the base dataset inside the engine.
pub const BASE_RELATION: &str = "h1b";

pub const EMPLOYER_NAME: &str = "EMPLOYER_NAME";
pub const JOB_TITLE: &str = "JOB_TITLE";
pub const WORKSITE_STATE: &str = "WORKSITE_STATE";
pub const WORKSITE_CITY: &str = "WORKSITE_CITY";
pub const WAGE_RATE_OF_PAY_FROM: &str = "WAGE_RATE_OF_PAY_FROM";
pub const CASE_STATUS: &str = "CASE_STATUS";
pub const NEW_EMPLOYMENT: &str = "NEW_EMPLOYMENT";
pub const CONTINUED_EMPLOYMENT: &str = "CONTINUED_EMPLOYMENT";
pub const TOTAL_WORKER_POSITIONS: &str = "TOTAL_WORKER_POSITIONS";

const BASE_COLUMNS: [(&str, ColumnType); 9] = [
    (EMPLOYER_NAME, ColumnType::Varchar),
    (JOB_TITLE, ColumnType::Varchar),
    (WORKSITE_STATE, ColumnType::Varchar),
    (WORKSITE_CITY, ColumnType::Varchar),
    (WAGE_RATE_OF_PAY_FROM, ColumnType::Double),
    (CASE_STATUS, ColumnType::Varchar),
    (NEW_EMPLOYMENT, ColumnType::Integer),
    (CONTINUED_EMPLOYMENT, ColumnType::Integer),
    (TOTAL_WORKER_POSITIONS, ColumnType::Integer),
];

/// Columns shown for the base dataset when no step is active.
pub const DEFAULT_DISPLAY_COLUMNS: [&str; 8] = [
    EMPLOYER_NAME,
    JOB_TITLE,
    WORKSITE_STATE,
    WORKSITE_CITY,
    WAGE_RATE_OF_PAY_FROM,
    CASE_STATUS,
    NEW_EMPLOYMENT,
    TOTAL_WORKER_POSITIONS,
];

/// Statically known shape of [`BASE_RELATION`].
pub fn base_shape() -> Shape {
    BASE_COLUMNS
        .iter()
        .map(|(name, ty)| Column::new(*name, ty.clone()))
        .collect()
}

/// Headline figures for the base dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStats {
    pub total: i64,
    pub certified: i64,
    pub avg_salary: f64,
    pub new_hires: i64,
}

pub fn stats_query() -> String {
    format!(
        "SELECT COUNT(*) AS total, \
         SUM(CASE WHEN {status} = 'Certified' THEN 1 ELSE 0 END) AS certified, \
         ROUND(AVG({wage}), 0) AS avg_salary, \
         SUM({new}) AS new_hires \
         FROM {base}",
        status = CASE_STATUS,
        wage = WAGE_RATE_OF_PAY_FROM,
        new = NEW_EMPLOYMENT,
        base = BASE_RELATION,
    )
}

impl DatasetStats {
    /// Read the single row produced by [`stats_query`]. Missing or null
    /// aggregates (an empty table) read as zero.
    pub fn from_row(row: &Row) -> Self {
        let int = |name: &str| row.get(name).and_then(|v| v.as_int()).unwrap_or(0);
        DatasetStats {
            total: int("total"),
            certified: int("certified"),
            avg_salary: row
                .get("avg_salary")
                .and_then(|v| v.as_float())
                .unwrap_or(0.0),
            new_hires: int("new_hires"),
        }
    }
}

/// Distinct values of a base column, most frequent first, for filter pickers.
///
/// Returns `None` for a column the base dataset does not have, so no
/// caller-supplied name reaches the query text.
pub fn unique_values_query(column: &str) -> Option<String> {
    let (name, _) = BASE_COLUMNS.iter().find(|(name, _)| *name == column)?;
    Some(format!(
        "SELECT {col}, COUNT(*) AS cnt FROM {base} WHERE {col} IS NOT NULL GROUP BY {col} ORDER BY cnt DESC",
        col = name,
        base = BASE_RELATION,
    ))
}
