use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("unknown sort direction '{}' (expected asc or desc)", other)),
        }
    }
}

/// Single-column ordering of the final output. No column means "keep the
/// step's own order".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Option<String>,
    pub direction: Direction,
}

impl SortSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn by(column: impl Into<String>, direction: Direction) -> Self {
        SortSpec {
            column: Some(column.into()),
            direction,
        }
    }

    pub fn is_set(&self) -> bool {
        self.column.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Sorting by the current column flips direction; a new column starts ascending.
    pub fn toggled(&self, column: &str) -> SortSpec {
        let direction = match self.column.as_deref() {
            Some(current) if current == column && self.direction == Direction::Asc => Direction::Desc,
            _ => Direction::Asc,
        };
        SortSpec::by(column, direction)
    }

    /// ` ORDER BY "col" DIR`, or an empty string when unset.
    pub fn order_clause(&self) -> String {
        match self.column.as_deref() {
            Some(column) if !column.is_empty() => {
                format!(" ORDER BY {} {}", quote_ident(column), self.direction)
            }
            _ => String::new(),
        }
    }
}

/// Page window over the final output. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: Option<usize>,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            page_size: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

impl Pagination {
    pub fn new(page: usize, page_size: usize) -> Self {
        Pagination {
            page: page.max(1),
            page_size: Some(page_size),
        }
    }

    /// No LIMIT/OFFSET at all.
    pub fn unbounded() -> Self {
        Pagination {
            page: 1,
            page_size: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.page_size
            .map_or(0, |size| self.page.max(1).saturating_sub(1).saturating_mul(size))
    }

    /// ` LIMIT n OFFSET m`, or an empty string without a page size.
    pub fn limit_clause(&self) -> String {
        match self.page_size {
            Some(size) if size > 0 => format!(" LIMIT {} OFFSET {}", size, self.offset()),
            _ => String::new(),
        }
    }

    /// Number of pages needed for `total_rows`.
    pub fn total_pages(&self, total_rows: u64) -> u64 {
        match self.page_size {
            Some(size) if size > 0 => total_rows.div_ceil(size as u64),
            _ => u64::from(total_rows > 0),
        }
    }
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
