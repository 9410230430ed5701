//! Output shapes: ordered `(name, type)` column lists.
//!
//! Shapes are declared at runtime by the translation collaborator, so they
//! are plain values compared structurally rather than Rust types. Equality is
//! order- and type-sensitive: a reordered or retyped column is a breaking
//! change for every step built on top of it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{Row, Value};

/// Column type tag as understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ColumnType {
    Varchar,
    Integer,
    Double,
    BigInt,
    Boolean,
    /// Any other tag a collaborator declared, kept verbatim
    Other(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Integer => "INTEGER",
            ColumnType::Double => "DOUBLE",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Other(tag) => tag,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Double | ColumnType::BigInt
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ColumnType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" => ColumnType::Varchar,
            "INTEGER" => ColumnType::Integer,
            "DOUBLE" => ColumnType::Double,
            "BIGINT" => ColumnType::BigInt,
            "BOOLEAN" => ColumnType::Boolean,
            _ => ColumnType::Other(tag.trim().to_string()),
        }
    }
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        ColumnType::from(tag.as_str())
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.as_str().to_string()
    }
}

/// One output column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Column {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered list of output columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<Column>);

impl Shape {
    pub fn new(columns: Vec<Column>) -> Self {
        Shape(columns)
    }

    pub fn empty() -> Self {
        Shape(Vec::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.name == name)
    }
}

impl FromIterator<Column> for Shape {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, ColumnType)> for Shape {
    fn from_iter<I: IntoIterator<Item = (&'a str, ColumnType)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, ty)| Column::new(name, ty))
            .collect()
    }
}

/// True iff both shapes have the same columns, names and types, in the same order.
pub fn equal(a: &Shape, b: &Shape) -> bool {
    a.0.len() == b.0.len()
        && a
            .0
            .iter()
            .zip(&b.0)
            .all(|(x, y)| x.name == y.name && x.ty == y.ty)
}

/// Render a shape as context for the translation collaborator.
///
/// ```
/// use sift_chain::shape::{describe, ColumnType, Shape};
///
/// let shape: Shape = [("CASE_STATUS", ColumnType::Varchar), ("N", ColumnType::Integer)]
///     .into_iter()
///     .collect();
/// assert_eq!(describe(&shape), "CASE_STATUS (VARCHAR), N (INTEGER)");
/// assert_eq!(describe(&Shape::empty()), "No columns available");
/// ```
pub fn describe(shape: &Shape) -> String {
    if shape.is_empty() {
        return "No columns available".to_string();
    }
    shape
        .0
        .iter()
        .map(|c| format!("{} ({})", c.name, c.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Infer a column type from a sample value.
pub fn infer_type(value: &Value) -> ColumnType {
    match value {
        Value::Integer(_) => ColumnType::Integer,
        Value::Float(n) if n.is_finite() && n.fract() == 0.0 => ColumnType::Integer,
        Value::Float(_) => ColumnType::Double,
        Value::BigInt(_) => ColumnType::BigInt,
        Value::Boolean(_) => ColumnType::Boolean,
        Value::Null | Value::String(_) => ColumnType::Varchar,
    }
}

/// Shape of a result set, inferred from its first row.
pub fn infer_shape(rows: &[Row]) -> Shape {
    let Some(first) = rows.first() else {
        return Shape::empty();
    };
    first
        .iter()
        .map(|(name, value)| Column::new(name, infer_type(value)))
        .collect()
}

/// Names of text columns, for filter suggestions.
pub fn string_columns(shape: &Shape) -> Vec<&str> {
    shape
        .0
        .iter()
        .filter(|c| c.ty == ColumnType::Varchar)
        .map(|c| c.name.as_str())
        .collect()
}

pub fn numeric_columns(shape: &Shape) -> Vec<&str> {
    shape
        .0
        .iter()
        .filter(|c| c.ty.is_numeric())
        .map(|c| c.name.as_str())
        .collect()
}
