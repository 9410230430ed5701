//! Query engine collaborator.
//!
//! The core only needs "query text in, rows or error out". [`SqliteEngine`]
//! is a rusqlite-backed implementation used by the command line and tests.
//! It runs each query on tokio's blocking pool; queries on one engine share a
//! single connection and so run one at a time.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::dataset::{BASE_RELATION, base_shape};
use crate::value::{Row, Value};

#[async_trait]
pub trait Engine: Send + Sync {
    /// Run `sql` and fully materialize its rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, EngineError>;
}

/// The engine rejected a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::new(e.to_string())
    }
}

/// Read the `cnt` column of a count query's single row.
pub fn read_count(rows: &[Row]) -> u64 {
    rows.first()
        .and_then(|row| row.get("cnt"))
        .and_then(|v| v.as_int())
        .map_or(0, |n| u64::try_from(n).unwrap_or(0))
}

/// SQLite database acting as the engine.
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

impl SqliteEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Ok(Self::with_connection(Connection::open(path)?))
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Ok(Self::with_connection(Connection::open_in_memory()?))
    }

    pub fn with_connection(conn: Connection) -> Self {
        SqliteEngine {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create the base relation with its declared shape if it is missing.
    pub fn ensure_base_table(&self) -> Result<(), EngineError> {
        let columns = base_shape()
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", ");
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            BASE_RELATION, columns
        ))
    }

    /// Run statements that return no rows (DDL, seeding).
    pub fn execute_batch(&self, sql: &str) -> Result<(), EngineError> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, EngineError> {
    conn.lock()
        .map_err(|_| EngineError::new("engine connection is poisoned"))
}

fn query_rows(conn: &Mutex<Connection>, sql: &str) -> Result<Vec<Row>, EngineError> {
    let conn = lock(conn)?;
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in names.iter().enumerate() {
            record.push(name.clone(), cell_value(row.get_ref(i)?));
        }
        out.push(record);
    }
    Ok(out)
}

fn cell_value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(n) => Value::Float(n),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, EngineError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || query_rows(&conn, &sql))
            .await
            .map_err(|e| EngineError::new(format!("query task failed: {}", e)))?
    }
}
