//! executor.rs — Run a resolved query and read back one number.
//!
//! Only the first column of the first row matters. Question SQL runs on a
//! read-only connection and must itself be a read-only statement. Execution
//! problems are logged and reported as `None`; they never reach the caller
//! as errors.

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use thiserror::Error;
use tracing::error;

use crate::database::Database;
use crate::resolver::ResolvedQuery;

/// The single cell a query produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Int(i64),
    /// Text that could not be read as a number, returned untouched.
    Raw(String),
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error("statement would modify the store")]
    WriteStatement,
}

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    db: Database,
}

impl QueryExecutor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Execute on a connection opened for this call only.
    pub async fn execute(&self, query: &ResolvedQuery) -> Option<ScalarValue> {
        let db = self.db.clone();
        let owned = query.clone();

        let outcome = tokio::task::spawn_blocking(move || -> Result<ScalarValue, ExecuteError> {
            let conn = db.connect_read_only()?;
            fetch_scalar(&conn, &owned)
        })
        .await;

        match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                error!(sql = %query.sql, params = ?query.params, error = %err, "query execution failed");
                None
            }
            Err(err) => {
                error!(sql = %query.sql, error = %err, "query worker panicked or was cancelled");
                None
            }
        }
    }
}

/// Run `query` on `conn` and coerce the first cell. Statements that would
/// write are refused before they run.
pub fn fetch_scalar(conn: &Connection, query: &ResolvedQuery) -> Result<ScalarValue, ExecuteError> {
    let names: Vec<String> = query.params.keys().map(|k| format!(":{k}")).collect();
    let bound: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .zip(query.params.values())
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut stmt = conn.prepare(&query.sql)?;
    if !stmt.readonly() {
        return Err(ExecuteError::WriteStatement);
    }
    let mut rows = stmt.query(bound.as_slice())?;

    let value = match rows.next()? {
        Some(row) => coerce(row.get::<_, Value>(0)?),
        None => ScalarValue::Int(0),
    };
    Ok(value)
}

fn coerce(value: Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Int(0),
        Value::Integer(n) => ScalarValue::Int(n),
        Value::Real(f) => ScalarValue::Int(f.trunc() as i64),
        Value::Text(s) => coerce_text(s),
        Value::Blob(bytes) => coerce_text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn coerce_text(text: String) -> ScalarValue {
    match text.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => ScalarValue::Int(f.trunc() as i64),
        _ => ScalarValue::Raw(text),
    }
}
