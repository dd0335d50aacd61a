//! The analytical SQL engine seam.
//!
//! The downloader never touches columnar data itself: it constructs SQL text
//! and consumes scalar rows. Everything engine-specific sits behind the
//! [`SqlEngine`] and [`EngineFactory`] traits, injected by the host. A
//! DuckDB-backed implementation is available behind the `duckdb` cargo
//! feature; tests run against a scripted fake.

use std::path::Path;

use thiserror::Error;

/// A failure reported by the engine for a single statement.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    /// The engine's message, verbatim
    pub message: String,
}

impl EngineError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A scalar cell returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, widening integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Raw bytes; text values are exposed as their UTF-8 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

/// One result row.
pub type Row = Vec<Value>;

/// A live connection to the analytical engine.
///
/// A connection is owned exclusively by one unit of work for its lifetime;
/// there is no sharing and no concurrent use.
pub trait SqlEngine {
    /// Run a statement for its side effects.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] carrying the engine's message when the
    /// statement fails.
    fn execute(&mut self, sql: &str) -> Result<(), EngineError>;

    /// Run a query and collect every row.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] carrying the engine's message when the
    /// query fails.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, EngineError>;
}

/// Opens engine connections for jobs.
pub trait EngineFactory {
    /// Open an ephemeral in-memory connection.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the engine cannot be initialized.
    fn connect(&self) -> Result<Box<dyn SqlEngine>, EngineError>;

    /// Open a connection whose storage *is* the file at `path`.
    ///
    /// Used for database-native destinations, where persisting the staging
    /// table is the download.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the file cannot be opened or created.
    fn connect_at(&self, path: &Path) -> Result<Box<dyn SqlEngine>, EngineError>;
}

/// Load the HTTP and spatial capability extensions on a fresh connection.
///
/// # Errors
///
/// Returns an [`EngineError`] when any of the statements fails.
pub fn prepare_remote_access(engine: &mut dyn SqlEngine) -> Result<(), EngineError> {
    engine.execute("INSTALL httpfs;")?;
    engine.execute("INSTALL spatial;")?;
    engine.execute("LOAD httpfs;")?;
    engine.execute("LOAD spatial;")?;
    Ok(())
}

#[cfg(feature = "duckdb")]
mod duckdb_backend {
    use std::path::Path;

    use super::{EngineError, EngineFactory, Row, SqlEngine, Value};

    /// A [`SqlEngine`] over an embedded DuckDB connection.
    pub struct DuckDbEngine {
        conn: duckdb::Connection,
    }

    impl DuckDbEngine {
        fn map_err(e: duckdb::Error) -> EngineError {
            EngineError::new(e.to_string())
        }
    }

    fn convert(value: duckdb::types::Value) -> Value {
        use duckdb::types::Value as Dv;
        match value {
            Dv::Null => Value::Null,
            Dv::Boolean(b) => Value::Int(i64::from(b)),
            Dv::TinyInt(n) => Value::Int(i64::from(n)),
            Dv::SmallInt(n) => Value::Int(i64::from(n)),
            Dv::Int(n) => Value::Int(i64::from(n)),
            Dv::BigInt(n) => Value::Int(n),
            Dv::UTinyInt(n) => Value::Int(i64::from(n)),
            Dv::USmallInt(n) => Value::Int(i64::from(n)),
            Dv::UInt(n) => Value::Int(i64::from(n)),
            #[allow(clippy::cast_possible_wrap)]
            Dv::UBigInt(n) => Value::Int(n as i64),
            Dv::Float(f) => Value::Float(f64::from(f)),
            Dv::Double(f) => Value::Float(f),
            Dv::Text(s) => Value::Text(s),
            Dv::Blob(b) => Value::Blob(b),
            other => Value::Text(format!("{other:?}")),
        }
    }

    impl SqlEngine for DuckDbEngine {
        fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
            self.conn.execute_batch(sql).map_err(Self::map_err)
        }

        fn query(&mut self, sql: &str) -> Result<Vec<Row>, EngineError> {
            let mut stmt = self.conn.prepare(sql).map_err(Self::map_err)?;
            let mut rows = stmt.query([]).map_err(Self::map_err)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(Self::map_err)? {
                let mut cells = Row::new();
                let mut idx = 0;
                while let Ok(cell) = row.get::<_, duckdb::types::Value>(idx) {
                    cells.push(convert(cell));
                    idx += 1;
                }
                out.push(cells);
            }
            Ok(out)
        }
    }

    /// Factory producing [`DuckDbEngine`] connections.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DuckDbFactory;

    impl EngineFactory for DuckDbFactory {
        fn connect(&self) -> Result<Box<dyn SqlEngine>, EngineError> {
            let conn = duckdb::Connection::open_in_memory()
                .map_err(|e| EngineError::new(e.to_string()))?;
            Ok(Box::new(DuckDbEngine { conn }))
        }

        fn connect_at(&self, path: &Path) -> Result<Box<dyn SqlEngine>, EngineError> {
            let conn =
                duckdb::Connection::open(path).map_err(|e| EngineError::new(e.to_string()))?;
            Ok(Box::new(DuckDbEngine { conn }))
        }
    }
}

#[cfg(feature = "duckdb")]
pub use duckdb_backend::{DuckDbEngine, DuckDbFactory};
