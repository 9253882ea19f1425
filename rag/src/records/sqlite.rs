//! Record store over the SQLite export of the dataset.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{RagError, Result};
use crate::types::VectorRecord;

use super::RecordStore;

/// Table name used by the dataset export.
pub const DEFAULT_TABLE: &str = "converted";

/// Reads records from a table with `IdConsulta`, `Consulta`, `Articulo` and `Texto` columns.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    table: String,
}

fn records_error(err: rusqlite::Error) -> RagError {
    RagError::Records(err.into())
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorRecord> {
    let id: i64 = row.get(0)?;
    let id = u64::try_from(id).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, id))?;
    Ok(VectorRecord {
        id,
        question: row.get(1)?,
        answer: row.get(2)?,
        article_id: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
    })
}

impl SqliteRecordStore {
    /// Opens `path` and reads from the default table.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Records`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_table(path, DEFAULT_TABLE)
    }

    /// Opens `path` and reads from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Records`] if the database cannot be opened, and
    /// [`RagError::Config`] if `table` is not a plain identifier.
    pub fn open_table(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(records_error)?;
        Self::from_connection(conn, table)
    }

    /// Wraps an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `table` is not a plain identifier.
    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(RagError::Config(format!("invalid table name `{table}`")));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_owned(),
        })
    }

    fn select(&self) -> String {
        format!(
            "SELECT IdConsulta, Consulta, Texto, Articulo FROM \"{}\"",
            self.table
        )
    }
}

impl RecordStore for SqliteRecordStore {
    fn all(&self) -> Result<Vec<VectorRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY rowid", self.select()))
            .map_err(records_error)?;
        let rows = stmt.query_map([], decode_row).map_err(records_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(records_error)
    }

    fn by_id(&self, id: u64) -> Result<Option<VectorRecord>> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE IdConsulta = ?1 LIMIT 1", self.select()),
            params![id],
            decode_row,
        )
        .optional()
        .map_err(records_error)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", self.table),
                [],
                |row| row.get(0),
            )
            .map_err(records_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
