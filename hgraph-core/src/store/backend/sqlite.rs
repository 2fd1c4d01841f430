//! SQLite backend: the ordered key space lives in a single `kv` table.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use super::{prefix_end, Backend, BatchOp, KeyValue, WriteBatch};
use crate::error::{Error, Result};
use crate::store::descriptor::{Descriptor, StoreConfig};
use crate::store::schema::{configure, initialize_schema, is_initialized};

/// Backend for `sqlite://` descriptors and bare paths.
pub struct SqliteBackend {
    conn: Connection,
    read_only: bool,
}

impl SqliteBackend {
    /// Open or create the database named by `descriptor`.
    pub fn open(descriptor: &Descriptor, config: &StoreConfig) -> Result<Self> {
        let open_err = |e: rusqlite::Error| Error::store_open(descriptor.to_string(), e);

        let conn = if descriptor.is_ephemeral() {
            Connection::open_in_memory().map_err(open_err)?
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if config.read_only {
                flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
            } else {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
                if config.create_if_missing {
                    flags |= OpenFlags::SQLITE_OPEN_CREATE;
                }
            }
            Connection::open_with_flags(descriptor.location(), flags).map_err(open_err)?
        };

        configure(&conn, config).map_err(open_err)?;
        if !is_initialized(&conn) {
            if config.read_only {
                return Err(Error::store_open(
                    descriptor.to_string(),
                    "database has no hypergraph schema",
                ));
            }
            initialize_schema(&conn).map_err(open_err)?;
            debug!(descriptor = %descriptor, "initialized sqlite schema");
        }

        Ok(Self {
            conn,
            read_only: config.read_only,
        })
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(&Descriptor::sqlite(":memory:"), &StoreConfig::default())
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn scan(&self, prefix: &[u8], after: Option<&[u8]>, limit: usize) -> Result<Vec<KeyValue>> {
        let (sql, lower) = match after {
            Some(after) if after >= prefix => (
                "SELECT key, value FROM kv
                 WHERE key > ?1 AND (?2 IS NULL OR key < ?2)
                 ORDER BY key LIMIT ?3",
                after,
            ),
            _ => (
                "SELECT key, value FROM kv
                 WHERE key >= ?1 AND (?2 IS NULL OR key < ?2)
                 ORDER BY key LIMIT ?3",
                prefix,
            ),
        };
        let end = prefix_end(prefix);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![lower, end, limit], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut put = tx.prepare_cached(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            let mut delete = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
            for op in batch.ops() {
                match op {
                    BatchOp::Put(key, value) => {
                        put.execute(params![key, value])?;
                    }
                    BatchOp::Delete(key) => {
                        delete.execute(params![key])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        self.conn.close().map_err(|(_, e)| Error::store_io(e))
    }
}
