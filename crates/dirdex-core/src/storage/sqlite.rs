use crate::error::Error;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Bumped whenever `schema.sql` changes; older files are rebuilt on open.
pub const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the index at `path`, creating the schema if the file is new or predates
    /// [`SCHEMA_VERSION`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let existed = path.exists();
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;

        if !existed {
            debug!("No index at {}, creating schema", path.display());
            db.create_schema()?;
        } else if db.schema_version()? < SCHEMA_VERSION {
            debug!("Index at {} predates schema version {}", path.display(), SCHEMA_VERSION);
            db.create_schema()?;
        }
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.create_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (64MB cache)");
        Ok(())
    }

    pub fn schema_version(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
    }

    /// Drop and recreate `folders` and `files`. All indexed rows are lost.
    pub fn create_schema(&self) -> Result<(), Error> {
        let tx = self.conn.unchecked_transaction().map_err(Error::Schema)?;
        tx.execute_batch(include_str!("schema.sql"))
            .map_err(Error::Schema)?;
        tx.commit().map_err(Error::Schema)?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin the transaction that scopes one top-level operation. Every store call made
    /// before `commit` runs inside it; dropping it uncommitted rolls everything back.
    pub fn begin(&self) -> Result<Transaction<'_>, Error> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Reclaim space with `VACUUM`. Must run outside any open transaction.
    pub fn compact(&self) -> Result<(), Error> {
        let start = Instant::now();
        self.conn.execute_batch("VACUUM")?;
        info!("Index compacted in {:.2}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}
