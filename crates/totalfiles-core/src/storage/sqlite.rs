use rusqlite::{Connection, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub struct Database {
    conn: Connection,
    /// File tables already created on this connection.
    ensured_tables: RefCell<HashSet<String>>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database::from_connection(conn);
        db.configure_pragmas()?;
        db.migrate_schema()?;
        debug!("Opened catalog database at {}", path);
        Ok(db)
    }

    /// Open from a connection string: a plain path, or `sqlite://path` /
    /// `sqlite:path`.
    pub fn open_url(url: &str) -> Result<Self> {
        Self::open(database_path_from_url(url))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database::from_connection(conn);
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Self {
        Database {
            conn,
            ensured_tables: RefCell::new(HashSet::new()),
        }
    }

    fn configure_pragmas(&self) -> Result<()> {
        let mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;
        self.conn.busy_timeout(Duration::from_millis(5000))?;
        debug!("SQLite pragmas configured ({} journal, 64MB cache)", mode);
        Ok(())
    }

    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        self.conn.execute_batch(include_str!("schema.sql"))?;
        debug!("SQLite schema initialized (version {} -> 1)", version);
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn is_table_ensured(&self, table: &str) -> bool {
        self.ensured_tables.borrow().contains(table)
    }

    pub(crate) fn mark_table_ensured(&self, table: &str) {
        self.ensured_tables.borrow_mut().insert(table.to_string());
    }
}

pub fn database_path_from_url(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_from_url() {
        assert_eq!(database_path_from_url("sqlite://catalog.db"), "catalog.db");
        assert_eq!(database_path_from_url("sqlite:/var/lib/c.db"), "/var/lib/c.db");
        assert_eq!(database_path_from_url("plain.db"), "plain.db");
    }

    #[test]
    fn test_open_in_memory_creates_settings_table() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let version: i64 = db
            .connection()
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_reopen_file_database_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let path = path.to_str().unwrap();
        {
            let db = Database::open(path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO settings (catalog_name, root_path, primary_table, backup_table) \
                     VALUES ('c', '/r', 'p', 'b')",
                    [],
                )
                .unwrap();
        }
        let db = Database::open_url(&format!("sqlite://{}", path)).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
