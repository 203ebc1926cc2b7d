use super::models::*;
use super::sqlite::Database;
use crate::error::{Error, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

const SETTINGS_TABLE: &str = "settings";

const RECORD_COLUMNS: &str = "full_path, name, size_bytes, digest, backup_location, last_modified";

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    let reserved = name.eq_ignore_ascii_case(SETTINGS_TABLE)
        || name.to_ascii_lowercase().starts_with("sqlite_");

    if valid_start && valid_rest && !reserved {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        full_path: row.get(0)?,
        name: row.get(1)?,
        size_bytes: row.get(2)?,
        digest: row.get(3)?,
        backup_location: row.get(4)?,
        last_modified: row.get(5)?,
    })
}

impl Database {
    // ── File Tables ──────────────────────────────────────────────

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .connection()
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Create a file table and its digest index if they don't exist yet.
    pub fn ensure_file_table(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        if self.is_table_ensured(table) {
            return Ok(());
        }

        self.connection().execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                 full_path       TEXT PRIMARY KEY NOT NULL,
                 name            TEXT NOT NULL,
                 size_bytes      INTEGER NOT NULL,
                 digest          TEXT NOT NULL,
                 backup_location TEXT,
                 last_modified   INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS \"idx_{table}_digest\" ON \"{table}\" (digest);"
        ))?;
        self.mark_table_ensured(table);
        debug!("Ensured file table {}", table);
        Ok(())
    }

    /// Insert the record, or replace every field of the existing record
    /// with the same `full_path`.
    pub fn upsert_file_record(&self, table: &str, record: &FileRecord) -> Result<()> {
        self.ensure_file_table(table)?;
        let mut stmt = self.connection().prepare_cached(&format!(
            "INSERT INTO \"{table}\" ({RECORD_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(full_path) DO UPDATE SET \
                 name = excluded.name, \
                 size_bytes = excluded.size_bytes, \
                 digest = excluded.digest, \
                 backup_location = excluded.backup_location, \
                 last_modified = excluded.last_modified"
        ))?;
        stmt.execute(params![
            record.full_path,
            record.name,
            record.size_bytes,
            record.digest,
            record.backup_location,
            record.last_modified,
        ])?;
        Ok(())
    }

    pub fn get_file_record(&self, table: &str, full_path: &str) -> Result<Option<FileRecord>> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let record = self
            .connection()
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM \"{table}\" WHERE full_path = ?1"),
                params![full_path],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_file_records(&self, table: &str) -> Result<i64> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(0);
        }
        let count = self.connection().query_row(
            &format!("SELECT COUNT(*) FROM \"{table}\""),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All records in a table, ordered by path.
    pub fn list_file_records(&self, table: &str) -> Result<Vec<FileRecord>> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM \"{table}\" ORDER BY full_path"
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// First record (by insertion order) carrying `digest`.
    ///
    /// `size_bytes` additionally requires an equal size; `exclude_path`
    /// ignores the record stored under that path. A missing table is a
    /// normal "not found".
    pub fn find_by_digest(
        &self,
        table: &str,
        digest: &str,
        size_bytes: Option<i64>,
        exclude_path: Option<&str>,
    ) -> Result<Option<FileRecord>> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {RECORD_COLUMNS} FROM \"{table}\" \
             WHERE digest = ?1 \
               AND (?2 IS NULL OR size_bytes = ?2) \
               AND (?3 IS NULL OR full_path <> ?3) \
             ORDER BY rowid LIMIT 1"
        ))?;
        let record = stmt
            .query_row(params![digest, size_bytes, exclude_path], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Every record carrying `digest`, in insertion order.
    pub fn find_all_by_digest(&self, table: &str, digest: &str) -> Result<Vec<FileRecord>> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM \"{table}\" WHERE digest = ?1 ORDER BY rowid"
        ))?;
        let records = stmt
            .query_map(params![digest], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ── Settings ─────────────────────────────────────────────────

    pub fn list_collections(&self) -> Result<Vec<StoredCollection>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, catalog_name, root_path, primary_table, backup_table \
             FROM settings ORDER BY id",
        )?;
        let collections = stmt
            .query_map([], |row| {
                Ok(StoredCollection {
                    id: row.get(0)?,
                    collection: CollectionConfig {
                        catalog_name: row.get(1)?,
                        root_path: row.get(2)?,
                        primary_table: row.get(3)?,
                        backup_table: row.get(4)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    pub fn add_collection(&self, collection: &CollectionConfig) -> Result<i64> {
        validate_table_name(&collection.primary_table)?;
        validate_table_name(&collection.backup_table)?;
        self.connection().execute(
            "INSERT INTO settings (catalog_name, root_path, primary_table, backup_table) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                collection.catalog_name,
                collection.root_path,
                collection.primary_table,
                collection.backup_table,
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Configured jobs in insertion order. When the settings table is empty,
    /// `default` is stored first, so repeated calls return the same list.
    pub fn collections_or_seed(&self, default: &CollectionConfig) -> Result<Vec<CollectionConfig>> {
        let tx = self.connection().unchecked_transaction()?;
        let existing = self.list_collections()?;
        let collections = if existing.is_empty() {
            self.add_collection(default)?;
            info!(
                "No collections configured, seeded default: {} -> {}",
                default.root_path, default.primary_table
            );
            vec![default.clone()]
        } else {
            existing.into_iter().map(|s| s.collection).collect()
        };
        tx.commit()?;
        Ok(collections)
    }
}
