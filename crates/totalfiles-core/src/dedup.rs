//! Backup-location lookup by content digest.

use crate::error::Result;
use crate::storage::models::FileRecord;
use crate::storage::Database;
use serde::Deserialize;
use tracing::trace;

/// What counts as "the same content" when matching against a backup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Equal digests match.
    #[default]
    Digest,
    /// Equal digests and equal sizes match.
    DigestAndSize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupResolver {
    policy: MatchPolicy,
}

impl DedupResolver {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Find a prior copy of `record`'s content in `backup_table`.
    ///
    /// Returns `"{backup_table}@{matched_full_path}"`, or `None` when nothing
    /// matches. When the backup table is also the table `record` is written
    /// to, its own path is never reported as its backup.
    pub fn resolve(
        &self,
        db: &Database,
        record: &FileRecord,
        backup_table: &str,
        primary_table: &str,
    ) -> Result<Option<String>> {
        let size = match self.policy {
            MatchPolicy::Digest => None,
            MatchPolicy::DigestAndSize => Some(record.size_bytes),
        };
        let exclude = (backup_table == primary_table).then_some(record.full_path.as_str());

        let location = db
            .find_by_digest(backup_table, &record.digest, size, exclude)?
            .map(|found| backup_location(backup_table, &found.full_path));

        trace!(
            path = %record.full_path,
            digest = %record.digest,
            found = location.is_some(),
            "Dedup lookup in {}",
            backup_table
        );
        Ok(location)
    }
}

pub fn backup_location(backup_table: &str, full_path: &str) -> String {
    format!("{}@{}", backup_table, full_path)
}
