use serde::Deserialize;

/// One catalogued file, keyed by `full_path` within its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub full_path: String,
    pub name: String,
    pub size_bytes: i64,
    pub digest: String,
    /// `"{backup_table}@{full_path}"` of a prior copy of the same content.
    pub backup_location: Option<String>,
    pub last_modified: i64,
}

/// One traversal job: walk `root_path`, write into `primary_table`, look up
/// duplicates in `backup_table`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub catalog_name: String,
    pub root_path: String,
    pub primary_table: String,
    pub backup_table: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            catalog_name: "filecatalogue".to_string(),
            root_path: ".".to_string(),
            primary_table: "files".to_string(),
            backup_table: "files_backup".to_string(),
        }
    }
}

/// A settings row, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection {
    pub id: i64,
    pub collection: CollectionConfig,
}
