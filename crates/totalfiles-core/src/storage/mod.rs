pub mod models;
pub mod queries;
pub mod sqlite;

pub use queries::validate_table_name;
pub use sqlite::Database;
