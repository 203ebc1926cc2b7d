use crate::engine::JobReport;
use crate::storage::models::CollectionConfig;

/// Trait for reporting catalog progress.
///
/// The CLI prints a line per visited path and per digest. All methods have
/// default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_job_start(&self, _job: &CollectionConfig) {}
    fn on_path_visited(&self, _path: &str) {}
    fn on_file_hashed(&self, _path: &str, _digest: &str, _backup_location: Option<&str>) {}
    fn on_file_skipped(&self, _path: &str, _reason: &str) {}
    /// The file was hashed but its record could not be looked up or stored.
    fn on_file_failed(&self, _path: &str, _digest: &str, _reason: &str) {}
    fn on_job_complete(&self, _report: &JobReport) {}
    fn on_job_failed(&self, _job: &CollectionConfig, _reason: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
