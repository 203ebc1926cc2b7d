use crate::config::{AppConfig, OnError};
use crate::dedup::DedupResolver;
use crate::error::{Error, Result};
use crate::hasher::ChunkedHasher;
use crate::platform;
use crate::progress::ProgressReporter;
use crate::scanner::{WalkStats, Walker};
use crate::storage::models::{CollectionConfig, FileRecord};
use crate::storage::{validate_table_name, Database};
use std::fs::{File, Metadata};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

pub struct CatalogEngine {
    config: AppConfig,
    hasher: ChunkedHasher,
    resolver: DedupResolver,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub message: String,
}

/// Outcome of one traversal job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub collection: CollectionConfig,
    pub files_catalogued: usize,
    /// Files that could not be opened or read, or whose path is not UTF-8.
    pub files_skipped: usize,
    /// Files whose lookup or write failed.
    pub files_failed: usize,
    pub dedup_matches: usize,
    pub bytes_hashed: u64,
    pub walk: WalkStats,
    pub failures: Vec<FileFailure>,
    pub duration: Duration,
}

impl JobReport {
    fn new(collection: &CollectionConfig) -> Self {
        Self {
            collection: collection.clone(),
            files_catalogued: 0,
            files_skipped: 0,
            files_failed: 0,
            dedup_matches: 0,
            bytes_hashed: 0,
            walk: WalkStats::default(),
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedJob {
    pub collection: CollectionConfig,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub jobs: Vec<JobReport>,
    pub failed_jobs: Vec<FailedJob>,
}

impl RunSummary {
    /// No job failed outright and no file failed to be catalogued.
    /// Skipped (unreadable) files don't count as failures.
    pub fn is_clean(&self) -> bool {
        self.failed_jobs.is_empty() && self.jobs.iter().all(|job| job.files_failed == 0)
    }

    pub fn files_catalogued(&self) -> usize {
        self.jobs.iter().map(|job| job.files_catalogued).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.jobs.iter().map(|job| job.files_failed).sum()
    }
}

impl CatalogEngine {
    pub fn new(config: AppConfig) -> Result<Self> {
        let hasher = config.hasher()?;
        let resolver = DedupResolver::new(config.match_policy);
        Ok(Self {
            config,
            hasher,
            resolver,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.config.database_url = path.to_string();
        self
    }

    /// Shared flag checked between files; setting it stops the current job
    /// with `Error::Cancelled`.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn open_database(&self) -> Result<Database> {
        Ok(Database::open_url(&self.config.database_url)?)
    }

    /// Run every configured job in order, seeding the default collection
    /// into an empty settings table first.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunSummary> {
        let db = self.open_database()?;
        let jobs = db.collections_or_seed(&self.config.default_collection)?;
        info!("{} collection(s) to process", jobs.len());
        self.run_jobs(&db, &jobs, reporter)
    }

    /// Run only the configured jobs writing to `primary_table`.
    pub fn run_only(
        &self,
        primary_table: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let db = self.open_database()?;
        let jobs: Vec<CollectionConfig> = db
            .collections_or_seed(&self.config.default_collection)?
            .into_iter()
            .filter(|job| job.primary_table == primary_table)
            .collect();
        if jobs.is_empty() {
            return Err(Error::Other(format!(
                "No configured collection writes to table '{}'",
                primary_table
            )));
        }
        self.run_jobs(&db, &jobs, reporter)
    }

    /// Run `jobs` sequentially. Under `OnError::Continue` a job whose root or
    /// tables are unusable is recorded and the next job runs.
    pub fn run_jobs(
        &self,
        db: &Database,
        jobs: &[CollectionConfig],
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for job in jobs {
            match self.run_job(db, job, reporter) {
                Ok(report) => summary.jobs.push(report),
                Err(err @ (Error::RootUnreadable { .. } | Error::InvalidTableName(_)))
                    if self.config.on_error == OnError::Continue =>
                {
                    error!("Collection {} failed: {}", job.primary_table, err);
                    reporter.on_job_failed(job, &err.to_string());
                    summary.failed_jobs.push(FailedJob {
                        collection: job.clone(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }

    /// Walk one collection root, cataloguing every readable file into the
    /// job's primary table.
    pub fn run_job(
        &self,
        db: &Database,
        job: &CollectionConfig,
        reporter: &dyn ProgressReporter,
    ) -> Result<JobReport> {
        validate_table_name(&job.primary_table)?;
        validate_table_name(&job.backup_table)?;

        info!(
            "Cataloguing {} into {} (backup: {})",
            job.root_path, job.primary_table, job.backup_table
        );
        reporter.on_job_start(job);

        let start = Instant::now();
        let mut report = JobReport::new(job);
        let walker = Walker::new(&self.config.ignore_patterns).with_cancel(&self.cancel);

        let walk_stats = walker.walk(Path::new(&job.root_path), reporter, |path, catalog_path| {
            self.process_file(db, job, path, catalog_path, reporter, &mut report)
        })?;

        report.files_skipped += walk_stats.non_utf8_skipped;
        report.walk = walk_stats;
        report.duration = start.elapsed();
        info!(
            "{}: {} catalogued, {} skipped, {} failed, {} with backups in {:.2}s",
            job.primary_table,
            report.files_catalogued,
            report.files_skipped,
            report.files_failed,
            report.dedup_matches,
            report.duration.as_secs_f64(),
        );
        reporter.on_job_complete(&report);
        Ok(report)
    }

    fn process_file(
        &self,
        db: &Database,
        job: &CollectionConfig,
        path: &Path,
        catalog_path: &str,
        reporter: &dyn ProgressReporter,
        report: &mut JobReport,
    ) -> Result<()> {
        let (outcome, metadata) = match hash_with_metadata(&self.hasher, path) {
            Ok(hashed) => hashed,
            Err(e) => {
                warn!("Cannot hash {}: {}", catalog_path, e);
                reporter.on_file_skipped(catalog_path, &e.to_string());
                report.files_skipped += 1;
                return Ok(());
            }
        };

        if outcome.bytes_hashed != metadata.len() {
            warn!(
                "{} changed while hashing: expected {} bytes, hashed {}",
                catalog_path,
                metadata.len(),
                outcome.bytes_hashed
            );
        }

        let mut record = FileRecord {
            full_path: catalog_path.to_string(),
            name: platform::file_name_string(path),
            size_bytes: i64::try_from(outcome.bytes_hashed).unwrap_or(i64::MAX),
            digest: outcome.digest,
            backup_location: None,
            last_modified: modified_secs(&metadata),
        };
        report.bytes_hashed += outcome.bytes_hashed;

        let stored = self
            .resolver
            .resolve(db, &record, &job.backup_table, &job.primary_table)
            .and_then(|location| {
                record.backup_location = location;
                db.upsert_file_record(&job.primary_table, &record)
            });

        match stored {
            Ok(()) => {
                debug!("Catalogued {} ({})", record.full_path, record.digest);
                if record.backup_location.is_some() {
                    report.dedup_matches += 1;
                }
                report.files_catalogued += 1;
                reporter.on_file_hashed(
                    &record.full_path,
                    &record.digest,
                    record.backup_location.as_deref(),
                );
                Ok(())
            }
            Err(err) => match self.config.on_error {
                OnError::Continue => {
                    error!("Failed to catalogue {}: {}", catalog_path, err);
                    reporter.on_file_failed(catalog_path, &record.digest, &err.to_string());
                    report.files_failed += 1;
                    report.failures.push(FileFailure {
                        path: catalog_path.to_string(),
                        message: err.to_string(),
                    });
                    Ok(())
                }
                OnError::Abort => Err(err),
            },
        }
    }
}

/// Open once, stat and hash through the same handle.
fn hash_with_metadata(
    hasher: &ChunkedHasher,
    path: &Path,
) -> std::io::Result<(crate::hasher::HashOutcome, Metadata)> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let outcome = hasher.hash_reader(&file, metadata.len())?;
    Ok((outcome, metadata))
}

fn modified_secs(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
