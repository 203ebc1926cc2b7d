pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use crate::config::{AppConfig, OnError};
pub use dedup::{DedupResolver, MatchPolicy};
pub use engine::{CatalogEngine, FailedJob, FileFailure, JobReport, RunSummary};
pub use error::{Error, Result};
pub use hasher::{Algorithm, ChunkedHasher, HashOutcome};
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::models::{CollectionConfig, FileRecord};
