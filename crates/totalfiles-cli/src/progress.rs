use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use totalfiles_core::{CollectionConfig, JobReport, ProgressReporter};

/// CLI progress reporter.
///
/// Prints a line per visited path and a digest line per hashed file to
/// stdout, with a spinner on stderr counting files for the current job.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    files_hashed: AtomicUsize,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            files_hashed: AtomicUsize::new(0),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    /// Print to stdout without tearing the spinner.
    fn print_line(&self, line: String) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(pb) => pb.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_job_start(&self, job: &CollectionConfig) {
        self.files_hashed.store(0, Ordering::Relaxed);
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(format!("Cataloguing {} into {}", job.root_path, job.primary_table));
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_path_visited(&self, path: &str) {
        self.print_line(path.to_string());
    }

    fn on_file_hashed(&self, _path: &str, digest: &str, backup_location: Option<&str>) {
        let count = self.files_hashed.fetch_add(1, Ordering::Relaxed) + 1;
        let line = match backup_location {
            Some(location) => format!("{} {} {}", digest, "=>".dimmed(), location.green()),
            None => digest.to_string(),
        };
        self.print_line(line);

        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(format!("Cataloguing... {} files hashed", count));
        }
    }

    fn on_file_skipped(&self, path: &str, reason: &str) {
        self.print_line(format!("{} {} ({})", "skipped".yellow(), path, reason));
    }

    fn on_file_failed(&self, path: &str, digest: &str, reason: &str) {
        self.print_line(digest.to_string());
        self.print_line(format!("{} {} ({})", "failed".red(), path, reason));
    }

    fn on_job_complete(&self, report: &JobReport) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m {}: {} files catalogued, {} with backups, {} skipped, {} failed in {:.2}s",
            report.collection.primary_table,
            report.files_catalogued,
            report.dedup_matches,
            report.files_skipped,
            report.files_failed,
            report.duration.as_secs_f64()
        );
    }

    fn on_job_failed(&self, job: &CollectionConfig, reason: &str) {
        self.finish_bar();
        eprintln!("  \x1b[31m✗\x1b[0m {}: {}", job.primary_table, reason);
    }
}
