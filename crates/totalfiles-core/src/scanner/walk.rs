use crate::error::{Error, Result};
use crate::platform;
use crate::progress::ProgressReporter;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub dirs_visited: usize,
    pub files_visited: usize,
    /// Directories that could not be listed; their subtrees were skipped.
    pub dirs_skipped: usize,
    /// Single entries the walk could not read (vanished, bad file type).
    pub entries_skipped: usize,
    /// Entries whose path is not valid UTF-8 and so has no catalog key.
    pub non_utf8_skipped: usize,
    /// Entries matching an ignore pattern.
    pub ignored: usize,
    /// Symlinks to non-files, FIFOs, sockets, devices.
    pub others_skipped: usize,
}

/// Depth-first, pre-order walk over one collection root. Entries within a
/// directory are visited in file-name order.
///
/// Directory symlinks are never followed. A root that cannot be listed fails
/// the walk; any deeper directory that cannot be listed is logged and skipped.
pub struct Walker<'a> {
    ignore_patterns: Vec<Pattern>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Walker<'a> {
    pub fn new(ignore_globs: &[String]) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            ignore_patterns,
            cancel: None,
        }
    }

    /// Stop the walk with `Error::Cancelled` once `flag` is set.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    /// Walk `root`, calling `visit(path, catalog_path)` for every regular
    /// file. An error returned by `visit` stops the walk and is returned.
    pub fn walk<F>(
        &self,
        root: &Path,
        reporter: &dyn ProgressReporter,
        mut visit: F,
    ) -> Result<WalkStats>
    where
        F: FnMut(&Path, &str) -> Result<()>,
    {
        let root = platform::absolute_path(root)?;
        if let Err(source) = fs::read_dir(&root) {
            return Err(Error::RootUnreadable { path: root, source });
        }

        let mut stats = WalkStats::default();
        let mut entries = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        // walkdir reports a failed listing right after the directory entry.
        let mut last_dir: Option<PathBuf> = None;

        loop {
            if self.is_cancelled() {
                warn!("Walk of {} cancelled", root.display());
                return Err(Error::Cancelled);
            }

            let entry = match entries.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    if err.depth() == 0 {
                        let source = err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk failed at root"));
                        return Err(Error::RootUnreadable { path: root, source });
                    }
                    if err.path().is_some() && err.path() == last_dir.as_deref() {
                        warn!("Skipping unreadable directory {}: {}", path, err);
                        stats.dirs_skipped += 1;
                    } else {
                        warn!("Skipping unreadable entry {}: {}", path, err);
                        stats.entries_skipped += 1;
                    }
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if self.is_ignored(path) {
                debug!("Ignoring {}", path.display());
                if file_type.is_dir() {
                    entries.skip_current_dir();
                }
                stats.ignored += 1;
                continue;
            }

            let catalog_path = platform::catalog_path_string(path);

            if path.to_str().is_none() {
                // A lossy key could collide with another file's record.
                warn!("Skipping {}: path is not valid UTF-8", catalog_path);
                if file_type.is_dir() {
                    entries.skip_current_dir();
                }
                reporter.on_file_skipped(&catalog_path, "path is not valid UTF-8");
                stats.non_utf8_skipped += 1;
                continue;
            }

            if file_type.is_dir() {
                reporter.on_path_visited(&catalog_path);
                stats.dirs_visited += 1;
                last_dir = Some(path.to_path_buf());
            } else if file_type.is_file() {
                reporter.on_path_visited(&catalog_path);
                stats.files_visited += 1;
                visit(path, &catalog_path)?;
            } else if file_type.is_symlink() && points_to_file(path) {
                reporter.on_path_visited(&catalog_path);
                stats.files_visited += 1;
                visit(path, &catalog_path)?;
            } else {
                debug!("Skipping non-regular entry {}", path.display());
                stats.others_skipped += 1;
            }
        }

        Ok(stats)
    }
}

fn points_to_file(link: &Path) -> bool {
    fs::metadata(link).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn collect(walker: &Walker, root: &Path) -> (Vec<String>, WalkStats) {
        let mut seen = Vec::new();
        let stats = walker
            .walk(root, &SilentReporter, |_, catalog_path| {
                seen.push(catalog_path.to_string());
                Ok(())
            })
            .unwrap();
        (seen, stats)
    }

    #[test]
    fn test_visits_every_file_once() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("d")).unwrap();
        for file in ["top.txt", "a/one.txt", "a/b/two.txt", "a/b/c/three.txt", "d/four.txt"] {
            fs::write(root.join(file), file).unwrap();
        }

        let (seen, stats) = collect(&Walker::new(&[]), root);
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 5);
        assert_eq!(stats.files_visited, 5);
        assert_eq!(stats.dirs_visited, 4);
        assert!(seen.iter().all(|p| !p.contains('\\')));
        assert!(seen.iter().any(|p| p.ends_with("/a/b/c/three.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_paths_are_absolute_for_relative_root() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("f.txt"), "f").unwrap();
        let cwd = std::env::current_dir().unwrap();
        let relative: PathBuf = pathdiff(tmp.path(), &cwd);

        let (seen, _) = collect(&Walker::new(&[]), &relative);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with('/'));
        assert!(!seen[0].contains("/../"));
    }

    #[cfg(unix)]
    /// `target` expressed relative to `base` through `..` components.
    fn pathdiff(target: &Path, base: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for _ in base.components().skip(1) {
            result.push("..");
        }
        for component in target.components().skip(1) {
            result.push(component.as_os_str());
        }
        result
    }

    #[test]
    fn test_missing_root_is_root_unreadable() {
        let tmp = tempdir().unwrap();
        let err = Walker::new(&[])
            .walk(&tmp.path().join("missing"), &SilentReporter, |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::RootUnreadable { .. }));
    }

    #[test]
    fn test_ignore_patterns_prune_directories() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/objects/blob"), "x").unwrap();
        fs::write(root.join("keep.txt"), "x").unwrap();
        fs::write(root.join("skip.tmp"), "x").unwrap();

        let walker = Walker::new(&["*/.git".to_string(), "*.tmp".to_string()]);
        let (seen, stats) = collect(&walker, root);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("/keep.txt"));
        assert_eq!(stats.ignored, 2);
    }

    #[test]
    fn test_visit_error_stops_walk() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("a"), "a").unwrap();
        fs::write(tmp.path().join("b"), "b").unwrap();

        let mut calls = 0;
        let err = Walker::new(&[])
            .walk(tmp.path(), &SilentReporter, |_, _| {
                calls += 1;
                Err(Error::Other("stop".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancel_flag_stops_walk() {
        let tmp = tempdir().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("f{i}")), "x").unwrap();
        }
        let flag = AtomicBool::new(false);
        let walker = Walker::new(&[]).with_cancel(&flag);

        let mut calls = 0;
        let err = walker
            .walk(tmp.path(), &SilentReporter, |_, _| {
                calls += 1;
                flag.store(true, Ordering::Relaxed);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(calls, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_to_files_are_visited_and_dir_links_are_not() {
        use std::os::unix::fs::symlink;

        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/real.txt"), "x").unwrap();
        symlink(root.join("sub/real.txt"), root.join("link.txt")).unwrap();
        symlink(&root, root.join("sub/loop")).unwrap();

        let (seen, stats) = collect(&Walker::new(&[]), &root);
        assert_eq!(seen.len(), 2);
        assert_eq!(stats.others_skipped, 1);
    }

    /// Removes `doomed` as soon as the walk reports `trigger`.
    struct RemovingReporter {
        trigger: &'static str,
        doomed: PathBuf,
    }

    impl ProgressReporter for RemovingReporter {
        fn on_path_visited(&self, path: &str) {
            if path.ends_with(self.trigger) {
                fs::remove_dir_all(&self.doomed).unwrap();
            }
        }
    }

    #[test]
    fn test_unlistable_subdirectory_is_skipped() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::write(root.join("b_dir/hidden.txt"), "x").unwrap();
        fs::write(root.join("a.txt"), "x").unwrap();
        fs::write(root.join("c.txt"), "x").unwrap();

        // Listed with its parent, gone by the time the walk descends into it.
        let reporter = RemovingReporter {
            trigger: "/a.txt",
            doomed: root.join("b_dir"),
        };
        let mut seen = Vec::new();
        let stats = Walker::new(&[])
            .walk(root, &reporter, |_, catalog_path| {
                seen.push(catalog_path.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(seen[0].ends_with("/a.txt"));
        assert!(seen[1].ends_with("/c.txt"));
        assert_eq!(stats.dirs_skipped, 1);
        assert_eq!(stats.entries_skipped, 0);
    }

    #[test]
    fn test_entries_are_visited_in_name_order() {
        let tmp = tempdir().unwrap();
        for name in ["c.txt", "a.txt", "b.txt"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }

        let (seen, _) = collect(&Walker::new(&[]), tmp.path());
        let names: Vec<&str> = seen.iter().map(|p| &p[p.len() - 5..]).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
    }

    #[derive(Default)]
    struct SkipRecorder {
        skipped: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressReporter for SkipRecorder {
        fn on_file_skipped(&self, path: &str, _reason: &str) {
            self.skipped.lock().unwrap().push(path.to_string());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped_not_merged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join(OsStr::from_bytes(b"a\xff")), "first").unwrap();
        fs::write(root.join(OsStr::from_bytes(b"a\xfe")), "second").unwrap();
        fs::create_dir_all(root.join(OsStr::from_bytes(b"d\xff"))).unwrap();
        fs::write(root.join(OsStr::from_bytes(b"d\xff/inner.txt")), "x").unwrap();
        fs::write(root.join("ok.txt"), "ok").unwrap();

        let reporter = SkipRecorder::default();
        let mut seen = Vec::new();
        let stats = Walker::new(&[])
            .walk(root, &reporter, |_, catalog_path| {
                seen.push(catalog_path.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("/ok.txt"));
        assert_eq!(stats.non_utf8_skipped, 3);
        assert_eq!(stats.files_visited, 1);
        assert_eq!(reporter.skipped.lock().unwrap().len(), 3);
    }
}
