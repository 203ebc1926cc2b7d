use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory and remove `.` and
/// `..` components lexically. Symlinks are not resolved.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    Ok(result)
}

/// Render a path the way the catalog stores it: no verbatim prefix,
/// forward-slash separators.
pub fn catalog_path_string(path: &Path) -> String {
    let lossy = path.to_string_lossy();
    let trimmed = lossy.strip_prefix(r"\\?\").unwrap_or(&lossy);
    trimmed.replace('\\', "/")
}

/// Absolute, normalized, forward-slash form of `path`.
pub fn normalize_path(path: &Path) -> io::Result<String> {
    Ok(catalog_path_string(&absolute_path(path)?))
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}
