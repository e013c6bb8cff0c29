// src/core/paths.rs

use std::path::{Component, Path, PathBuf};

/// Resolves `file_name` against the directory that owns the source document:
/// the parent of `source` when it is a file, otherwise `source` itself.
/// The result is absolute and lexically normalized.
pub fn resolve_relative_to_source(source: &Path, file_name: &str) -> PathBuf {
    let base = if source.is_file() {
        source.parent().unwrap_or(source)
    } else {
        source
    };

    normalize(&base.join(file_name))
}

/// Collapses `.` and `..` components without touching the filesystem, so
/// paths that do not exist yet still normalize. Relative inputs are anchored
/// at the current working directory first.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op, same as `/..` on POSIX.
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    dunce::simplified(&normalized).to_path_buf()
}

// MARK: --- UNIT TESTS ---
