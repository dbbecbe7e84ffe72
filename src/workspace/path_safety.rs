//! Path normalization and workspace-root boundary checks.
//!
//! A requested workspace is resolved lexically first (`~`, `.`, `..`),
//! then canonicalized so symlinks are followed before the boundary check.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Expand a leading `~` to `home`. Other paths are returned unchanged.
#[must_use]
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Lexically normalize `path`: drop `.` segments and fold `..` into its
/// parent. `..` at the filesystem root stays at the root.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }
    normalized
}

/// Resolve a user-supplied directory against the chat's current workspace.
///
/// Accepts `~`, `~/sub`, absolute paths, and paths relative to `current`.
/// Returns the canonical (symlink-free) path of an existing directory.
///
/// # Errors
///
/// Returns `AppError::Workspace` if the path does not exist or is not a
/// directory.
pub async fn resolve_directory(current: &Path, input: &str, home: &Path) -> Result<PathBuf> {
    let expanded = expand_home(Path::new(input.trim()), home);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        current.join(expanded)
    };
    let candidate = normalize(&joined);

    let canonical = tokio::fs::canonicalize(&candidate).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::Workspace(format!("Directory not found: {}", candidate.display()))
        } else {
            AppError::Workspace(format!("Cannot access {}: {err}", candidate.display()))
        }
    })?;

    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|err| AppError::Workspace(format!("Cannot access {}: {err}", canonical.display())))?;
    if !metadata.is_dir() {
        return Err(AppError::Workspace(format!(
            "Not a directory: {}",
            canonical.display()
        )));
    }

    Ok(canonical)
}

/// Check that `path` lies under one of `roots`. An empty list allows anything.
///
/// `path` must already be canonical; roots are canonicalized here so a
/// symlinked root still matches its target.
///
/// # Errors
///
/// Returns `AppError::Workspace` if the path is outside every root.
pub fn ensure_within_roots(path: &Path, roots: &[PathBuf]) -> Result<()> {
    if roots.is_empty() {
        return Ok(());
    }

    let inside = roots.iter().any(|root| {
        let root = root.canonicalize().unwrap_or_else(|_| normalize(root));
        path.starts_with(root)
    });

    if inside {
        Ok(())
    } else {
        Err(AppError::Workspace(format!(
            "{} is outside the permitted workspace roots",
            path.display()
        )))
    }
}
