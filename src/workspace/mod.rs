//! Per-chat working directory tracking.
//!
//! Every chat starts in the configured workspace root and may move with
//! `/cd` or `/home`. The mapping is in-memory only; a restart puts every
//! chat back at the root.

pub mod path_safety;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::info;

use crate::models::ChatId;
use crate::{AppError, Result};

/// Maps chat identifiers to their current working directory.
#[derive(Debug)]
pub struct WorkspaceResolver {
    default_root: PathBuf,
    home_dir: PathBuf,
    allowed_roots: Vec<PathBuf>,
    current: Mutex<HashMap<ChatId, PathBuf>>,
}

impl WorkspaceResolver {
    /// Create a resolver whose chats start in `default_root`.
    #[must_use]
    pub fn new(default_root: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            default_root,
            home_dir,
            allowed_roots: Vec::new(),
            current: Mutex::new(HashMap::new()),
        }
    }

    /// Restrict workspace changes to directories under `roots`.
    #[must_use]
    pub fn with_allowed_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.allowed_roots = roots;
        self
    }

    /// Create the default workspace root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory cannot be created.
    pub async fn ensure_default_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.default_root)
            .await
            .map_err(|err| {
                AppError::Config(format!(
                    "cannot create workspace root {}: {err}",
                    self.default_root.display()
                ))
            })
    }

    /// Directory every chat starts in.
    #[must_use]
    pub fn default_root(&self) -> &Path {
        &self.default_root
    }

    /// Current working directory of `chat_id`.
    pub async fn current(&self, chat_id: ChatId) -> PathBuf {
        self.current
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_else(|| self.default_root.clone())
    }

    /// Move `chat_id` to `input`, resolved against its current directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Workspace` if the target is missing, not a
    /// directory, or outside the permitted roots. The chat's workspace is
    /// left unchanged on error.
    pub async fn change(&self, chat_id: ChatId, input: &str) -> Result<PathBuf> {
        let current = self.current(chat_id).await;
        let resolved = path_safety::resolve_directory(&current, input, &self.home_dir).await?;
        path_safety::ensure_within_roots(&resolved, &self.allowed_roots)?;

        self.current.lock().await.insert(chat_id, resolved.clone());
        info!(chat_id, workspace = %resolved.display(), "workspace changed");
        Ok(resolved)
    }

    /// Move `chat_id` to the home directory.
    ///
    /// # Errors
    ///
    /// See [`WorkspaceResolver::change`].
    pub async fn go_home(&self, chat_id: ChatId) -> Result<PathBuf> {
        self.change(chat_id, "~").await
    }

    /// Render `path` for display, abbreviating the home directory to `~`.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        format_path(path, &self.home_dir)
    }
}

/// Render `path` with a leading `home` replaced by `~`.
#[must_use]
pub fn format_path(path: &Path, home: &Path) -> String {
    if home.as_os_str().is_empty() {
        return path.display().to_string();
    }
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_owned(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
