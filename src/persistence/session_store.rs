//! File-backed session log store.
//!
//! The directory listing is the source of truth: there is no index file.
//! Every operation recognises files by [`SessionFileName`] and ignores
//! anything else in the directory.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::title;
use crate::models::session::{SessionFile, SessionFileName};
use crate::models::ChatId;
use crate::{AppError, Result};

/// Upper bound on `_<n>` disambiguators tried for one archive.
const MAX_ARCHIVE_ATTEMPTS: u32 = 100;

/// Session logs under one root directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Session root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the active log for `chat_id`.
    #[must_use]
    pub fn path_for(&self, chat_id: ChatId) -> PathBuf {
        self.root.join(SessionFileName::active(chat_id).to_string())
    }

    /// Create the session root if absent. Safe to call concurrently.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            AppError::Io(format!(
                "cannot create session directory {}: {err}",
                self.root.display()
            ))
        })
    }

    /// Enumerate every session log, active and archived, in directory order.
    ///
    /// A missing root yields an empty list. Files that disappear while
    /// listing are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the root exists but cannot be read.
    pub async fn list(&self) -> Result<Vec<SessionFile>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error("cannot read session directory", &err)),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| self.io_error("cannot read session directory", &err))?
        {
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(name) = SessionFileName::parse(&filename) else {
                debug!(filename, "skipping file outside the session naming convention");
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    warn!(filename, %err, "cannot stat session file");
                    continue;
                }
            };
            let modified_at = metadata
                .modified()
                .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from);

            files.push(SessionFile {
                path: entry.path(),
                filename,
                chat_id: name.chat_id,
                archived: name.is_archived(),
                size_bytes: metadata.len(),
                modified_at,
            });
        }

        Ok(files)
    }

    /// [`SessionStore::list`] sorted most recently modified first.
    ///
    /// # Errors
    ///
    /// See [`SessionStore::list`].
    pub async fn list_recent(&self) -> Result<Vec<SessionFile>> {
        let mut files = self.list().await?;
        sort_newest_first(&mut files);
        Ok(files)
    }

    /// Rename the active log of `chat_id` to a timestamped archive.
    ///
    /// Returns the archive file name, or `None` without touching the
    /// filesystem when the chat has no active log. Existing archives are
    /// never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the rename fails.
    pub async fn archive(&self, chat_id: ChatId) -> Result<Option<String>> {
        let active = self.path_for(chat_id);
        match tokio::fs::metadata(&active).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error("cannot stat active session", &err)),
        }

        let now = Utc::now();
        for attempt in 0..MAX_ARCHIVE_ATTEMPTS {
            let name = SessionFileName::archived(chat_id, now, attempt).to_string();
            let target = self.root.join(&name);
            let taken = tokio::fs::try_exists(&target)
                .await
                .map_err(|err| self.io_error("cannot probe archive name", &err))?;
            if taken {
                continue;
            }

            return match tokio::fs::rename(&active, &target).await {
                Ok(()) => {
                    info!(chat_id, archive = name, "session archived");
                    Ok(Some(name))
                }
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(self.io_error("cannot archive session", &err)),
            };
        }

        Err(AppError::Io(format!(
            "no free archive name for chat {chat_id} after {MAX_ARCHIVE_ATTEMPTS} attempts"
        )))
    }

    /// Keep the `retain_per_chat` most recent logs of every chat and delete
    /// the rest. Returns how many files were deleted.
    ///
    /// A file that cannot be deleted is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` only if the directory cannot be listed.
    pub async fn cleanup(&self, retain_per_chat: usize) -> Result<usize> {
        let mut by_chat: BTreeMap<ChatId, Vec<SessionFile>> = BTreeMap::new();
        for file in self.list().await? {
            by_chat.entry(file.chat_id).or_default().push(file);
        }

        let mut deleted = 0;
        for (chat_id, mut group) in by_chat {
            sort_newest_first(&mut group);
            for stale in group.into_iter().skip(retain_per_chat) {
                match tokio::fs::remove_file(&stale.path).await {
                    Ok(()) => {
                        deleted += 1;
                        debug!(chat_id, filename = stale.filename, "deleted old session");
                    }
                    Err(err) => {
                        warn!(chat_id, filename = stale.filename, %err, "failed to delete old session");
                    }
                }
            }
        }

        info!(deleted, retain_per_chat, "session cleanup finished");
        Ok(deleted)
    }

    /// Short human-readable label for a session log. Never fails.
    pub async fn title_for(&self, path: &Path) -> String {
        title::session_title(path).await
    }

    fn io_error(&self, context: &str, err: &std::io::Error) -> AppError {
        AppError::Io(format!("{context} in {}: {err}", self.root.display()))
    }
}

/// Newest first; on equal times the active log sorts ahead of archives.
fn sort_newest_first(files: &mut [SessionFile]) {
    files.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.archived.cmp(&b.archived))
            .then_with(|| b.filename.cmp(&a.filename))
    });
}

/// Coarse age of a session: `now`, `5m`, `3h`, `2d`.
#[must_use]
pub fn format_session_age(modified_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - modified_at).num_seconds().max(0);
    match seconds {
        s if s < 60 => "now".to_owned(),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}

/// Coarse file size: `512B`, `12KB`, `1.4MB`, `2.0GB`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // display only
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{bytes}B")
    } else if bytes < MB {
        format!("{}KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    }
}
