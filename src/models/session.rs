//! Session log naming convention and file metadata.
//!
//! Active logs are `telegram-<chat>.jsonl`; archives append a UTC
//! timestamp, `telegram-<chat>-20261019T101530123Z.jsonl`, with a `_<n>`
//! suffix when two archives land in the same millisecond.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use super::ChatId;

/// File name prefix shared by every session log.
pub const SESSION_PREFIX: &str = "telegram";

/// File extension of session logs (the agent writes JSON lines).
pub const SESSION_EXTENSION: &str = "jsonl";

const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // The prefix and extension are fixed literals, so this cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^telegram-(-?\d+)(?:-(\d{8}T\d{9}Z(?:_\d+)?))?\.jsonl$")
        .expect("session file name pattern is valid")
});

/// Parsed session file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionFileName {
    /// Chat the log belongs to.
    pub chat_id: ChatId,
    /// Archive tag (`<timestamp>[_<n>]`); `None` for the active log.
    pub archive_tag: Option<String>,
}

impl SessionFileName {
    /// Name of the active log for `chat_id`.
    #[must_use]
    pub fn active(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            archive_tag: None,
        }
    }

    /// Name of an archive of `chat_id` taken at `at`. `attempt` 0 yields the
    /// plain timestamp; higher values add a disambiguating suffix.
    #[must_use]
    pub fn archived(chat_id: ChatId, at: DateTime<Utc>, attempt: u32) -> Self {
        let stamp = at.format(ARCHIVE_STAMP_FORMAT).to_string();
        let tag = if attempt == 0 {
            stamp
        } else {
            format!("{stamp}_{attempt}")
        };
        Self {
            chat_id,
            archive_tag: Some(tag),
        }
    }

    /// Parse a file name; `None` for files outside the convention.
    #[must_use]
    pub fn parse(filename: &str) -> Option<Self> {
        let captures = NAME_PATTERN.captures(filename)?;
        let chat_id = captures.get(1)?.as_str().parse().ok()?;
        let archive_tag = captures.get(2).map(|m| m.as_str().to_owned());
        Some(Self {
            chat_id,
            archive_tag,
        })
    }

    /// Whether this names an archived (immutable) log.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.archive_tag.is_some()
    }
}

impl Display for SessionFileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.archive_tag {
            Some(tag) => write!(
                f,
                "{SESSION_PREFIX}-{}-{tag}.{SESSION_EXTENSION}",
                self.chat_id
            ),
            None => write!(f, "{SESSION_PREFIX}-{}.{SESSION_EXTENSION}", self.chat_id),
        }
    }
}

/// Metadata of one session log on disk.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionFile {
    /// Absolute path of the log.
    pub path: PathBuf,
    /// File name within the session root.
    pub filename: String,
    /// Chat the log belongs to.
    pub chat_id: ChatId,
    /// Whether the log is an archive rather than the active log.
    pub archived: bool,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}
