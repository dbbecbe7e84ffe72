//! Human-readable session titles derived from transcript content.
//!
//! The agent writes one JSON object per line: a `session` header, then
//! `message` entries, plus optional `session_info` entries carrying a
//! user-chosen name. An explicit name wins over the first user message.

use std::path::Path;

use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::models::session::SessionFileName;

/// Longest title returned, in characters, before the ellipsis.
pub const TITLE_MAX_CHARS: usize = 40;

/// Bytes of transcript read when looking for a title.
const READ_LIMIT: u64 = 256 * 1024;

/// Title for the log at `path`, or a label derived from its file name if
/// the content cannot be read or holds nothing usable.
pub async fn session_title(path: &Path) -> String {
    match read_head(path).await {
        Some(head) => extract_title(&head).unwrap_or_else(|| fallback_title(path)),
        None => fallback_title(path),
    }
}

/// Title from transcript text; `None` if nothing usable is found.
#[must_use]
pub fn extract_title(transcript: &str) -> Option<String> {
    let mut first_user_message = None;

    for line in transcript.lines() {
        let Ok(entry) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        match entry.get("type").and_then(Value::as_str) {
            Some("session") => {
                if let Some(title) = entry.get("title").and_then(Value::as_str).and_then(clean) {
                    return Some(title);
                }
            }
            Some("session_info") => {
                if let Some(name) = entry.get("name").and_then(Value::as_str).and_then(clean) {
                    return Some(name);
                }
            }
            Some("message") if first_user_message.is_none() => {
                let Some(message) = entry.get("message") else {
                    continue;
                };
                if message.get("role").and_then(Value::as_str) == Some("user") {
                    first_user_message = message
                        .get("content")
                        .and_then(content_text)
                        .as_deref()
                        .and_then(clean);
                }
            }
            _ => {}
        }
    }

    first_user_message
}

/// Label built from the file name alone.
#[must_use]
pub fn fallback_title(path: &Path) -> String {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    match SessionFileName::parse(filename) {
        Some(name) if name.is_archived() => format!("Chat {} (archived)", name.chat_id),
        Some(name) => format!("Chat {}", name.chat_id),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map_or_else(|| "Untitled session".to_owned(), str::to_owned),
    }
}

async fn read_head(path: &Path) -> Option<String> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut buf = Vec::new();
    file.take(READ_LIMIT).read_to_end(&mut buf).await.ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Plain text of a message `content`: a string, or text parts of an array.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then(|| text.join(" "))
        }
        _ => None,
    }
}

/// First non-blank line, whitespace collapsed, truncated to [`TITLE_MAX_CHARS`].
fn clean(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        Some(collapsed)
    } else {
        let truncated: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
        Some(format!("{}…", truncated.trim_end()))
    }
}
