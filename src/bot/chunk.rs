//! Splitting long replies to fit the message size limit.

/// Telegram's message length limit.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Split `text` into chunks of at most `limit` characters.
///
/// Prefers the last newline inside the window, then the last space, as long
/// as it falls in the window's second half; otherwise splits hard at the
/// limit. Whitespace at the start of each following chunk is dropped.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some((window_end, _)) = remaining.char_indices().nth(limit) else {
            chunks.push(remaining.to_owned());
            break;
        };
        let window = &remaining[..window_end];
        let half = remaining
            .char_indices()
            .nth(limit / 2)
            .map_or(window_end, |(index, _)| index);
        let acceptable = |index: &usize| *index >= half && *index > 0;

        let split = window
            .rfind('\n')
            .filter(acceptable)
            .or_else(|| window.rfind(' ').filter(acceptable))
            .unwrap_or(window_end);

        chunks.push(remaining[..split].to_owned());
        remaining = remaining[split..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}
