use std::path::Path;

use mini_claw::persistence::title::{extract_title, fallback_title, session_title, TITLE_MAX_CHARS};

#[test]
fn explicit_session_name_wins() {
    let transcript = concat!(
        r#"{"type":"session","id":"abc"}"#,
        "\n",
        r#"{"type":"message","message":{"role":"user","content":"fix the build"}}"#,
        "\n",
        r#"{"type":"session_info","name":"Release prep"}"#,
        "\n",
    );
    assert_eq!(extract_title(transcript).as_deref(), Some("Release prep"));
}

#[test]
fn first_user_message_is_used() {
    let transcript = concat!(
        r#"{"type":"session"}"#,
        "\n",
        "not json at all\n",
        r#"{"type":"message","message":{"role":"assistant","content":"hello"}}"#,
        "\n",
        r#"{"type":"message","message":{"role":"user","content":[{"type":"image"},{"type":"text","text":"  refactor   the\nparser "}]}}"#,
        "\n",
        r#"{"type":"message","message":{"role":"user","content":"second"}}"#,
        "\n",
    );
    assert_eq!(extract_title(transcript).as_deref(), Some("refactor the"));
}

#[test]
fn long_titles_are_truncated() {
    let long = "word ".repeat(30);
    let transcript = format!(
        r#"{{"type":"message","message":{{"role":"user","content":"{long}"}}}}"#
    );
    let title = extract_title(&transcript).expect("title");

    assert!(title.ends_with('…'));
    assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
}

#[test]
fn transcript_without_user_text_has_no_title() {
    assert_eq!(extract_title(r#"{"type":"session"}"#), None);
    assert_eq!(extract_title(""), None);
}

#[test]
fn fallback_describes_file_name() {
    assert_eq!(fallback_title(Path::new("/s/telegram-42.jsonl")), "Chat 42");
    assert_eq!(
        fallback_title(Path::new("/s/telegram-42-20260102T030405000Z.jsonl")),
        "Chat 42 (archived)"
    );
    assert_eq!(fallback_title(Path::new("/s/other.jsonl")), "other");
}

#[tokio::test]
async fn unreadable_file_falls_back() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("telegram-3.jsonl");
    assert_eq!(session_title(&path).await, "Chat 3");

    std::fs::write(&path, r#"{"type":"message","message":{"role":"user","content":"hi there"}}"#)
        .expect("write");
    assert_eq!(session_title(&path).await, "hi there");
}
