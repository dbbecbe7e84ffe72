use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{TimeZone, Utc};

use mini_claw::models::session::SessionFileName;
use mini_claw::persistence::session_store::{format_file_size, format_session_age, SessionStore};

fn write_session(dir: &Path, name: &str, age: Duration) {
    let path = dir.join(name);
    std::fs::write(&path, "{}\n").expect("write session");
    let file = std::fs::File::options()
        .write(true)
        .open(&path)
        .expect("open session");
    file.set_modified(SystemTime::now() - age)
        .expect("set mtime");
}

fn archive_name(chat_id: i64, index: u32) -> String {
    let at = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid time");
    SessionFileName::archived(chat_id, at, index).to_string()
}

#[test]
fn path_for_uses_naming_convention() {
    let store = SessionStore::new("/sessions".into());
    assert_eq!(
        store.path_for(-100_123),
        Path::new("/sessions/telegram--100123.jsonl")
    );
}

#[tokio::test]
async fn missing_root_lists_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().join("absent"));
    assert!(store.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn list_ignores_foreign_entries() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    write_session(dir, "telegram-1.jsonl", Duration::ZERO);
    write_session(dir, &archive_name(1, 0), Duration::from_secs(60));
    std::fs::write(dir.join("notes.txt"), "x").expect("write");
    std::fs::write(dir.join("telegram-x.jsonl"), "x").expect("write");
    std::fs::create_dir(dir.join("telegram-2.jsonl")).expect("mkdir");

    let store = SessionStore::new(dir.to_path_buf());
    let mut files = store.list().await.expect("list");
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.chat_id == 1));
    assert_eq!(files.iter().filter(|f| f.archived).count(), 1);
    assert_eq!(files[0].size_bytes, 3);
}

#[tokio::test]
async fn list_recent_is_newest_first() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    write_session(dir, "telegram-1.jsonl", Duration::from_secs(3_600));
    write_session(dir, "telegram-2.jsonl", Duration::from_secs(10));
    write_session(dir, "telegram-3.jsonl", Duration::from_secs(600));

    let store = SessionStore::new(dir.to_path_buf());
    let order: Vec<i64> = store
        .list_recent()
        .await
        .expect("list")
        .into_iter()
        .map(|f| f.chat_id)
        .collect();

    assert_eq!(order, vec![2, 3, 1]);
}

#[tokio::test]
async fn archive_renames_active_log() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().to_path_buf());
    std::fs::write(store.path_for(7), "{\"type\":\"session\"}\n").expect("write");

    let name = store.archive(7).await.expect("archive").expect("archived name");

    let parsed = SessionFileName::parse(&name).expect("archive name parses");
    assert_eq!(parsed.chat_id, 7);
    assert!(parsed.is_archived());
    assert!(!store.path_for(7).exists());
    assert_eq!(
        std::fs::read_to_string(temp.path().join(&name)).expect("read archive"),
        "{\"type\":\"session\"}\n"
    );
}

#[tokio::test]
async fn archive_without_active_log_is_a_no_op() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().to_path_buf());

    assert_eq!(store.archive(7).await.expect("archive"), None);
    assert!(store.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn repeated_archives_never_collide() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().to_path_buf());

    let mut names = Vec::new();
    for round in 0..3 {
        std::fs::write(store.path_for(7), format!("round {round}")).expect("write");
        names.push(store.archive(7).await.expect("archive").expect("name"));
    }

    names.sort();
    names.dedup();
    assert_eq!(names.len(), 3);
    assert_eq!(store.list().await.expect("list").len(), 3);
}

#[tokio::test]
async fn cleanup_keeps_newest_per_chat() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();

    // Chat 1: active log plus seven archives, each a minute older.
    write_session(dir, "telegram-1.jsonl", Duration::ZERO);
    for i in 1..=7 {
        write_session(dir, &archive_name(1, i), Duration::from_secs(60 * u64::from(i)));
    }
    // Chat 2 stays under the limit.
    write_session(dir, "telegram-2.jsonl", Duration::ZERO);
    write_session(dir, &archive_name(2, 1), Duration::from_secs(60));

    let store = SessionStore::new(dir.to_path_buf());
    let deleted = store.cleanup(5).await.expect("cleanup");
    assert_eq!(deleted, 3);

    let mut remaining: Vec<String> = store
        .list()
        .await
        .expect("list")
        .into_iter()
        .map(|f| f.filename)
        .collect();
    remaining.sort();

    let mut expected = vec!["telegram-1.jsonl".to_owned(), "telegram-2.jsonl".to_owned()];
    expected.extend((1..=4).map(|i| archive_name(1, i)));
    expected.push(archive_name(2, 1));
    expected.sort();
    assert_eq!(remaining, expected);
}

#[tokio::test]
async fn cleanup_on_missing_root_deletes_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().join("absent"));
    assert_eq!(store.cleanup(5).await.expect("cleanup"), 0);
}

#[test]
fn session_age_is_coarse() {
    let now = Utc::now();
    assert_eq!(format_session_age(now, now), "now");
    assert_eq!(format_session_age(now - chrono::Duration::seconds(59), now), "now");
    assert_eq!(format_session_age(now - chrono::Duration::minutes(5), now), "5m");
    assert_eq!(format_session_age(now - chrono::Duration::hours(3), now), "3h");
    assert_eq!(format_session_age(now - chrono::Duration::days(2), now), "2d");
    assert_eq!(format_session_age(now + chrono::Duration::minutes(5), now), "now");
}

#[test]
fn file_size_is_coarse() {
    assert_eq!(format_file_size(0), "0B");
    assert_eq!(format_file_size(1023), "1023B");
    assert_eq!(format_file_size(1024), "1KB");
    assert_eq!(format_file_size(12 * 1024 + 900), "12KB");
    assert_eq!(format_file_size(1_468_006), "1.4MB");
    assert_eq!(format_file_size(2 * 1024 * 1024 * 1024), "2.0GB");
}
