//! Unit tests for `AppError` display and user-facing messages.

use mini_claw::AppError;

#[test]
fn display_carries_category_prefix() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(
        AppError::Unauthorized("nope".into()).to_string(),
        "unauthorized: nope"
    );
    assert_eq!(
        AppError::Workspace("Directory not found: /x".into()).to_string(),
        "workspace: Directory not found: /x"
    );
    assert_eq!(AppError::Io("disk full".into()).to_string(), "io: disk full");
    assert_eq!(
        AppError::Telegram("getUpdates failed".into()).to_string(),
        "telegram: getUpdates failed"
    );
}

#[test]
fn user_message_drops_the_prefix() {
    let err = AppError::Workspace("Not a directory: /etc/hosts".into());
    assert_eq!(err.user_message(), "Not a directory: /etc/hosts");
}

#[test]
fn toml_errors_become_config_errors() {
    let err: AppError = toml::from_str::<toml::Value>("= nope")
        .expect_err("invalid toml")
        .into();
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn error_messages_have_no_trailing_period() {
    let err = AppError::Io("write failed".into());
    let s = err.to_string();
    assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
}
