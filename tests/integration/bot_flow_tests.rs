//! Command, prompt and button flows through the `Bot` facade.

use std::sync::Arc;

use mini_claw::bot::commands::{Command, HELP_TEXT, SHELL_USAGE};
use mini_claw::bot::{Bot, SESSION_CLEANUP, SESSION_LOAD_PREFIX};
use mini_claw::config::GlobalConfig;
use mini_claw::models::session::SessionFileName;
use mini_claw::orchestrator::shell::ShellRunner;
use mini_claw::AppError;

use super::test_helpers::{test_config, write_fake_agent};

const CHAT: i64 = 42;

struct Fixture {
    _temp: tempfile::TempDir,
    config: GlobalConfig,
    bot: Bot,
}

async fn fixture_with(adjust: impl FnOnce(&mut GlobalConfig)) -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().canonicalize().expect("canonical home");
    let agent = write_fake_agent(&home);
    let mut config = test_config(&home, &agent);
    adjust(&mut config);

    let bot = Bot::new(Arc::new(config.clone())).with_shell(ShellRunner::new("sh"));
    bot.prepare().await.expect("prepare directories");
    Fixture {
        _temp: temp,
        config,
        bot,
    }
}

async fn fixture() -> Fixture {
    fixture_with(|_| {}).await
}

async fn reply_text(fx: &Fixture, command: Command) -> String {
    fx.bot
        .handle_command(CHAT, command)
        .await
        .expect("command replies")
        .text
}

#[tokio::test]
async fn prepare_creates_directories() {
    let fx = fixture().await;
    assert!(fx.config.workspace_root.is_dir());
    assert!(fx.config.session_dir.is_dir());
}

#[tokio::test]
async fn help_and_unknown_commands() {
    let fx = fixture().await;
    assert_eq!(reply_text(&fx, Command::Help).await, HELP_TEXT);
    assert!(fx
        .bot
        .handle_command(CHAT, Command::Unknown("nope".into()))
        .await
        .is_none());
}

#[tokio::test]
async fn navigation_commands_track_the_chat_directory() {
    let fx = fixture().await;
    std::fs::create_dir(fx.config.workspace_root.join("app")).expect("mkdir");

    assert_eq!(reply_text(&fx, Command::Pwd).await, "📁 ~/mini-claw-workspace");
    assert_eq!(
        reply_text(&fx, Command::Cd(Some("app".into()))).await,
        "📁 ~/mini-claw-workspace/app"
    );
    assert_eq!(reply_text(&fx, Command::Pwd).await, "📁 ~/mini-claw-workspace/app");

    let error = reply_text(&fx, Command::Cd(Some("missing".into()))).await;
    assert!(error.starts_with("Error: Directory not found:"), "{error}");
    assert_eq!(reply_text(&fx, Command::Pwd).await, "📁 ~/mini-claw-workspace/app");

    assert_eq!(reply_text(&fx, Command::Home).await, "📁 ~");
    assert_eq!(reply_text(&fx, Command::Cd(None)).await, "📁 ~");
}

#[tokio::test]
async fn shell_runs_in_chat_directory() {
    let fx = fixture().await;
    std::fs::write(fx.config.workspace_root.join("marker.txt"), "").expect("write");

    assert_eq!(reply_text(&fx, Command::Shell(String::new())).await, SHELL_USAGE);
    assert_eq!(reply_text(&fx, Command::Shell("ls".into())).await, "marker.txt");
    assert_eq!(
        reply_text(&fx, Command::Shell("exit 3".into())).await,
        "(no output)\n\n[exit code: 3]"
    );
}

#[tokio::test]
async fn prompt_runs_agent_and_new_archives_its_session() {
    let fx = fixture().await;
    assert_eq!(
        reply_text(&fx, Command::New).await,
        "Starting fresh conversation."
    );

    let result = fx.bot.handle_prompt(CHAT, "add tests").await;
    assert!(result.is_success());
    let active = fx.bot.sessions().path_for(CHAT);
    assert!(active.is_file());

    let reply = reply_text(&fx, Command::New).await;
    let name = reply
        .strip_prefix("Session archived as ")
        .and_then(|rest| rest.strip_suffix("\nStarting fresh conversation."))
        .expect("archive reply");
    let parsed = SessionFileName::parse(name).expect("archive name parses");
    assert_eq!(parsed.chat_id, CHAT);
    assert!(!active.exists());
}

#[tokio::test]
async fn session_menu_lists_sessions_with_cleanup_button() {
    let fx = fixture().await;
    assert_eq!(reply_text(&fx, Command::Session).await, "No sessions found.");

    fx.bot.handle_prompt(CHAT, "first task").await;
    fx.bot.handle_command(CHAT, Command::New).await;
    fx.bot.handle_prompt(CHAT, "second task").await;

    let reply = fx
        .bot
        .handle_command(CHAT, Command::Session)
        .await
        .expect("reply");
    assert!(reply.text.starts_with("📚 Sessions (2 total)"));
    assert_eq!(reply.keyboard.len(), 3);

    let (sessions, cleanup) = reply.keyboard.split_at(2);
    assert!(sessions
        .iter()
        .all(|b| b.data.starts_with(SESSION_LOAD_PREFIX)));
    assert!(sessions.iter().any(|b| b.label.starts_with("second task (")));
    assert!(sessions.iter().any(|b| b.label.starts_with("first task (")));
    assert_eq!(cleanup[0].data, SESSION_CLEANUP);
}

#[tokio::test]
async fn session_menu_respects_listing_limit() {
    let fx = fixture_with(|config| config.sessions.listing_limit = 1).await;
    fx.bot.handle_prompt(1, "a").await;
    fx.bot.handle_prompt(2, "b").await;

    let reply = fx
        .bot
        .handle_command(CHAT, Command::Session)
        .await
        .expect("reply");
    assert!(reply.text.starts_with("📚 Sessions (2 total)"));
    assert_eq!(reply.keyboard.len(), 2);
}

#[tokio::test]
async fn callbacks_select_and_clean_up() {
    let fx = fixture().await;

    let selected = fx
        .bot
        .handle_callback("session:load:telegram-42.jsonl")
        .await
        .expect("load callback");
    assert_eq!(selected.notice, "Selected: telegram-42.jsonl");
    assert!(selected
        .edit
        .expect("edit")
        .contains("Session switching is not supported yet"));

    let cleaned = fx
        .bot
        .handle_callback(SESSION_CLEANUP)
        .await
        .expect("cleanup callback");
    assert_eq!(cleaned.notice, "Cleaning up...");
    assert!(cleaned.edit.expect("edit").contains("Deleted 0 old session(s)."));

    assert!(fx.bot.handle_callback("something:else").await.is_none());
}

#[tokio::test]
async fn status_reports_chat_and_agent() {
    let fx = fixture().await;
    let status = reply_text(&fx, Command::Status).await;

    assert!(status.contains("Agent: OK"), "{status}");
    assert!(status.contains("Chat ID: 42"));
    assert!(status.contains("Workspace: ~/mini-claw-workspace"));
    assert!(status.contains("Thinking: low"));
    assert!(status.contains("Agent run in progress: no"));
}

#[tokio::test]
async fn start_warns_when_agent_is_missing() {
    let fx = fixture_with(|config| config.agent.program = "/nonexistent/agent".into()).await;
    let welcome = reply_text(&fx, Command::Start).await;

    assert!(welcome.contains("Welcome to Mini-Claw!"));
    assert!(welcome.contains("Not installed or not authenticated"));
}

#[tokio::test]
async fn allow_list_is_enforced() {
    let fx = fixture_with(|config| config.allowed_users = vec![1]).await;

    assert!(fx.bot.ensure_authorized(Some(1)).is_ok());
    assert!(matches!(
        fx.bot.ensure_authorized(Some(2)),
        Err(AppError::Unauthorized(_))
    ));
    assert!(fx.bot.ensure_authorized(None).is_err());

    let open = fixture().await;
    assert!(open.bot.ensure_authorized(None).is_ok());
}
