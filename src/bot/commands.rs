//! Chat command parsing and static texts.

/// Commands shown in the client's command menu, in display order.
pub const MENU: &[(&str, &str)] = &[
    ("start", "Welcome & quick start"),
    ("help", "Show all commands"),
    ("pwd", "Show current directory"),
    ("cd", "Change directory"),
    ("home", "Go to home directory"),
    ("shell", "Run shell command"),
    ("session", "Manage sessions"),
    ("new", "Start fresh conversation"),
    ("status", "Show bot status"),
];

/// Reply to `/help`.
pub const HELP_TEXT: &str = "\u{1f4d6} Mini-Claw Commands

\u{1f4c1} Navigation:
/pwd - Show current directory
/cd <path> - Change directory
/home - Go to home directory

\u{1f527} Execution:
/shell <cmd> - Run shell command directly

\u{1f4ac} Sessions:
/session - List & manage sessions
/new - Archive current & start fresh

\u{1f4ca} Info:
/status - Show bot status
/help - Show this message

\u{1f4a1} Tips:
\u{2022} Any text \u{2192} AI conversation
\u{2022} /shell runs instantly, no AI
\u{2022} /cd supports ~, .., relative paths";

/// Reply to `/shell` without a command.
pub const SHELL_USAGE: &str = "Usage: /shell <command>\nExample: /shell ls -la";

/// A recognised chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/pwd`
    Pwd,
    /// `/cd [path]`; no path means home.
    Cd(Option<String>),
    /// `/home`
    Home,
    /// `/shell <cmd>`; the command may be empty.
    Shell(String),
    /// `/session`
    Session,
    /// `/new`
    New,
    /// `/status`
    Status,
    /// Any other slash command.
    Unknown(String),
}

/// Classified incoming text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A slash command.
    Command(Command),
    /// Free text for the agent.
    Prompt(String),
}

impl Command {
    /// Parse `/name[@bot] [argument]`; `None` if `text` is not a command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim_start().strip_prefix('/')?;
        let (head, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        let name = head.split_once('@').map_or(head, |(name, _bot)| name);
        let argument = rest.trim();

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "pwd" => Self::Pwd,
            "cd" => Self::Cd((!argument.is_empty()).then(|| argument.to_owned())),
            "home" => Self::Home,
            "shell" => Self::Shell(argument.to_owned()),
            "session" | "sessions" => Self::Session,
            "new" => Self::New,
            "status" => Self::Status,
            _ => Self::Unknown(name.to_owned()),
        };
        Some(command)
    }
}

/// Classify a text message as a command or an agent prompt.
#[must_use]
pub fn parse_input(text: &str) -> Input {
    Command::parse(text).map_or_else(|| Input::Prompt(text.to_owned()), Input::Command)
}
