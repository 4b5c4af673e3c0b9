use super::registry::{
    CommandKind, CommandSpec, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

/// One line of terminal input, resolved to the workflow operation it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Upload { path: String },
    Style { id: String },
    /// Plain text or `/prompt <text>`: sets the custom prompt.
    Prompt { text: String },
    Backdrop { name: String },
    Generate,
    Retry,
    Reset,
    Download,
    EditBackground,
    RemoveBackground,
    SaveBackground,
    CancelBackground,
    CloseBackground,
    Styles,
    Status,
    Help,
    Quit,
    Unknown { command: String, arg: String },
}

fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}

fn parse_single_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts: Vec<String> = match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts.join(" ")
}

fn command_from_kind(kind: CommandKind, arg: &str) -> SessionCommand {
    match kind {
        CommandKind::Upload => SessionCommand::Upload {
            path: parse_single_path_arg(arg),
        },
        CommandKind::Style => SessionCommand::Style {
            id: arg.to_string(),
        },
        CommandKind::Prompt => SessionCommand::Prompt {
            text: arg.to_string(),
        },
        CommandKind::Backdrop => SessionCommand::Backdrop {
            name: arg.to_string(),
        },
        CommandKind::Generate => SessionCommand::Generate,
        CommandKind::Retry => SessionCommand::Retry,
        CommandKind::Reset => SessionCommand::Reset,
        CommandKind::Download => SessionCommand::Download,
        CommandKind::EditBackground => SessionCommand::EditBackground,
        CommandKind::RemoveBackground => SessionCommand::RemoveBackground,
        CommandKind::SaveBackground => SessionCommand::SaveBackground,
        CommandKind::CancelBackground => SessionCommand::CancelBackground,
        CommandKind::CloseBackground => SessionCommand::CloseBackground,
        CommandKind::Styles => SessionCommand::Styles,
        CommandKind::Status => SessionCommand::Status,
        CommandKind::Help => SessionCommand::Help,
        CommandKind::Quit => SessionCommand::Quit,
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::Prompt {
            text: raw_trimmed.to_string(),
        };
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::Prompt {
            text: raw_trimmed.to_string(),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    let kind = find_kind(&command, SINGLE_PATH_COMMANDS)
        .or_else(|| find_kind(&command, RAW_ARG_COMMANDS))
        .or_else(|| find_kind(&command, NO_ARG_COMMANDS));
    match kind {
        Some(kind) => command_from_kind(kind, arg),
        None => SessionCommand::Unknown {
            command,
            arg: arg.to_string(),
        },
    }
}
