#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Upload,
    Style,
    Prompt,
    Backdrop,
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
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "upload",
    kind: CommandKind::Upload,
}];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        kind: CommandKind::Style,
    },
    CommandSpec {
        command: "prompt",
        kind: CommandKind::Prompt,
    },
    CommandSpec {
        command: "backdrop",
        kind: CommandKind::Backdrop,
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        kind: CommandKind::Generate,
    },
    CommandSpec {
        command: "retry",
        kind: CommandKind::Retry,
    },
    CommandSpec {
        command: "reset",
        kind: CommandKind::Reset,
    },
    CommandSpec {
        command: "download",
        kind: CommandKind::Download,
    },
    CommandSpec {
        command: "edit_bg",
        kind: CommandKind::EditBackground,
    },
    CommandSpec {
        command: "remove_bg",
        kind: CommandKind::RemoveBackground,
    },
    CommandSpec {
        command: "save_bg",
        kind: CommandKind::SaveBackground,
    },
    CommandSpec {
        command: "cancel_bg",
        kind: CommandKind::CancelBackground,
    },
    CommandSpec {
        command: "close_bg",
        kind: CommandKind::CloseBackground,
    },
    CommandSpec {
        command: "styles",
        kind: CommandKind::Styles,
    },
    CommandSpec {
        command: "status",
        kind: CommandKind::Status,
    },
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/styles",
    "/style <id>",
    "/prompt <text>",
    "/generate",
    "/retry",
    "/reset",
    "/download",
    "/edit_bg",
    "/remove_bg",
    "/backdrop <transparent|white|grey|dark|blue|green>",
    "/save_bg",
    "/cancel_bg",
    "/close_bg",
    "/status",
    "/help",
    "/quit",
];
