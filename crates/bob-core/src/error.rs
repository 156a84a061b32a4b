use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BobError {
    #[error("not a project: no valid package.json at {0}")]
    NotAProject(PathBuf),

    #[error("not a workspace: package.json at {0} does not declare workspaces")]
    NotAWorkspace(PathBuf),

    #[error("failed to load plugin '{name}': {reason}")]
    PluginLoad { name: String, reason: String },

    #[error(
        "command at {path} has an invalid export ({reason}). Define it with define_command \
         or `kind: bob/command`; if you already do, more than one version of bob is installed"
    )]
    InvalidCommandExport { path: PathBuf, reason: String },

    #[error("failed to parse {format} content of {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("command '{0}' is defined more than once")]
    DuplicateCommand(String),

    #[error("invalid command name '{0}': must be lowercase alphanumeric with hyphens or colons")]
    InvalidCommandName(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("command '{0}' was executed before it was bound to a program")]
    CommandNotBound(String),

    #[error("command '{0}' is already bound to another program")]
    CommandAlreadyBound(String),

    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error(transparent)]
    Command(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BobError>;
