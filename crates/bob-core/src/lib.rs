pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod format;
pub mod fs;
pub mod io;
pub mod manifest;
pub mod paths;
pub mod plugin;
pub mod program;
pub mod project;
pub mod source;
pub mod template;

pub use command::{define_command, Command, CommandAction};
pub use error::{BobError, Result};
pub use fs::FileCommitBuffer;
pub use program::{Program, ProgramContext, ProgramOptions};
pub use project::ProjectContext;
pub use template::{define_sync, TemplateFile};
