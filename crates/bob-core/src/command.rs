//! Commands: named, CLI-invokable units of work.
//!
//! Every command is created through [`define_command`], which stamps it with
//! [`COMMAND_TAG`]. Declarative command modules carry the same tag in their
//! `kind` field; discovery checks it, along with `api`, so modules written
//! against another bob version fail with a clear message.

use crate::error::{BobError, Result};
use crate::paths;
use crate::program::ProgramContext;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};

/// Discriminant every command value carries.
pub const COMMAND_TAG: &str = "bob/command";

/// Version of the command module format this build understands.
pub const COMMAND_API: u64 = 1;

#[async_trait]
pub trait CommandAction: Send + Sync {
    async fn execute(&self, program: &ProgramContext) -> anyhow::Result<()>;
}

pub struct Command {
    tag: &'static str,
    name: String,
    description: String,
    action: Box<dyn CommandAction>,
    program: OnceLock<Arc<ProgramContext>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("bound", &self.program.get().is_some())
            .finish()
    }
}

/// Build a command. `name` must be a valid CLI subcommand name.
pub fn define_command(
    name: impl Into<String>,
    description: impl Into<String>,
    action: impl CommandAction + 'static,
) -> Result<Arc<Command>> {
    let name = name.into();
    paths::validate_command_name(&name)?;
    Ok(Arc::new(Command {
        tag: COMMAND_TAG,
        name,
        description: description.into(),
        action: Box::new(action),
        program: OnceLock::new(),
    }))
}

impl Command {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Attach the program this command runs in. A command belongs to one
    /// program; binding it again to the same program is a no-op, binding it
    /// to another one fails.
    pub fn bind(&self, program: Arc<ProgramContext>) -> Result<()> {
        let bound = self.program.get_or_init(|| program.clone());
        if Arc::ptr_eq(bound, &program) {
            Ok(())
        } else {
            Err(BobError::CommandAlreadyBound(self.name.clone()))
        }
    }

    pub fn program(&self) -> Option<&Arc<ProgramContext>> {
        self.program.get()
    }

    pub async fn execute(&self) -> Result<()> {
        let program = self
            .program()
            .ok_or_else(|| BobError::CommandNotBound(self.name.clone()))?;
        tracing::debug!(command = %self.name, "executing command");
        self.action.execute(program).await.map_err(BobError::Command)
    }
}
