//! Command discovery: find command modules on disk, load them, and keep
//! only exports that are real commands.

use crate::command::{Command, COMMAND_API, COMMAND_TAG};
use crate::error::{BobError, Result};
use crate::manifest::CommandManifest;
use crate::paths;
use crate::plugin::Plugins;
use crate::program::ProgramContext;
use crate::project::ProjectContext;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The default export of one command module.
#[derive(Debug, Clone)]
pub enum ModuleExport {
    /// An already-built command.
    Command(Arc<Command>),
    /// Raw data still to be checked and turned into a command.
    Value(serde_yaml::Value),
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<ModuleExport>;
}

/// Loads declarative `command.yaml` modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestModuleLoader;

#[async_trait]
impl ModuleLoader for ManifestModuleLoader {
    async fn load(&self, path: &Path) -> Result<ModuleExport> {
        let data = tokio::fs::read_to_string(path).await?;
        let value = serde_yaml::from_str(&data).map_err(|e| BobError::Parse {
            path: path.to_path_buf(),
            format: "yaml",
            message: e.to_string(),
        })?;
        Ok(ModuleExport::Value(value))
    }
}

// ---------------------------------------------------------------------------
// Locating modules
// ---------------------------------------------------------------------------

/// Glob patterns to scan, in priority order: each plugin's source root,
/// then the project's `.bob`, then the enclosing workspace's `.bob`.
pub fn command_patterns(plugins: &Plugins, context: Option<&ProjectContext>) -> Vec<PathBuf> {
    let mut patterns: Vec<PathBuf> = plugins
        .iter()
        .map(|p| paths::commands_pattern(&p.source_root()))
        .collect();
    if let Some(context) = context {
        patterns.push(paths::commands_pattern(&paths::bob_dir(context.root())));
        if let Some(ws) = context.parent_workspace() {
            patterns.push(paths::commands_pattern(&paths::bob_dir(ws.root())));
        }
    }
    patterns
}

/// Expand patterns into module paths. Pattern order is kept; a path matched
/// by more than one pattern appears once.
pub fn expand_patterns(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for pattern in patterns {
        let text = pattern.to_string_lossy();
        let entries = glob::glob(&text).map_err(|e| BobError::InvalidPattern {
            pattern: text.to_string(),
            message: e.to_string(),
        })?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    if seen.insert(path.clone()) {
                        found.push(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unreadable command path"),
            }
        }
    }
    tracing::debug!(modules = found.len(), "command modules located");
    Ok(found)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(path: &Path, reason: impl Into<String>) -> BobError {
    BobError::InvalidCommandExport {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Check that `export` is a command from this bob version and build it.
///
/// A [`ModuleExport::Command`] can only come from [`define_command`] in this
/// build and is accepted as is; only raw values are checked.
///
/// [`define_command`]: crate::command::define_command
pub fn validate_export(path: &Path, export: ModuleExport) -> Result<Arc<Command>> {
    let value = match export {
        ModuleExport::Command(cmd) => return Ok(cmd),
        ModuleExport::Value(value) => value,
    };

    let kind = value.get("kind").and_then(serde_yaml::Value::as_str);
    if kind != Some(COMMAND_TAG) {
        return Err(invalid(
            path,
            match kind {
                Some(other) => format!("kind is '{other}'"),
                None => "export is not a command".to_string(),
            },
        ));
    }
    if let Some(api) = value.get("api") {
        if api.as_u64() != Some(COMMAND_API) {
            return Err(invalid(
                path,
                format!("written for command api {api:?}, this bob understands {COMMAND_API}"),
            ));
        }
    }

    let manifest: CommandManifest =
        serde_yaml::from_value(value).map_err(|e| invalid(path, e.to_string()))?;
    manifest.into_command(path)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Load every module concurrently, validate the exports, and bind each
/// command to `program`. Any failure aborts discovery, including a command
/// already bound to another program.
pub async fn discover_commands(
    loader: &dyn ModuleLoader,
    modules: &[PathBuf],
    program: &Arc<ProgramContext>,
) -> Result<Vec<Arc<Command>>> {
    let loaded = try_join_all(modules.iter().map(|path| async move {
        let export = loader.load(path).await?;
        validate_export(path, export)
    }))
    .await?;

    let mut commands: Vec<Arc<Command>> = Vec::with_capacity(loaded.len());
    for cmd in loaded {
        if commands.iter().any(|c| Arc::ptr_eq(c, &cmd)) {
            continue;
        }
        cmd.bind(program.clone())?;
        commands.push(cmd);
    }
    tracing::debug!(commands = commands.len(), "commands discovered");
    Ok(commands)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
