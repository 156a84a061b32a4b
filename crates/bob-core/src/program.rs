//! The assembled program: context, plugins and commands for one run.
//!
//! Building happens in fixed steps, each run once: discover the project
//! context, load configs, resolve plugins, then discover commands. The
//! resulting [`ProgramContext`] is shared with every command through
//! [`Command::bind`](crate::command::Command::bind).

use crate::command::Command;
use crate::config::{self, Config};
use crate::discovery::{self, ManifestModuleLoader, ModuleLoader};
use crate::error::{BobError, Result};
use crate::fs::FileCommitBuffer;
use crate::paths;
use crate::plugin::{self, DirectoryPluginLoader, PluginLoader, Plugins};
use crate::project::ProjectContext;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOptions {
    pub cwd: PathBuf,
    pub debug: bool,
}

impl ProgramOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            debug: false,
        }
    }

    /// Options from the command line. A relative `cwd` is taken relative to
    /// the process working directory; none means the process working directory.
    pub fn resolve(cwd: Option<PathBuf>, debug: bool) -> Result<Self> {
        let current = std::env::current_dir()?;
        let cwd = match cwd {
            Some(path) => paths::absolutize(&current, &path),
            None => current,
        };
        Ok(Self { cwd, debug })
    }
}

// ---------------------------------------------------------------------------
// ProgramContext
// ---------------------------------------------------------------------------

/// Everything a command can see while it runs.
#[derive(Debug)]
pub struct ProgramContext {
    options: ProgramOptions,
    project: Option<ProjectContext>,
    configs: Vec<Config>,
    plugins: Plugins,
    buffer: Arc<FileCommitBuffer>,
}

impl ProgramContext {
    /// A context with no project, no plugins and a disk-backed buffer.
    pub fn bare(options: ProgramOptions) -> Self {
        Self {
            options,
            project: None,
            configs: Vec::new(),
            plugins: Plugins::default(),
            buffer: Arc::new(FileCommitBuffer::default()),
        }
    }

    pub fn options(&self) -> &ProgramOptions {
        &self.options
    }

    pub fn cwd(&self) -> &Path {
        &self.options.cwd
    }

    pub fn debug(&self) -> bool {
        self.options.debug
    }

    pub fn project(&self) -> Option<&ProjectContext> {
        self.project.as_ref()
    }

    pub fn configs(&self) -> &[Config] {
        &self.configs
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    pub fn buffer(&self) -> &FileCommitBuffer {
        &self.buffer
    }

    /// Project root, or the cwd when no project was found.
    pub fn root(&self) -> &Path {
        self.project
            .as_ref()
            .map(ProjectContext::root)
            .unwrap_or(self.options.cwd.as_path())
    }

    /// Resolve a template path against [`root`](Self::root).
    pub fn resolve(&self, path: &Path) -> PathBuf {
        paths::absolutize(self.root(), path)
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ProgramBuilder {
    options: ProgramOptions,
    plugin_loader: Option<Box<dyn PluginLoader>>,
    module_loader: Option<Box<dyn ModuleLoader>>,
    buffer: Option<Arc<FileCommitBuffer>>,
    commands: Vec<Arc<Command>>,
}

impl ProgramBuilder {
    /// Replace the default loader that searches plugin directories.
    pub fn plugin_loader(mut self, loader: impl PluginLoader + 'static) -> Self {
        self.plugin_loader = Some(Box::new(loader));
        self
    }

    /// Replace the default `command.yaml` loader.
    pub fn module_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.module_loader = Some(Box::new(loader));
        self
    }

    pub fn buffer(mut self, buffer: Arc<FileCommitBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Register a command in addition to the discovered ones.
    pub fn command(mut self, command: Arc<Command>) -> Self {
        self.commands.push(command);
        self
    }

    pub async fn build(self) -> Result<Program> {
        let options = self.options;
        tracing::debug!(cwd = %options.cwd.display(), "building program");

        let project = ProjectContext::discover(&options.cwd);
        match &project {
            Some(ctx) => tracing::debug!(
                root = %ctx.root().display(),
                workspace = ctx.is_workspace(),
                "project context found"
            ),
            None => tracing::debug!("no project context, running bare"),
        }

        let configs = match &project {
            Some(ctx) => config::configs_for(ctx)?,
            None => Vec::new(),
        };
        let names = config::effective_plugin_names(&configs);

        let plugins = match &self.plugin_loader {
            Some(loader) => plugin::resolve_all(loader.as_ref(), &names).await?,
            None => {
                let loader =
                    DirectoryPluginLoader::new(config::plugin_search_dirs(project.as_ref(), &configs));
                plugin::resolve_all(&loader, &names).await?
            }
        };

        let context = Arc::new(ProgramContext {
            options,
            project,
            configs,
            plugins,
            buffer: self.buffer.unwrap_or_default(),
        });

        let patterns = discovery::command_patterns(context.plugins(), context.project());
        let modules = discovery::expand_patterns(&patterns)?;
        let loader: Box<dyn ModuleLoader> = self
            .module_loader
            .unwrap_or_else(|| Box::new(ManifestModuleLoader));
        let mut commands = discovery::discover_commands(loader.as_ref(), &modules, &context).await?;

        for extra in self.commands {
            if commands.iter().any(|c| Arc::ptr_eq(c, &extra)) {
                continue;
            }
            extra.bind(context.clone())?;
            commands.push(extra);
        }

        let mut names = HashSet::new();
        for cmd in &commands {
            if !names.insert(cmd.name()) {
                return Err(BobError::DuplicateCommand(cmd.name().to_string()));
            }
        }

        Ok(Program { context, commands })
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Program {
    context: Arc<ProgramContext>,
    commands: Vec<Arc<Command>>,
}

impl Program {
    pub fn builder(options: ProgramOptions) -> ProgramBuilder {
        ProgramBuilder {
            options,
            plugin_loader: None,
            module_loader: None,
            buffer: None,
            commands: Vec::new(),
        }
    }

    pub fn context(&self) -> &Arc<ProgramContext> {
        &self.context
    }

    pub fn options(&self) -> &ProgramOptions {
        self.context.options()
    }

    pub fn project(&self) -> Option<&ProjectContext> {
        self.context.project()
    }

    pub fn plugins(&self) -> &Plugins {
        self.context.plugins()
    }

    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn buffer(&self) -> &FileCommitBuffer {
        self.context.buffer()
    }

    pub fn version(&self) -> &'static str {
        self.context.version()
    }

    pub fn find_command(&self, name: &str) -> Option<&Arc<Command>> {
        self.commands.iter().find(|c| c.name() == name)
    }

    /// Run one command, then flush its staged writes. A failing command
    /// leaves everything staged and unwritten.
    pub async fn run_command(&self, name: &str) -> Result<usize> {
        let cmd = self
            .find_command(name)
            .ok_or_else(|| BobError::UnknownCommand(name.to_string()))?;
        cmd.execute().await?;
        self.commit()
    }

    pub fn commit(&self) -> Result<usize> {
        self.buffer().commit()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
