use crate::error::Result;
use crate::paths;
use crate::project::ProjectContext;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigOptions {
    /// Plugin package names, in the order they should be resolved.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Extra directories to search for plugin packages, relative to the config's root.
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// `.bob/config.yaml` of one project or workspace root.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    options: ConfigOptions,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>, options: ConfigOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    /// Load the config at `root`. A missing file is `Ok(None)`.
    pub fn load_at(root: &Path) -> Result<Option<Self>> {
        let path = paths::config_path(root);
        let Some(data) = crate::io::read_if_exists(&path)? else {
            return Ok(None);
        };
        // An empty file deserializes to `null`.
        let options: Option<ConfigOptions> = serde_yaml::from_str(&data)?;
        Ok(Some(Self::new(root, options.unwrap_or_default())))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// `plugin_dirs` resolved against this config's root.
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.options
            .plugin_dirs
            .iter()
            .map(|d| paths::absolutize(&self.root, d))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Resolution across project and workspace
// ---------------------------------------------------------------------------

/// Configs that apply to `context`: the context's own first, then its
/// enclosing workspace's (plain projects only).
pub fn configs_for(context: &ProjectContext) -> Result<Vec<Config>> {
    let mut configs = Vec::new();
    if let Some(own) = Config::load_at(context.root())? {
        configs.push(own);
    }
    if let Some(ws) = context.parent_workspace() {
        if let Some(ws_config) = Config::load_at(ws.root())? {
            configs.push(ws_config);
        }
    }
    Ok(configs)
}

/// Project plugins followed by workspace plugins. Duplicates are kept here;
/// plugin resolution collapses them by name.
pub fn effective_plugin_names(configs: &[Config]) -> Vec<String> {
    configs
        .iter()
        .flat_map(|c| c.options().plugins.iter().cloned())
        .collect()
}

/// Where plugin packages are looked up, in priority order.
pub fn plugin_search_dirs(context: Option<&ProjectContext>, configs: &[Config]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = configs.iter().flat_map(Config::plugin_dirs).collect();

    if let Some(context) = context {
        let mut roots = vec![context.root().to_path_buf()];
        if let Some(ws) = context.parent_workspace() {
            roots.push(ws.root().to_path_buf());
        }
        for root in roots {
            dirs.push(paths::plugins_dir(&root));
            dirs.push(paths::node_modules_dir(&root));
        }
    }
    dirs.extend(paths::global_plugins_dir());
    dirs.dedup();
    dirs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
