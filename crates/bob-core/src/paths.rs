use crate::error::{BobError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const BOB_DIR: &str = ".bob";
pub const CONFIG_FILE: &str = ".bob/config.yaml";
pub const PLUGINS_DIR: &str = ".bob/plugins";
pub const NODE_MODULES_DIR: &str = "node_modules";

pub const PACKAGE_FILE: &str = "package.json";
pub const PLUGIN_MANIFEST: &str = "plugin.yaml";

/// Relative glob that matches command modules under a commands root.
pub const COMMANDS_FILE_MATCH: &str = "commands/*/command.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn bob_dir(root: &Path) -> PathBuf {
    root.join(BOB_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn package_path(root: &Path) -> PathBuf {
    root.join(PACKAGE_FILE)
}

pub fn plugins_dir(root: &Path) -> PathBuf {
    root.join(PLUGINS_DIR)
}

pub fn node_modules_dir(root: &Path) -> PathBuf {
    root.join(NODE_MODULES_DIR)
}

/// `$HOME/.bob/plugins`, when a home directory is known.
pub fn global_plugins_dir() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(PLUGINS_DIR))
}

/// `base` with glob metacharacters escaped, ready to prefix a relative glob.
pub fn glob_root(base: &Path) -> PathBuf {
    PathBuf::from(glob::Pattern::escape(&base.to_string_lossy()))
}

/// Glob pattern for command modules living under `base`.
pub fn commands_pattern(base: &Path) -> PathBuf {
    glob_root(base).join(COMMANDS_FILE_MATCH)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Command name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-:]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

pub fn validate_command_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(BobError::InvalidCommandName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
