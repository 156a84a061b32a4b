//! Plugin packages and their resolution.
//!
//! A plugin is a directory named after its package (`<search dir>/<name>`,
//! scoped names like `@acme/tools` included) that may carry a `plugin.yaml`
//! manifest. Its command modules live under
//! `<source root>/commands/<command>/command.yaml`.

use crate::error::{BobError, Result};
use crate::paths;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Directory holding `commands/`, relative to the package root.
    #[serde(default = "default_src")]
    pub src: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            name: None,
            version: None,
            description: None,
            src: default_src(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plugin {
    package_name: String,
    root: PathBuf,
    manifest: PluginManifest,
}

impl Plugin {
    pub fn new(package_name: impl Into<String>, root: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        Self {
            package_name: package_name.into(),
            root: root.into(),
            manifest,
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Directory the plugin's `commands/` folder lives in.
    pub fn source_root(&self) -> PathBuf {
        paths::absolutize(&self.root, &self.manifest.src)
    }
}

/// Resolved plugins keyed by package name, in first-requested order.
#[derive(Debug, Clone, Default)]
pub struct Plugins {
    entries: Vec<Plugin>,
}

impl Plugins {
    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|p| p.package_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Plugin> for Plugins {
    fn from_iter<I: IntoIterator<Item = Plugin>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PluginLoader: Send + Sync {
    async fn load(&self, package_name: &str) -> Result<Plugin>;
}

/// Finds plugin packages in an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPluginLoader {
    search_dirs: Vec<PathBuf>,
}

impl DirectoryPluginLoader {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }
}

fn load_error(name: &str, reason: impl Into<String>) -> BobError {
    BobError::PluginLoad {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Package names map onto relative paths; anything that could escape the
/// search directory is rejected.
fn package_rel_path(name: &str) -> Option<PathBuf> {
    let rel = PathBuf::from(name);
    let ok = !name.is_empty()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    ok.then_some(rel)
}

#[async_trait]
impl PluginLoader for DirectoryPluginLoader {
    async fn load(&self, package_name: &str) -> Result<Plugin> {
        let rel = package_rel_path(package_name)
            .ok_or_else(|| load_error(package_name, "invalid package name"))?;

        for dir in &self.search_dirs {
            let root = dir.join(&rel);
            let is_dir = tokio::fs::metadata(&root)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let manifest_path = root.join(paths::PLUGIN_MANIFEST);
            let manifest = match tokio::fs::read_to_string(&manifest_path).await {
                Ok(data) => serde_yaml::from_str::<Option<PluginManifest>>(&data)
                    .map_err(|e| load_error(package_name, format!("invalid {}: {e}", paths::PLUGIN_MANIFEST)))?
                    .unwrap_or_default(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => PluginManifest::default(),
                Err(e) => return Err(load_error(package_name, e.to_string())),
            };

            if let Some(declared) = manifest.name.as_deref() {
                if declared != package_name {
                    tracing::warn!(
                        plugin = package_name,
                        declared,
                        "plugin manifest name differs from package name"
                    );
                }
            }
            tracing::debug!(plugin = package_name, root = %root.display(), "plugin located");
            return Ok(Plugin::new(package_name, root, manifest));
        }

        Err(load_error(
            package_name,
            format!("not found in any of {} plugin directories", self.search_dirs.len()),
        ))
    }
}

/// Resolve every name concurrently. The first failure aborts the whole
/// resolution; repeated names resolve once.
pub async fn resolve_all(loader: &dyn PluginLoader, names: &[String]) -> Result<Plugins> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| seen.insert(*n))
        .collect();

    let entries = try_join_all(unique.into_iter().map(|name| async move {
        loader.load(name).await.map_err(|e| match e {
            e @ BobError::PluginLoad { .. } => e,
            other => load_error(name, other.to_string()),
        })
    }))
    .await?;

    tracing::debug!(plugins = entries.len(), "plugins resolved");
    Ok(Plugins { entries })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Loader that resolves any name except those listed in `missing`.
    #[derive(Default)]
    pub(crate) struct FakePluginLoader {
        pub missing: Vec<String>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl PluginLoader for FakePluginLoader {
        async fn load(&self, package_name: &str) -> Result<Plugin> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.missing.iter().any(|m| m == package_name) {
                return Err(load_error(package_name, "missing"));
            }
            Ok(Plugin::new(
                package_name,
                format!("/plugins/{package_name}"),
                PluginManifest::default(),
            ))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn duplicate_names_resolve_once() {
        let loader = FakePluginLoader::default();
        let plugins = resolve_all(&loader, &names(&["p1", "p2", "p1"])).await.unwrap();
        assert_eq!(plugins.names(), ["p1", "p2"]);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_failure_aborts() {
        let loader = FakePluginLoader {
            missing: vec!["broken".into()],
            ..Default::default()
        };
        let err = resolve_all(&loader, &names(&["ok", "broken"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BobError::PluginLoad { ref name, .. } if name == "broken"));
    }

    #[tokio::test]
    async fn empty_names_is_empty_map() {
        let loader = FakePluginLoader::default();
        assert!(resolve_all(&loader, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_loader_finds_first_match_with_manifest() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let pkg = second.path().join("@acme/react");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("plugin.yaml"),
            "name: \"@acme/react\"\nversion: 2.0.0\nsrc: dist\n",
        )
        .unwrap();

        let loader =
            DirectoryPluginLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let plugin = loader.load("@acme/react").await.unwrap();
        assert_eq!(plugin.root(), pkg);
        assert_eq!(plugin.source_root(), pkg.join("dist"));
        assert_eq!(plugin.manifest().version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn directory_loader_without_manifest_uses_package_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("plain")).unwrap();
        let loader = DirectoryPluginLoader::new(vec![dir.path().to_path_buf()]);
        let plugin = loader.load("plain").await.unwrap();
        assert_eq!(plugin.source_root(), dir.path().join("plain").join("."));
    }

    #[tokio::test]
    async fn directory_loader_rejects_missing_and_traversal() {
        let dir = TempDir::new().unwrap();
        let loader = DirectoryPluginLoader::new(vec![dir.path().to_path_buf()]);
        for name in ["nope", "../escape", "/abs", ""] {
            let err = loader.load(name).await.unwrap_err();
            assert!(matches!(err, BobError::PluginLoad { .. }), "{name}");
        }
    }
}
