//! Projects and workspaces discovered from `package.json` metadata.
//!
//! A [`Workspace`] owns its member [`Project`]s; each member keeps a weak
//! link back to the workspace. A project loaded on its own holds its
//! enclosing workspace strongly, so `workspace()` works the same either way.

use crate::error::{BobError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

// ---------------------------------------------------------------------------
// PackageInfo
// ---------------------------------------------------------------------------

/// The `workspaces` field: either a glob list or the `{ "packages": [...] }` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkspacesField {
    Globs(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl WorkspacesField {
    pub fn globs(&self) -> &[String] {
        match self {
            WorkspacesField::Globs(globs) => globs,
            WorkspacesField::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<WorkspacesField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageInfo {
    /// Read `<root>/package.json`. Missing or malformed metadata is `NotAProject`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::package_path(root);
        let Some(data) = crate::io::read_if_exists(&path)? else {
            return Err(BobError::NotAProject(root.to_path_buf()));
        };
        serde_json::from_str(&data).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed package.json");
            BobError::NotAProject(root.to_path_buf())
        })
    }

    pub fn workspace_globs(&self) -> Option<&[String]> {
        self.workspaces.as_ref().map(WorkspacesField::globs)
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WorkspaceLink {
    /// Back-reference from a member owned by the workspace.
    Member(Weak<Workspace>),
    /// A standalone project that found its enclosing workspace.
    Enclosing(Arc<Workspace>),
}

#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    package: PackageInfo,
    workspace: Option<WorkspaceLink>,
}

impl Project {
    /// Load the project rooted at `path`, linking it to the nearest enclosing
    /// workspace that lists it as a member.
    pub fn load_at(path: &Path) -> Result<Self> {
        let root = canonical_root(path).ok_or_else(|| BobError::NotAProject(path.to_path_buf()))?;
        let package = PackageInfo::load(&root)?;
        let workspace = find_enclosing_workspace(&root).map(WorkspaceLink::Enclosing);
        Ok(Self {
            root,
            package,
            workspace,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_info(&self) -> &PackageInfo {
        &self.package
    }

    /// The workspace this project belongs to, if any.
    pub fn workspace(&self) -> Option<Arc<Workspace>> {
        match self.workspace.as_ref()? {
            WorkspaceLink::Member(weak) => weak.upgrade(),
            WorkspaceLink::Enclosing(ws) => Some(ws.clone()),
        }
    }
}

fn canonical_root(path: &Path) -> Option<PathBuf> {
    let root = path.canonicalize().ok()?;
    root.is_dir().then_some(root)
}

fn find_enclosing_workspace(root: &Path) -> Option<Arc<Workspace>> {
    for ancestor in root.ancestors().skip(1) {
        let Ok(package) = PackageInfo::load(ancestor) else {
            continue;
        };
        if package.workspaces.is_none() {
            continue;
        }
        match Workspace::load_at(ancestor) {
            Ok(ws) if ws.member(root).is_some() => return Some(ws),
            Ok(_) => {
                tracing::debug!(
                    workspace = %ancestor.display(),
                    project = %root.display(),
                    "project is not a member of enclosing workspace"
                );
            }
            Err(e) => {
                tracing::debug!(workspace = %ancestor.display(), error = %e, "skipping workspace");
            }
        }
        return None;
    }
    None
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Workspace {
    project: Project,
    members: Vec<Arc<Project>>,
}

impl Workspace {
    /// Load the workspace rooted at `path` and every member its globs match.
    pub fn load_at(path: &Path) -> Result<Arc<Self>> {
        let not_a_workspace = || BobError::NotAWorkspace(path.to_path_buf());
        let root = canonical_root(path).ok_or_else(not_a_workspace)?;
        let package = PackageInfo::load(&root).map_err(|_| not_a_workspace())?;
        let globs = package.workspace_globs().ok_or_else(not_a_workspace)?.to_vec();

        let members = expand_members(&root, &globs)?
            .into_iter()
            .map(|member_root| PackageInfo::load(&member_root).map(|pkg| (member_root, pkg)))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(root = %root.display(), members = members.len(), "loaded workspace");

        Ok(Arc::new_cyclic(|weak| Self {
            project: Project {
                root,
                package,
                workspace: None,
            },
            members: members
                .into_iter()
                .map(|(root, package)| {
                    Arc::new(Project {
                        root,
                        package,
                        workspace: Some(WorkspaceLink::Member(weak.clone())),
                    })
                })
                .collect(),
        }))
    }

    pub fn root(&self) -> &Path {
        self.project.root()
    }

    pub fn package_info(&self) -> &PackageInfo {
        self.project.package_info()
    }

    pub fn members(&self) -> &[Arc<Project>] {
        &self.members
    }

    pub fn member(&self, root: &Path) -> Option<&Arc<Project>> {
        self.members.iter().find(|m| m.root() == root)
    }
}

/// Member directories matched by the workspace globs, sorted and deduplicated.
/// Globs starting with `!` exclude matches.
fn expand_members(root: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for g in globs {
        match g.strip_prefix('!') {
            Some(negated) => exclude.extend(match_dirs(root, negated)?),
            None => include.extend(match_dirs(root, g)?),
        }
    }
    include.retain(|p| p != root && !exclude.contains(p) && paths::package_path(p).is_file());
    include.sort();
    include.dedup();
    Ok(include)
}

fn match_dirs(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = paths::glob_root(root).join(pattern.trim_end_matches('/'));
    let full = full.to_string_lossy();
    let entries = glob::glob(&full).map_err(|e| BobError::InvalidPattern {
        pattern: full.to_string(),
        message: e.to_string(),
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_dir())
        .filter_map(|p| p.canonicalize().ok())
        .collect())
}

// ---------------------------------------------------------------------------
// ProjectContext
// ---------------------------------------------------------------------------

/// What a run was started in: a workspace root or a single project.
#[derive(Debug, Clone)]
pub enum ProjectContext {
    Workspace(Arc<Workspace>),
    Project(Arc<Project>),
}

impl ProjectContext {
    /// Try a workspace at `cwd`, then a project, then give up.
    pub fn discover(cwd: &Path) -> Option<Self> {
        match Workspace::load_at(cwd) {
            Ok(ws) => return Some(ProjectContext::Workspace(ws)),
            Err(e) => tracing::debug!(error = %e, "no workspace at cwd"),
        }
        match Project::load_at(cwd) {
            Ok(project) => Some(ProjectContext::Project(Arc::new(project))),
            Err(e) => {
                tracing::debug!(error = %e, "no project at cwd");
                None
            }
        }
    }

    pub fn root(&self) -> &Path {
        match self {
            ProjectContext::Workspace(ws) => ws.root(),
            ProjectContext::Project(p) => p.root(),
        }
    }

    pub fn package_info(&self) -> &PackageInfo {
        match self {
            ProjectContext::Workspace(ws) => ws.package_info(),
            ProjectContext::Project(p) => p.package_info(),
        }
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self, ProjectContext::Workspace(_))
    }

    /// Enclosing workspace of a plain project. A workspace context has none.
    pub fn parent_workspace(&self) -> Option<Arc<Workspace>> {
        match self {
            ProjectContext::Workspace(_) => None,
            ProjectContext::Project(p) => p.workspace(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
