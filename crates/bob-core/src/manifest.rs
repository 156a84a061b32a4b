//! Declarative command modules (`commands/<name>/command.yaml`).
//!
//! ```yaml
//! kind: bob/command
//! api: 1
//! name: setup-lint
//! description: Add eslint to the project
//! templates:
//!   - path: package.json
//!     format: json
//!     merge:
//!       scripts:
//!         lint: eslint .
//!   - path: .eslintignore
//!     format: text
//!     create: "dist\n"
//!   - path: src/index.ts
//!     format: ts
//!     append: "export * from './lint';"
//! ```
//!
//! Steps run in order. Each one reads the file from disk, so two steps on
//! the same path do not see each other and the last one wins.

use crate::command::{define_command, Command, CommandAction, COMMAND_TAG};
use crate::error::{BobError, Result};
use crate::format::{merge_values, FormatKind, Js, Json, Text, Ts, Yaml};
use crate::program::ProgramContext;
use crate::source::{SourceKind, SourceTree};
use crate::template::define_sync;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandManifest {
    pub kind: String,
    #[serde(default = "default_api")]
    pub api: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub templates: Vec<TemplateStep>,
}

fn default_api() -> u64 {
    crate::command::COMMAND_API
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStep {
    /// Target file, relative to the project root (or cwd without a project).
    pub path: PathBuf,
    pub format: FormatKind,
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Overwrite the file with this content.
    Replace(Value),
    /// Deep-merge into the existing structured value (json/yaml).
    Merge(Value),
    /// Append text or statements (text/ts/js).
    Append(String),
    /// Write this content only when the file does not exist yet.
    Create(Value),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Replace(_) => "replace",
            Operation::Merge(_) => "merge",
            Operation::Append(_) => "append",
            Operation::Create(_) => "create",
        }
    }
}

fn is_structured(format: FormatKind) -> bool {
    matches!(format, FormatKind::Json | FormatKind::Yaml)
}

impl CommandManifest {
    /// Reject steps whose operation does not fit their format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.kind != COMMAND_TAG {
            return Err(format!("kind is '{}', expected '{COMMAND_TAG}'", self.kind));
        }
        for (i, step) in self.templates.iter().enumerate() {
            let bad = match (&step.operation, is_structured(step.format)) {
                (Operation::Merge(_), false) => Some("merge needs a json or yaml format"),
                (Operation::Append(_), true) => Some("append needs a text, ts or js format"),
                (Operation::Replace(v) | Operation::Create(v), false) if !v.is_string() => {
                    Some("content for text, ts and js must be a string")
                }
                _ => None,
            };
            if let Some(reason) = bad {
                return Err(format!(
                    "template {} ({}, {} {}): {reason}",
                    i + 1,
                    step.path.display(),
                    step.format,
                    step.operation.name()
                ));
            }
        }
        Ok(())
    }

    /// Validate and turn the manifest into a command. Errors name `origin`.
    pub fn into_command(self, origin: &Path) -> Result<Arc<Command>> {
        let invalid = |reason: String| BobError::InvalidCommandExport {
            path: origin.to_path_buf(),
            reason,
        };
        self.validate().map_err(invalid)?;
        define_command(
            self.name,
            self.description,
            ManifestAction {
                templates: self.templates,
            },
        )
        .map_err(|e| invalid(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

pub struct ManifestAction {
    templates: Vec<TemplateStep>,
}

#[async_trait]
impl CommandAction for ManifestAction {
    async fn execute(&self, program: &ProgramContext) -> anyhow::Result<()> {
        for step in &self.templates {
            let path = program.resolve(&step.path);
            apply_step(program, step, &path).await?;
        }
        Ok(())
    }
}

async fn apply_step(program: &ProgramContext, step: &TemplateStep, path: &Path) -> Result<()> {
    let buffer = program.buffer();
    if matches!(step.operation, Operation::Create(_)) && buffer.read_existing(path)?.is_some() {
        tracing::debug!(path = %path.display(), "file exists, create step skipped");
        return Ok(());
    }
    tracing::debug!(
        path = %path.display(),
        format = %step.format,
        operation = step.operation.name(),
        "applying template step"
    );

    let op = &step.operation;
    match step.format {
        FormatKind::Json => {
            define_sync::<Json, _>(|existing| Ok(structured(existing, op)))
                .write_to(buffer, path)
                .await
        }
        FormatKind::Yaml => {
            define_sync::<Yaml, _>(|existing| Ok(structured(existing, op)))
                .write_to(buffer, path)
                .await
        }
        FormatKind::Text => {
            define_sync::<Text, _>(|existing| Ok(text(existing, op)))
                .write_to(buffer, path)
                .await
        }
        FormatKind::Ts => {
            define_sync::<Ts, _>(|tree| source(tree, op, path, step.format))
                .write_to(buffer, path)
                .await
        }
        FormatKind::Js => {
            define_sync::<Js, _>(|tree| source(tree, op, path, step.format))
                .write_to(buffer, path)
                .await
        }
    }
}

fn structured(existing: Option<Value>, op: &Operation) -> Value {
    match op {
        Operation::Merge(patch) => merge_values(
            existing.unwrap_or_else(|| Value::Object(Default::default())),
            patch.clone(),
        ),
        Operation::Replace(value) | Operation::Create(value) => value.clone(),
        // rejected by validate()
        Operation::Append(_) => existing.unwrap_or(Value::Null),
    }
}

fn content_str(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn text(existing: String, op: &Operation) -> String {
    match op {
        Operation::Replace(v) | Operation::Create(v) => content_str(v).to_string(),
        Operation::Append(more) => {
            let mut out = existing;
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(more);
            out
        }
        Operation::Merge(_) => existing,
    }
}

fn source(mut tree: SourceTree, op: &Operation, path: &Path, format: FormatKind) -> Result<SourceTree> {
    let parse_error = |e: crate::source::SourceError| BobError::Parse {
        path: path.to_path_buf(),
        format: format.as_str(),
        message: e.to_string(),
    };
    let kind: SourceKind = tree.kind();
    match op {
        Operation::Replace(v) | Operation::Create(v) => {
            SourceTree::parse(kind, content_str(v)).map_err(parse_error)
        }
        Operation::Append(statement) => {
            tree.append_statement(statement).map_err(parse_error)?;
            Ok(tree)
        }
        Operation::Merge(_) => Ok(tree),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramOptions;
    use tempfile::TempDir;

    fn manifest(yaml: &str) -> CommandManifest {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn bound(dir: &TempDir, yaml: &str) -> (Arc<ProgramContext>, Arc<Command>) {
        let context = Arc::new(ProgramContext::bare(ProgramOptions::new(dir.path())));
        let cmd = manifest(yaml)
            .into_command(Path::new("/x/command.yaml"))
            .unwrap();
        cmd.bind(context.clone()).unwrap();
        (context, cmd)
    }

    #[test]
    fn parses_operations() {
        let m = manifest(
            "kind: bob/command\nname: a\ntemplates:\n\
             - {path: a.json, format: json, merge: {x: 1}}\n\
             - {path: b.txt, format: text, append: more}\n",
        );
        assert_eq!(m.api, 1);
        assert_eq!(m.templates[0].operation, Operation::Merge(serde_json::json!({"x": 1})));
        assert_eq!(m.templates[1].operation, Operation::Append("more".into()));
    }

    #[test]
    fn validate_rejects_mismatched_operation() {
        let m = manifest(
            "kind: bob/command\nname: a\ntemplates:\n- {path: a.txt, format: text, merge: {x: 1}}\n",
        );
        let err = m.into_command(Path::new("/p/command.yaml")).unwrap_err();
        match err {
            BobError::InvalidCommandExport { path, reason } => {
                assert_eq!(path, Path::new("/p/command.yaml"));
                assert!(reason.contains("merge needs"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn invalid_name_is_invalid_export() {
        let m = manifest("kind: bob/command\nname: Not Valid\n");
        assert!(matches!(
            m.into_command(Path::new("/p/command.yaml")),
            Err(BobError::InvalidCommandExport { .. })
        ));
    }

    #[tokio::test]
    async fn executes_steps_into_buffer_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "demo"}"#).unwrap();
        std::fs::write(dir.path().join("keep.txt"), "original").unwrap();
        let (context, cmd) = bound(
            &dir,
            "kind: bob/command\nname: setup\ntemplates:\n\
             - {path: package.json, format: json, merge: {scripts: {lint: eslint}}}\n\
             - {path: keep.txt, format: text, create: replaced}\n\
             - {path: ci.yaml, format: yaml, replace: {steps: [test]}}\n\
             - {path: src/index.ts, format: ts, append: \"export const a = 1;\"}\n",
        );

        cmd.execute().await.unwrap();
        let buffer = context.buffer();

        assert_eq!(
            buffer.staged(&dir.path().join("package.json")).as_deref(),
            Some("{\n  \"name\": \"demo\",\n  \"scripts\": {\n    \"lint\": \"eslint\"\n  }\n}")
        );
        assert!(buffer.staged(&dir.path().join("keep.txt")).is_none());
        assert_eq!(
            buffer.staged(&dir.path().join("ci.yaml")).as_deref(),
            Some("steps:\n- test\n")
        );
        assert_eq!(
            buffer.staged(&dir.path().join("src/index.ts")).as_deref(),
            Some("export const a = 1;\n")
        );
        assert!(!dir.path().join("ci.yaml").exists());
    }

    #[tokio::test]
    async fn malformed_target_fails_with_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let (_context, cmd) = bound(
            &dir,
            "kind: bob/command\nname: b\ntemplates:\n\
             - {path: broken.json, format: json, merge: {a: 1}}\n",
        );

        let err = cmd.execute().await.unwrap_err();
        assert!(err.to_string().contains("failed to parse json"));
    }

    #[tokio::test]
    async fn same_path_twice_last_step_wins() {
        let dir = TempDir::new().unwrap();
        let (context, cmd) = bound(
            &dir,
            "kind: bob/command\nname: c\ntemplates:\n\
             - {path: a.txt, format: text, append: one}\n\
             - {path: a.txt, format: text, append: two}\n",
        );

        cmd.execute().await.unwrap();
        assert_eq!(
            context.buffer().staged(&dir.path().join("a.txt")).as_deref(),
            Some("two")
        );
    }
}
