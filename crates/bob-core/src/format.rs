//! Serialize/deserialize strategies for template files.
//!
//! Each format decides what a template handler receives for a file's
//! existing content and how the handler's result is turned back into text.

use crate::error::{BobError, Result};
use crate::source::{SourceKind, SourceTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Json,
    Text,
    Yaml,
    Ts,
    Js,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Json => "json",
            FormatKind::Text => "text",
            FormatKind::Yaml => "yaml",
            FormatKind::Ts => "ts",
            FormatKind::Js => "js",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait FileFormat {
    const KIND: FormatKind;

    /// What the handler receives for the file's existing content.
    type Input;
    /// What the handler returns.
    type Output;

    fn deserialize(path: &Path, existing: Option<String>) -> Result<Self::Input>;
    fn serialize(path: &Path, value: &Self::Output) -> Result<String>;
}

fn parse_error(path: &Path, kind: FormatKind, message: impl ToString) -> BobError {
    BobError::Parse {
        path: path.to_path_buf(),
        format: kind.as_str(),
        message: message.to_string(),
    }
}

/// Missing and empty content both read as "no existing value".
fn non_empty(existing: Option<String>) -> Option<String> {
    existing.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// json
// ---------------------------------------------------------------------------

pub struct Json;

impl FileFormat for Json {
    const KIND: FormatKind = FormatKind::Json;
    type Input = Option<Value>;
    type Output = Value;

    fn deserialize(path: &Path, existing: Option<String>) -> Result<Self::Input> {
        non_empty(existing)
            .map(|s| serde_json::from_str(&s).map_err(|e| parse_error(path, Self::KIND, e)))
            .transpose()
    }

    fn serialize(_path: &Path, value: &Self::Output) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

// ---------------------------------------------------------------------------
// text
// ---------------------------------------------------------------------------

pub struct Text;

impl FileFormat for Text {
    const KIND: FormatKind = FormatKind::Text;
    type Input = String;
    type Output = String;

    fn deserialize(_path: &Path, existing: Option<String>) -> Result<Self::Input> {
        Ok(existing.unwrap_or_default())
    }

    fn serialize(_path: &Path, value: &Self::Output) -> Result<String> {
        Ok(value.clone())
    }
}

// ---------------------------------------------------------------------------
// yaml
// ---------------------------------------------------------------------------

pub struct Yaml;

impl FileFormat for Yaml {
    const KIND: FormatKind = FormatKind::Yaml;
    type Input = Option<Value>;
    type Output = Value;

    fn deserialize(path: &Path, existing: Option<String>) -> Result<Self::Input> {
        non_empty(existing)
            .map(|s| serde_yaml::from_str(&s).map_err(|e| parse_error(path, Self::KIND, e)))
            .transpose()
    }

    fn serialize(_path: &Path, value: &Self::Output) -> Result<String> {
        Ok(serde_yaml::to_string(value)?)
    }
}

// ---------------------------------------------------------------------------
// ts / js
// ---------------------------------------------------------------------------

fn parse_source(path: &Path, kind: FormatKind, existing: Option<String>) -> Result<SourceTree> {
    let source_kind = match kind {
        FormatKind::Js => SourceKind::JavaScript,
        _ => SourceKind::TypeScript,
    };
    SourceTree::parse(source_kind, existing.unwrap_or_default())
        .map_err(|e| parse_error(path, kind, e))
}

pub struct Ts;

impl FileFormat for Ts {
    const KIND: FormatKind = FormatKind::Ts;
    type Input = SourceTree;
    type Output = SourceTree;

    fn deserialize(path: &Path, existing: Option<String>) -> Result<Self::Input> {
        parse_source(path, Self::KIND, existing)
    }

    fn serialize(_path: &Path, value: &Self::Output) -> Result<String> {
        Ok(value.text().to_string())
    }
}

pub struct Js;

impl FileFormat for Js {
    const KIND: FormatKind = FormatKind::Js;
    type Input = SourceTree;
    type Output = SourceTree;

    fn deserialize(path: &Path, existing: Option<String>) -> Result<Self::Input> {
        parse_source(path, Self::KIND, existing)
    }

    fn serialize(_path: &Path, value: &Self::Output) -> Result<String> {
        Ok(value.text().to_string())
    }
}

// ---------------------------------------------------------------------------
// Structured value helpers
// ---------------------------------------------------------------------------

/// Deep-merge `patch` into `base`: objects merge key by key, anything else is replaced.
pub fn merge_values(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => {
                        let current = existing.take();
                        *existing = merge_values(current, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}
