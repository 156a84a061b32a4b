//! Format-aware read → transform → write of a single file.

use crate::error::Result;
use crate::format::FileFormat;
use crate::fs::FileCommitBuffer;
use std::future::{ready, Future, Ready};
use std::marker::PhantomData;
use std::path::Path;

/// A template bound to one [`FileFormat`] and a handler that maps the
/// deserialized existing content to the new content.
///
/// ```rust,ignore
/// use bob_core::format::Json;
/// use bob_core::template::define_sync;
///
/// let template = define_sync::<Json, _>(|existing| {
///     let base = existing.unwrap_or_else(|| serde_json::json!({}));
///     Ok(bob_core::format::merge_values(base, serde_json::json!({"private": true})))
/// });
/// template.write_to(&buffer, root.join("package.json")).await?;
/// ```
pub struct TemplateFile<F, H> {
    handler: H,
    _format: PhantomData<fn() -> F>,
}

impl<F, H, Fut> TemplateFile<F, H>
where
    F: FileFormat,
    H: Fn(F::Input) -> Fut,
    Fut: Future<Output = Result<F::Output>>,
{
    pub fn define(handler: H) -> Self {
        Self {
            handler,
            _format: PhantomData,
        }
    }

    /// Read the file at `path`, run the handler, and stage the result.
    ///
    /// Nothing touches disk until the buffer is committed.
    pub async fn write_to(&self, buffer: &FileCommitBuffer, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let existing = buffer.read_existing(path)?;
        let input = F::deserialize(path, existing)?;
        let output = (self.handler)(input).await?;
        let content = F::serialize(path, &output)?;
        tracing::debug!(path = %path.display(), format = %F::KIND, "template rendered");
        buffer.stage(path, content);
        Ok(())
    }
}

/// Define a template whose handler does not need to await anything.
pub fn define_sync<F, S>(
    handler: S,
) -> TemplateFile<F, impl Fn(F::Input) -> Ready<Result<F::Output>>>
where
    F: FileFormat,
    S: Fn(F::Input) -> Result<F::Output>,
{
    TemplateFile::<F, _>::define(move |input: F::Input| ready(handler(input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BobError;
    use crate::format::{merge_values, Js, Json, Text, Ts, Yaml};
    use crate::fs::tests::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn buffer_with(path: &str, content: &str) -> (Arc<MemoryStore>, FileCommitBuffer) {
        let store = Arc::new(MemoryStore::default().with_file(path, content));
        let buffer = FileCommitBuffer::new(store.clone());
        (store, buffer)
    }

    #[tokio::test]
    async fn json_template_merges_existing_content() {
        let (store, buffer) = buffer_with("/p/data.json", "{\"a\":1}");
        let template = TemplateFile::<Json, _>::define(|existing| async move {
            let base = existing.unwrap_or_else(|| json!({}));
            Ok(merge_values(base, json!({"b": 2})))
        });

        template.write_to(&buffer, "/p/data.json").await.unwrap();

        assert_eq!(
            buffer.staged(Path::new("/p/data.json")).as_deref(),
            Some("{\n  \"a\": 1,\n  \"b\": 2\n}")
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_json_file_passes_none() {
        let (_store, buffer) = buffer_with("/p/other.json", "{}");
        let template = define_sync::<Json, _>(|existing| {
            assert!(existing.is_none());
            Ok(json!({"created": true}))
        });

        template.write_to(&buffer, "/p/new.json").await.unwrap();
        assert!(buffer.staged(Path::new("/p/new.json")).is_some());
    }

    #[tokio::test]
    async fn missing_yaml_file_passes_none() {
        let (_store, buffer) = buffer_with("/p/other.yaml", "");
        let template = define_sync::<Yaml, _>(|existing| {
            assert!(existing.is_none());
            Ok(json!({"steps": ["push"]}))
        });

        template.write_to(&buffer, "/p/ci.yaml").await.unwrap();
        assert_eq!(
            buffer.staged(Path::new("/p/ci.yaml")).as_deref(),
            Some("steps:\n- push\n")
        );
    }

    #[tokio::test]
    async fn missing_text_file_passes_empty_string() {
        let (_store, buffer) = buffer_with("/p/x", "");
        let template = define_sync::<Text, _>(|existing| {
            assert_eq!(existing, "");
            Ok("MIT".to_string())
        });

        template.write_to(&buffer, "/p/LICENSE").await.unwrap();
        assert_eq!(buffer.staged(Path::new("/p/LICENSE")).as_deref(), Some("MIT"));
    }

    #[tokio::test]
    async fn source_template_appends_statement() {
        let (_store, buffer) = buffer_with("/p/index.ts", "export * from './a';\n");
        let template = TemplateFile::<Ts, _>::define(|mut tree| async move {
            tree.append_statement("export * from './b';")
                .map_err(|e| BobError::Command(e.into()))?;
            Ok(tree)
        });

        template.write_to(&buffer, "/p/index.ts").await.unwrap();
        assert_eq!(
            buffer.staged(Path::new("/p/index.ts")).as_deref(),
            Some("export * from './a';\nexport * from './b';\n")
        );
    }

    #[tokio::test]
    async fn malformed_existing_content_aborts_without_staging() {
        let (_store, buffer) = buffer_with("/p/broken.js", "function (");
        let template = define_sync::<Js, _>(Ok);

        let err = template.write_to(&buffer, "/p/broken.js").await.unwrap_err();
        assert!(matches!(err, BobError::Parse { .. }));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn handler_error_propagates_unchanged() {
        let (_store, buffer) = buffer_with("/p/x", "");
        let template = define_sync::<Text, _>(|_| {
            Err(BobError::Command(anyhow::anyhow!("handler refused")))
        });

        let err = template.write_to(&buffer, "/p/out.txt").await.unwrap_err();
        assert_eq!(err.to_string(), "handler refused");
        assert!(buffer.is_empty());
    }
}
