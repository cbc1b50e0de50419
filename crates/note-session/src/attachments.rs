//! Importing picked files as note resources.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mdcore::resources::markdown_tag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::AttachmentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// 32 hex characters, referenced from bodies as `:/<id>`.
    pub id: String,
    pub title: String,
    pub mime: String,
    pub file_extension: String,
    pub size: u64,
}

impl Resource {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn markdown_tag(&self) -> String {
        markdown_tag(&self.id, &self.title, self.is_image())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachedResource {
    pub resource: Resource,
    pub markdown_tag: String,
}

#[derive(Debug, Default)]
pub struct AttachOutcome {
    pub attached: Vec<AttachedResource>,
    pub failures: Vec<AttachmentError>,
}

#[async_trait]
pub trait ResourceImporter: Send + Sync {
    async fn import(&self, path: &Path) -> Result<Resource>;
}

/// Copies each file into the resource directory as `<id>.<ext>` with a
/// `<id>.json` metadata file next to it.
pub struct DirectoryResourceImporter {
    dir: PathBuf,
}

impl DirectoryResourceImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Ok(Self::new(config.resource_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "md" | "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ResourceImporter for DirectoryResourceImporter {
    async fn import(&self, path: &Path) -> Result<Resource> {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a file", path.display());
        }

        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        let resource = Resource {
            id: Uuid::new_v4().simple().to_string(),
            title,
            mime: mime_for_extension(&file_extension).to_string(),
            file_extension,
            size: metadata.len(),
        };

        fs::create_dir_all(&self.dir).await?;
        let target = if resource.file_extension.is_empty() {
            self.dir.join(&resource.id)
        } else {
            self.dir
                .join(format!("{}.{}", resource.id, resource.file_extension))
        };
        fs::copy(path, &target)
            .await
            .with_context(|| format!("cannot copy {} to {}", path.display(), target.display()))?;

        let json = serde_json::to_string_pretty(&resource)?;
        fs::write(self.dir.join(format!("{}.json", resource.id)), json).await?;

        log::info!("Imported {} as resource {}", path.display(), resource.id);
        Ok(resource)
    }
}

/// Import every path. A file that fails is recorded in `failures` and the
/// rest of the batch still runs.
pub async fn attach_resources(importer: &dyn ResourceImporter, paths: &[PathBuf]) -> AttachOutcome {
    let mut outcome = AttachOutcome::default();

    for path in paths {
        match importer.import(path).await {
            Ok(resource) => {
                let markdown_tag = resource.markdown_tag();
                outcome.attached.push(AttachedResource {
                    resource,
                    markdown_tag,
                });
            }
            Err(e) => {
                log::warn!("Failed to attach {}: {:#}", path.display(), e);
                outcome.failures.push(AttachmentError {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_attach_copies_files_and_builds_tags() {
        let source = TempDir::new().unwrap();
        let image = source.path().join("cat.png");
        let doc = source.path().join("notes.pdf");
        std::fs::write(&image, b"png bytes").unwrap();
        std::fs::write(&doc, b"pdf bytes").unwrap();

        let resources = TempDir::new().unwrap();
        let importer = DirectoryResourceImporter::new(resources.path());
        let outcome = attach_resources(&importer, &[image, doc]).await;

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.attached.len(), 2);

        let cat = &outcome.attached[0];
        assert_eq!(cat.resource.id.len(), 32);
        assert_eq!(cat.resource.size, 9);
        assert_eq!(cat.markdown_tag, format!("![cat.png](:/{})", cat.resource.id));
        assert!(resources
            .path()
            .join(format!("{}.png", cat.resource.id))
            .exists());
        assert!(resources
            .path()
            .join(format!("{}.json", cat.resource.id))
            .exists());

        let pdf = &outcome.attached[1];
        assert!(!pdf.resource.is_image());
        assert!(pdf.markdown_tag.starts_with("[notes.pdf]"));
    }

    #[tokio::test]
    async fn test_failed_item_does_not_abort_batch() {
        let source = TempDir::new().unwrap();
        let missing = source.path().join("missing.png");
        let present = source.path().join("present.txt");
        std::fs::write(&present, b"hi").unwrap();

        let resources = TempDir::new().unwrap();
        let importer = DirectoryResourceImporter::new(resources.path());
        let outcome = attach_resources(&importer, &[missing.clone(), present]).await;

        assert_eq!(outcome.attached.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, missing);
    }

    #[tokio::test]
    async fn test_directories_are_refused() {
        let source = TempDir::new().unwrap();
        let resources = TempDir::new().unwrap();
        let importer = DirectoryResourceImporter::new(resources.path());

        let outcome = attach_resources(&importer, &[source.path().to_path_buf()]).await;
        assert!(outcome.attached.is_empty());
        assert!(outcome.failures[0].reason.contains("not a file"));
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let resources = TempDir::new().unwrap();
        let importer = DirectoryResourceImporter::new(resources.path());
        let outcome = attach_resources(&importer, &[]).await;
        assert!(outcome.attached.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_mime_guessing() {
        assert_eq!(mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(mime_for_extension("bin"), "application/octet-stream");
    }
}
