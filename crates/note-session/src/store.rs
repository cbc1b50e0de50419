//! Document persistence: the store contract the session calls, and a JSON
//! file store keeping one file per document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mdcore::MarkupKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::fs::try_exists;

use crate::config::SessionConfig;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub markup_kind: MarkupKind,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub is_todo: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        markup_kind: MarkupKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            markup_kind,
            parent_id: String::new(),
            is_todo: false,
            created_time: now,
            updated_time: now,
        }
    }

    /// Apply a partial update, bumping `updated_time`.
    pub fn apply(&mut self, update: &DocumentUpdate) {
        self.title = update.title.clone();
        self.markup_kind = update.markup_kind;
        if let Some(body) = &update.body {
            self.body = body.clone();
        }
        self.updated_time = Utc::now();
    }
}

/// Fields a persist writes. A `None` body keeps the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpdate {
    pub id: String,
    pub title: String,
    pub markup_kind: MarkupKind,
    pub body: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Document, StoreError>;

    /// Write `update`, creating the document if it does not exist yet.
    async fn save(&self, update: DocumentUpdate) -> Result<Document, StoreError>;
}

pub struct FileDocumentStore {
    documents_dir: PathBuf,
}

impl FileDocumentStore {
    /// Store under `<data dir>/documents`.
    pub fn new(config: &SessionConfig) -> anyhow::Result<Self> {
        let documents_dir = config.data_dir()?.join("documents");
        Ok(Self { documents_dir })
    }

    pub fn with_dir(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.documents_dir.join(format!("{}.json", id)))
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.documents_dir).await?;
        Ok(())
    }

    async fn write(&self, document: &Document) -> Result<(), StoreError> {
        let path = self.path_for(&document.id)?;
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(document)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub async fn create(&self, document: &Document) -> Result<(), StoreError> {
        self.write(document).await?;
        log::info!("Created document {}", document.id);
        Ok(())
    }

    /// All documents, most recently updated first. Unreadable files are
    /// skipped with a warning.
    pub async fn list(&self) -> Result<Vec<Document>, StoreError> {
        if !try_exists(&self.documents_dir).await? {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        let mut entries = fs::read_dir(&self.documents_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(json) => match serde_json::from_str::<Document>(&json) {
                    Ok(document) => documents.push(document),
                    Err(e) => log::warn!("Skipping unparsable document {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("Skipping unreadable document {}: {}", path.display(), e),
            }
        }

        documents.sort_by(|a, b| b.updated_time.cmp(&a.updated_time));
        Ok(documents)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        if !try_exists(&path).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        fs::remove_file(&path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn load(&self, id: &str) -> Result<Document, StoreError> {
        let path = self.path_for(id)?;
        if !try_exists(&path).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let json = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn save(&self, update: DocumentUpdate) -> Result<Document, StoreError> {
        let mut document = match self.load(&update.id).await {
            Ok(existing) => existing,
            Err(StoreError::NotFound(_)) => Document::new(
                update.id.clone(),
                String::new(),
                String::new(),
                update.markup_kind,
            ),
            Err(e) => return Err(e),
        };
        document.apply(&update);

        self.write(&document).await?;
        log::debug!("Wrote document {} ({} bytes)", document.id, document.body.len());
        Ok(document)
    }
}
