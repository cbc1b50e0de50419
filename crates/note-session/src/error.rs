use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot load document {document_id}")]
    Load {
        document_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Cannot save document {document_id}")]
    Save {
        document_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Cannot convert document {document_id}")]
    Conversion {
        document_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Edit session is closed")]
    Closed,
}

impl SessionError {
    pub fn document_id(&self) -> Option<&str> {
        match self {
            SessionError::Load { document_id, .. }
            | SessionError::Save { document_id, .. }
            | SessionError::Conversion { document_id, .. } => Some(document_id),
            SessionError::Closed => None,
        }
    }
}

/// `err` followed by its causes, joined with `: ` like anyhow's `{:#}`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// One file of an attachment batch that could not be imported.
#[derive(Debug, Error)]
#[error("Cannot attach {path:?}: {reason}")]
pub struct AttachmentError {
    pub path: PathBuf,
    pub reason: String,
}
