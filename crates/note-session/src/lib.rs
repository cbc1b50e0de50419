// Note editing session library exports

pub mod attachments;
pub mod buffer;
pub mod config;
pub mod convert;
pub mod editor;
pub mod error;
pub mod queue;
pub mod session;
pub mod store;

pub use attachments::{
    attach_resources, AttachOutcome, AttachedResource, DirectoryResourceImporter, Resource,
    ResourceImporter,
};
pub use buffer::{ChangeOutcome, ChangeState, EditBuffer, PersistSnapshot, RejectReason, Token};
pub use config::{RenderConfig, SessionConfig};
pub use convert::{Converter, MarkupConverter, RenderOptions, RenderOutput, RenderResource};
pub use editor::{EditorContent, EditorEvent, EditorState, EditorWidget, TextEditor};
pub use error::{AttachmentError, SessionError, StoreError};
pub use mdcore::MarkupKind;
pub use queue::{DeferredActionQueue, QueueOptions, QueuePolicy, QueueState};
pub use session::{EditSession, SessionEvent};
pub use store::{Document, DocumentStore, DocumentUpdate, FileDocumentStore};
