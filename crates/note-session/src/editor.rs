use mdcore::MarkupKind;
use parking_lot::Mutex;
use ropey::Rope;
use std::ops::Range;

use crate::buffer::Token;

/// Body content in the editor's own representation, before conversion to
/// storage form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorContent(String);

impl EditorContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EditorContent {
    fn from(content: String) -> Self {
        Self(content)
    }
}

impl From<&str> for EditorContent {
    fn from(content: &str) -> Self {
        Self(content.to_string())
    }
}

/// Notifications an editor widget emits while the user types.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Content is about to change; the content itself follows later.
    WillChange(Token),
    /// The content for the change announced with the same token.
    Change(Token, EditorContent),
}

/// What the widget should display once a document has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub document_id: String,
    pub title: String,
    pub markup_kind: MarkupKind,
    pub content: EditorContent,
}

/// The editing widget as seen by the session.
///
/// Both methods are called while the session holds its state lock, so an
/// implementation must not call back into the session from them.
pub trait EditorWidget: Send + Sync {
    /// Display a freshly loaded document.
    fn load(&self, state: &EditorState);

    /// Content currently displayed, read synchronously when an announced
    /// change has to be flushed before its `Change` event arrived.
    fn current_content(&self) -> Option<EditorContent>;
}

/// Rope-backed plain text widget. Every edit mints a new token and yields a
/// `WillChange` event; `commit` yields the matching `Change` once the host
/// decides the user paused.
pub struct TextEditor {
    inner: Mutex<TextEditorInner>,
}

struct TextEditorInner {
    rope: Rope,
    document_id: Option<String>,
    last_token: u64,
    uncommitted: Option<Token>,
}

impl TextEditor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TextEditorInner {
                rope: Rope::new(),
                document_id: None,
                last_token: 0,
                uncommitted: None,
            }),
        }
    }

    pub fn document_id(&self) -> Option<String> {
        self.inner.lock().document_id.clone()
    }

    pub fn content(&self) -> String {
        self.inner.lock().rope.to_string()
    }

    pub fn line_count(&self) -> usize {
        self.inner.lock().rope.len_lines()
    }

    /// Insert `text` at a char index, clamped to the end of the content.
    pub fn insert(&self, char_idx: usize, text: &str) -> EditorEvent {
        let mut inner = self.inner.lock();
        let at = char_idx.min(inner.rope.len_chars());
        inner.rope.insert(at, text);
        inner.announce()
    }

    pub fn append(&self, text: &str) -> EditorEvent {
        self.insert(usize::MAX, text)
    }

    /// Remove a char range, clamped to the content.
    pub fn delete(&self, range: Range<usize>) -> EditorEvent {
        let mut inner = self.inner.lock();
        let len = inner.rope.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        inner.rope.remove(start..end);
        inner.announce()
    }

    /// Deliver the content for the most recent uncommitted edit.
    pub fn commit(&self) -> Option<EditorEvent> {
        let mut inner = self.inner.lock();
        let token = inner.uncommitted.take()?;
        Some(EditorEvent::Change(
            token,
            EditorContent::from(inner.rope.to_string()),
        ))
    }
}

impl TextEditorInner {
    fn announce(&mut self) -> EditorEvent {
        self.last_token += 1;
        // The counter starts at zero and only grows, so this never fails.
        let token = Token::new(self.last_token).unwrap_or(Token::FIRST);
        self.uncommitted = Some(token);
        EditorEvent::WillChange(token)
    }
}

impl Default for TextEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorWidget for TextEditor {
    fn load(&self, state: &EditorState) {
        let mut inner = self.inner.lock();
        inner.rope = Rope::from_str(state.content.as_str());
        inner.document_id = Some(state.document_id.clone());
        // Tokens keep increasing across documents; only the pending one is
        // forgotten.
        inner.uncommitted = None;
    }

    fn current_content(&self) -> Option<EditorContent> {
        let inner = self.inner.lock();
        inner
            .document_id
            .as_ref()
            .map(|_| EditorContent::from(inner.rope.to_string()))
    }
}
