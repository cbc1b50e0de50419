//! In-memory state of the document open for editing, and the correlation of
//! `WillChange`/`Change` editor events through change tokens.

use mdcore::MarkupKind;
use std::num::NonZeroU64;

use crate::editor::EditorContent;
use crate::store::Document;

/// Identifier the editor mints for each change. Zero is reserved for "no
/// change" and is not a valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(NonZeroU64);

impl Token {
    pub const FIRST: Token = Token(NonZeroU64::MIN);

    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Token)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeState {
    /// Nothing announced since the document loaded.
    Idle,
    /// The editor announced `token`; its content has not arrived yet.
    /// `previous` is the last content captured before the announcement.
    AwaitingChange {
        token: Token,
        previous: Option<EditorContent>,
    },
    /// Content for `token` arrived and was handed to persistence.
    Captured { token: Token, content: EditorContent },
}

/// Why an editor notification was refused outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The session has no document (fresh session or empty id).
    NoDocument,
    /// A document load is in flight; the editor is not showing it yet.
    Loading,
    /// The session has ended.
    Closed,
    /// Token zero.
    InvalidToken,
    /// The token is not newer than the last captured change.
    OutOfOrder,
}

/// Result of feeding an editor notification to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A `WillChange` was recorded.
    Recorded,
    /// A persist was scheduled.
    Scheduled,
    /// The change belongs to a document or announcement that has since been
    /// replaced; nothing was persisted. Not an error.
    Stale,
    Rejected(RejectReason),
}

/// Immutable copy of everything a persist needs, taken when it is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistSnapshot {
    pub document_id: String,
    pub title: String,
    pub markup_kind: MarkupKind,
    /// `None` leaves the stored body untouched.
    pub content: Option<EditorContent>,
    pub preserved_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub document_id: String,
    pub title: String,
    pub markup_kind: MarkupKind,
    /// Storage-only header (e.g. a `<style>` block) the editor never sees.
    pub preserved_prefix: String,
    last_change_token: Option<Token>,
    change: ChangeState,
}

impl EditBuffer {
    /// The placeholder buffer a session starts with.
    pub fn provisional() -> Self {
        Self {
            document_id: String::new(),
            title: String::new(),
            markup_kind: MarkupKind::Markdown,
            preserved_prefix: String::new(),
            last_change_token: None,
            change: ChangeState::Idle,
        }
    }

    pub fn loaded(document: &Document, preserved_prefix: String) -> Self {
        Self {
            document_id: document.id.clone(),
            title: document.title.clone(),
            markup_kind: document.markup_kind,
            preserved_prefix,
            last_change_token: None,
            change: ChangeState::Idle,
        }
    }

    pub fn has_document(&self) -> bool {
        !self.document_id.is_empty()
    }

    pub fn change_state(&self) -> &ChangeState {
        &self.change
    }

    pub fn pending_edit_token(&self) -> Option<Token> {
        match self.change {
            ChangeState::AwaitingChange { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn last_change_token(&self) -> Option<Token> {
        self.last_change_token
    }

    /// Last content captured from the editor, if any.
    pub fn raw_content(&self) -> Option<&EditorContent> {
        match &self.change {
            ChangeState::Idle => None,
            ChangeState::AwaitingChange { previous, .. } => previous.as_ref(),
            ChangeState::Captured { content, .. } => Some(content),
        }
    }

    pub fn will_change(&mut self, token: Token) -> Result<(), RejectReason> {
        if !self.has_document() {
            return Err(RejectReason::NoDocument);
        }
        if self.last_change_token.is_some_and(|last| token <= last) {
            return Err(RejectReason::OutOfOrder);
        }

        let previous = self.raw_content().cloned();
        self.change = ChangeState::AwaitingChange { token, previous };
        Ok(())
    }

    /// Accept the content for `token` if it is the announced change.
    /// Returns `None` for a stale change, leaving the buffer untouched.
    pub fn capture(&mut self, token: Token, content: EditorContent) -> Option<PersistSnapshot> {
        match self.change {
            ChangeState::AwaitingChange { token: pending, .. } if pending == token => {}
            _ => return None,
        }

        self.last_change_token = Some(token);
        self.change = ChangeState::Captured { token, content };
        Some(self.snapshot())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<PersistSnapshot, RejectReason> {
        if !self.has_document() {
            return Err(RejectReason::NoDocument);
        }
        self.title = title.into();
        Ok(self.snapshot())
    }

    /// Settle an announced change whose content never arrived, using
    /// `current` (read from the editor) or the last captured content.
    /// Later `Change` events for that token become stale.
    pub fn take_pending_flush(&mut self, current: Option<EditorContent>) -> Option<PersistSnapshot> {
        let ChangeState::AwaitingChange { token, previous } = &self.change else {
            return None;
        };
        let token = *token;
        let content = current.or_else(|| previous.clone());

        self.last_change_token = Some(token);
        self.change = match content {
            Some(content) => ChangeState::Captured { token, content },
            None => ChangeState::Idle,
        };
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> PersistSnapshot {
        PersistSnapshot {
            document_id: self.document_id.clone(),
            title: self.title.clone(),
            markup_kind: self.markup_kind,
            content: self.raw_content().cloned(),
            preserved_prefix: self.preserved_prefix.clone(),
        }
    }
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::provisional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(raw: u64) -> Token {
        Token::new(raw).unwrap()
    }

    fn open_buffer() -> EditBuffer {
        let document = Document::new("doc1", "Title", "body", MarkupKind::Markdown);
        EditBuffer::loaded(&document, String::new())
    }

    #[test]
    fn test_token_zero_is_reserved() {
        assert!(Token::new(0).is_none());
        assert_eq!(Token::new(1), Some(Token::FIRST));
    }

    #[test]
    fn test_provisional_buffer_rejects_edits() {
        let mut buffer = EditBuffer::provisional();
        assert_eq!(buffer.will_change(token(1)), Err(RejectReason::NoDocument));
        assert_eq!(buffer.set_title("x"), Err(RejectReason::NoDocument));
    }

    #[test]
    fn test_matching_change_is_captured() {
        let mut buffer = open_buffer();
        buffer.will_change(token(3)).unwrap();
        assert_eq!(buffer.pending_edit_token(), Some(token(3)));

        let snapshot = buffer.capture(token(3), EditorContent::from("new")).unwrap();
        assert_eq!(snapshot.content, Some(EditorContent::from("new")));
        assert_eq!(snapshot.document_id, "doc1");
        assert_eq!(buffer.pending_edit_token(), None);
        assert_eq!(buffer.last_change_token(), Some(token(3)));
    }

    #[test]
    fn test_mismatched_change_is_stale() {
        let mut buffer = open_buffer();
        buffer.will_change(token(4)).unwrap();

        assert!(buffer.capture(token(3), EditorContent::from("old")).is_none());
        assert_eq!(buffer.pending_edit_token(), Some(token(4)));
        assert!(buffer.raw_content().is_none());
    }

    #[test]
    fn test_change_without_announcement_is_stale() {
        let mut buffer = open_buffer();
        assert!(buffer.capture(token(1), EditorContent::from("x")).is_none());
    }

    #[test]
    fn test_newer_announcement_supersedes_older() {
        let mut buffer = open_buffer();
        buffer.will_change(token(1)).unwrap();
        buffer.will_change(token(2)).unwrap();

        assert!(buffer.capture(token(1), EditorContent::from("a")).is_none());
        assert!(buffer.capture(token(2), EditorContent::from("ab")).is_some());
    }

    #[test]
    fn test_old_token_is_out_of_order() {
        let mut buffer = open_buffer();
        buffer.will_change(token(5)).unwrap();
        buffer.capture(token(5), EditorContent::from("x")).unwrap();

        assert_eq!(buffer.will_change(token(5)), Err(RejectReason::OutOfOrder));
        assert_eq!(buffer.will_change(token(2)), Err(RejectReason::OutOfOrder));
    }

    #[test]
    fn test_snapshot_is_detached_from_buffer() {
        let mut buffer = open_buffer();
        buffer.will_change(token(1)).unwrap();
        let snapshot = buffer.capture(token(1), EditorContent::from("v1")).unwrap();

        buffer.set_title("Renamed").unwrap();
        buffer.will_change(token(2)).unwrap();
        buffer.capture(token(2), EditorContent::from("v2")).unwrap();

        assert_eq!(snapshot.title, "Title");
        assert_eq!(snapshot.content, Some(EditorContent::from("v1")));
    }

    #[test]
    fn test_title_snapshot_carries_captured_body() {
        let mut buffer = open_buffer();
        let snapshot = buffer.set_title("Only title").unwrap();
        assert_eq!(snapshot.content, None);

        buffer.will_change(token(1)).unwrap();
        buffer.capture(token(1), EditorContent::from("body")).unwrap();
        let snapshot = buffer.set_title("Both").unwrap();
        assert_eq!(snapshot.content, Some(EditorContent::from("body")));
    }

    #[test]
    fn test_pending_flush_prefers_current_editor_content() {
        let mut buffer = open_buffer();
        buffer.will_change(token(1)).unwrap();
        buffer.capture(token(1), EditorContent::from("captured")).unwrap();
        buffer.will_change(token(2)).unwrap();

        let snapshot = buffer
            .take_pending_flush(Some(EditorContent::from("on screen")))
            .unwrap();
        assert_eq!(snapshot.content, Some(EditorContent::from("on screen")));
        assert!(buffer.capture(token(2), EditorContent::from("late")).is_none());
    }

    #[test]
    fn test_pending_flush_falls_back_to_captured_content() {
        let mut buffer = open_buffer();
        buffer.will_change(token(1)).unwrap();
        buffer.capture(token(1), EditorContent::from("captured")).unwrap();
        buffer.will_change(token(2)).unwrap();

        let snapshot = buffer.take_pending_flush(None).unwrap();
        assert_eq!(snapshot.content, Some(EditorContent::from("captured")));
    }

    #[test]
    fn test_nothing_to_flush_without_announcement() {
        let mut buffer = open_buffer();
        assert!(buffer.take_pending_flush(Some(EditorContent::from("x"))).is_none());
    }
}
