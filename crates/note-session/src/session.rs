//! The editing session: owns the buffer of the open document, turns editor
//! notifications into persists, and hands off safely between documents.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use mdcore::MarkupKind;

use crate::buffer::{ChangeOutcome, EditBuffer, PersistSnapshot, RejectReason, Token};
use crate::config::SessionConfig;
use crate::convert::{Converter, RenderOptions, RenderOutput};
use crate::editor::{EditorContent, EditorEvent, EditorState, EditorWidget};
use crate::error::{error_chain, SessionError};
use crate::queue::{DeferredActionQueue, QueueOptions};
use crate::store::{DocumentStore, DocumentUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A document finished loading and is now shown by the editor.
    DocumentLoaded(EditorState),
    LoadFailed { document_id: String, message: String },
    /// The first edit landed on a newly created document.
    ProvisionalCleared { document_id: String },
    SaveFailed { document_id: String, message: String },
}

enum Slot {
    Open(EditBuffer),
    /// `previous` is reinstated if the load fails.
    Loading {
        document_id: String,
        previous: EditBuffer,
    },
    Closed,
}

struct SessionState {
    slot: Slot,
    /// Bumped on every switch so a superseded load can tell it lost.
    generation: u64,
    provisional: Option<String>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    converter: Arc<dyn Converter>,
    editor: Arc<dyn EditorWidget>,
    queue: DeferredActionQueue,
    render_options: RenderOptions,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: Mutex<SessionState>,
}

/// Handle to an editing session. Clones share the same session.
///
/// Editor notifications are handled synchronously: token bookkeeping is
/// finished before the call returns and nothing in it suspends. Conversion
/// and store calls run later on the session's own action queue.
#[derive(Clone)]
pub struct EditSession {
    inner: Arc<Inner>,
}

impl EditSession {
    /// Start a session on the provisional empty buffer. Must be called
    /// within a Tokio runtime.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        converter: Arc<dyn Converter>,
        editor: Arc<dyn EditorWidget>,
        config: &SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let failure_events = events.clone();
        let queue = DeferredActionQueue::spawn(
            QueueOptions::new(config.save_delay())
                .policy(config.queue_policy)
                .on_failure(move |err| {
                    log::error!("Save failed: {:#}", err);
                    let document_id = err
                        .downcast_ref::<SessionError>()
                        .and_then(|e| e.document_id())
                        .unwrap_or_default()
                        .to_string();
                    let _ = failure_events.send(SessionEvent::SaveFailed {
                        document_id,
                        message: format!("{:#}", err),
                    });
                }),
        );

        let session = Self {
            inner: Arc::new(Inner {
                store,
                converter,
                editor,
                queue,
                render_options: RenderOptions::from(&config.render),
                events,
                state: Mutex::new(SessionState {
                    slot: Slot::Open(EditBuffer::provisional()),
                    generation: 0,
                    provisional: None,
                }),
            }),
        };
        (session, receiver)
    }

    /// Id of the document being edited, `None` while loading or closed.
    pub fn current_document_id(&self) -> Option<String> {
        match &self.inner.state.lock().slot {
            Slot::Open(buffer) if buffer.has_document() => Some(buffer.document_id.clone()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.inner.state.lock().slot, Slot::Loading { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner.state.lock().slot, Slot::Closed)
    }

    /// Copy of the live buffer.
    pub fn buffer(&self) -> Option<EditBuffer> {
        match &self.inner.state.lock().slot {
            Slot::Open(buffer) => Some(buffer.clone()),
            _ => None,
        }
    }

    /// Flag `document_id` as freshly created; its first edit clears the flag.
    pub fn mark_provisional(&self, document_id: impl Into<String>) {
        self.inner.state.lock().provisional = Some(document_id.into());
    }

    pub fn is_provisional(&self, document_id: &str) -> bool {
        self.inner.state.lock().provisional.as_deref() == Some(document_id)
    }

    pub fn handle_editor_event(&self, event: EditorEvent) -> ChangeOutcome {
        match event {
            EditorEvent::WillChange(token) => self.on_will_change(token.get()),
            EditorEvent::Change(token, content) => self.on_change(token.get(), content),
        }
    }

    /// The editor announced a change it will deliver later.
    pub fn on_will_change(&self, token: u64) -> ChangeOutcome {
        let Some(token) = Token::new(token) else {
            return ChangeOutcome::Rejected(RejectReason::InvalidToken);
        };

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let buffer = match open_buffer(&mut state.slot) {
            Ok(buffer) => buffer,
            Err(reason) => return ChangeOutcome::Rejected(reason),
        };

        if let Err(reason) = buffer.will_change(token) {
            log::debug!("Ignoring announcement {} for {}: {:?}", token, buffer.document_id, reason);
            return ChangeOutcome::Rejected(reason);
        }
        let document_id = buffer.document_id.clone();
        self.clear_provisional(state, &document_id);
        ChangeOutcome::Recorded
    }

    /// The editor delivered the content for an announced change.
    pub fn on_change(&self, token: u64, content: impl Into<EditorContent>) -> ChangeOutcome {
        let Some(token) = Token::new(token) else {
            return ChangeOutcome::Rejected(RejectReason::InvalidToken);
        };

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let buffer = match open_buffer(&mut state.slot) {
            Ok(buffer) => buffer,
            Err(reason) => {
                log::info!("Discarding change {} while {:?}", token, reason);
                return ChangeOutcome::Stale;
            }
        };

        let Some(snapshot) = buffer.capture(token, content.into()) else {
            log::info!(
                "Discarding stale change {} for {} (pending: {:?})",
                token,
                buffer.document_id,
                buffer.pending_edit_token()
            );
            return ChangeOutcome::Stale;
        };

        let document_id = snapshot.document_id.clone();
        self.schedule_persist(snapshot);
        self.clear_provisional(state, &document_id);
        ChangeOutcome::Scheduled
    }

    pub fn on_title_change(&self, title: impl Into<String>) -> ChangeOutcome {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let buffer = match open_buffer(&mut state.slot) {
            Ok(buffer) => buffer,
            Err(reason) => return ChangeOutcome::Rejected(reason),
        };

        match buffer.set_title(title) {
            Ok(snapshot) => {
                let document_id = snapshot.document_id.clone();
                self.schedule_persist(snapshot);
                self.clear_provisional(state, &document_id);
                ChangeOutcome::Scheduled
            }
            Err(reason) => ChangeOutcome::Rejected(reason),
        }
    }

    /// Open another document.
    ///
    /// An announced change of the current document that never delivered its
    /// content is persisted from the editor's current content, and every
    /// pending save finishes before the new document is loaded. If a later
    /// switch overtakes this one, this call returns `Ok` without installing
    /// its document. On failure the previous document stays open.
    pub async fn switch_document(&self, document_id: &str) -> Result<(), SessionError> {
        let generation = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let previous = match std::mem::replace(&mut state.slot, Slot::Closed) {
                Slot::Open(buffer) if buffer.document_id == document_id => {
                    state.slot = Slot::Open(buffer);
                    return Ok(());
                }
                Slot::Loading {
                    document_id: loading,
                    previous,
                } if loading == document_id => {
                    state.slot = Slot::Loading {
                        document_id: loading,
                        previous,
                    };
                    return Ok(());
                }
                Slot::Open(mut buffer) => {
                    self.flush_pending_change(&mut buffer);
                    buffer
                }
                Slot::Loading { previous, .. } => previous,
                Slot::Closed => return Err(SessionError::Closed),
            };

            state.generation += 1;
            state.slot = Slot::Loading {
                document_id: document_id.to_string(),
                previous,
            };
            state.generation
        };

        self.inner.queue.wait_until_all_done().await;

        log::info!("Loading document {}", document_id);
        let loaded = self.load_document(document_id).await;

        let mut guard = self.inner.state.lock();
        if guard.generation != generation {
            log::info!("Load of {} was superseded, dropping it", document_id);
            return Ok(());
        }

        match loaded {
            Ok((buffer, editor_state)) => {
                guard.slot = Slot::Open(buffer);
                self.inner.editor.load(&editor_state);
                log::info!("Document {} is open for editing", document_id);
                self.emit(SessionEvent::DocumentLoaded(editor_state));
                Ok(())
            }
            Err(err) => {
                let message = error_chain(&err);
                log::warn!("{}", message);
                if let Slot::Loading { previous, .. } =
                    std::mem::replace(&mut guard.slot, Slot::Closed)
                {
                    guard.slot = Slot::Open(previous);
                }
                self.emit(SessionEvent::LoadFailed {
                    document_id: document_id.to_string(),
                    message,
                });
                Err(err)
            }
        }
    }

    /// Tear the session down. Returns once every edit, including an
    /// announced one whose content never arrived, has been persisted.
    pub async fn end_session(&self) {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if let Slot::Open(mut buffer) = std::mem::replace(&mut state.slot, Slot::Closed) {
                self.flush_pending_change(&mut buffer);
            }
            state.generation += 1;
            state.provisional = None;
        }

        self.inner.queue.wait_until_all_done().await;
        log::info!("Edit session ended");
    }

    /// Render `body` for display. Pure: session state is not touched.
    pub async fn compute_preview(
        &self,
        markup_kind: MarkupKind,
        body: &str,
    ) -> anyhow::Result<RenderOutput> {
        let resolved = self.inner.converter.resolve_resource_links(body);
        self.inner
            .converter
            .render(markup_kind, &resolved, &self.inner.render_options)
            .await
    }

    async fn load_document(&self, document_id: &str) -> Result<(EditBuffer, EditorState), SessionError> {
        let document = self
            .inner
            .store
            .load(document_id)
            .await
            .map_err(|source| SessionError::Load {
                document_id: document_id.to_string(),
                source,
            })?;

        let converter = &self.inner.converter;
        let (prefix, editable) = converter.split_preserved_prefix(document.markup_kind, &document.body);
        let resolved = converter.resolve_resource_links(&editable);
        let content = converter
            .to_editor_form(document.markup_kind, &resolved)
            .await
            .map_err(|source| SessionError::Conversion {
                document_id: document_id.to_string(),
                source,
            })?;

        let buffer = EditBuffer::loaded(&document, prefix);
        let editor_state = EditorState {
            document_id: document.id,
            title: document.title,
            markup_kind: document.markup_kind,
            content,
        };
        Ok((buffer, editor_state))
    }

    fn flush_pending_change(&self, buffer: &mut EditBuffer) {
        if buffer.pending_edit_token().is_none() {
            return;
        }
        let current = self.inner.editor.current_content();
        if let Some(snapshot) = buffer.take_pending_flush(current) {
            log::info!(
                "Persisting announced change of {} before leaving it",
                snapshot.document_id
            );
            self.schedule_persist(snapshot);
        }
    }

    fn schedule_persist(&self, snapshot: PersistSnapshot) {
        log::debug!(
            "Scheduling save of {} (body: {})",
            snapshot.document_id,
            snapshot.content.is_some()
        );
        let store = self.inner.store.clone();
        let converter = self.inner.converter.clone();
        self.inner.queue.push(async move {
            persist(store.as_ref(), converter.as_ref(), snapshot)
                .await
                .map_err(anyhow::Error::from)
        });
    }

    fn clear_provisional(&self, state: &mut SessionState, document_id: &str) {
        if state.provisional.as_deref() == Some(document_id) {
            state.provisional = None;
            log::debug!("Document {} is no longer provisional", document_id);
            self.emit(SessionEvent::ProvisionalCleared {
                document_id: document_id.to_string(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.inner.events.send(event);
    }
}

fn open_buffer(slot: &mut Slot) -> Result<&mut EditBuffer, RejectReason> {
    match slot {
        Slot::Open(buffer) if buffer.has_document() => Ok(buffer),
        Slot::Open(_) => Err(RejectReason::NoDocument),
        Slot::Loading { .. } => Err(RejectReason::Loading),
        Slot::Closed => Err(RejectReason::Closed),
    }
}

/// Convert a snapshot to storage form and write it. Reads nothing but the
/// snapshot, so later buffer edits cannot leak into it.
async fn persist(
    store: &dyn DocumentStore,
    converter: &dyn Converter,
    snapshot: PersistSnapshot,
) -> Result<(), SessionError> {
    let PersistSnapshot {
        document_id,
        title,
        markup_kind,
        content,
        preserved_prefix,
    } = snapshot;

    let body = match content {
        Some(content) => {
            let stored = converter
                .to_storage_form(markup_kind, &content)
                .await
                .map_err(|source| SessionError::Conversion {
                    document_id: document_id.clone(),
                    source,
                })?;
            let stored = converter.unresolve_resource_links(&stored);
            Some(converter.attach_preserved_prefix(markup_kind, &preserved_prefix, &stored))
        }
        None => None,
    };

    log::debug!("Saving document {}", document_id);
    store
        .save(DocumentUpdate {
            id: document_id.clone(),
            title,
            markup_kind,
            body,
        })
        .await
        .map_err(|source| SessionError::Save {
            document_id: document_id.clone(),
            source,
        })?;
    log::debug!("Saved document {}", document_id);
    Ok(())
}
