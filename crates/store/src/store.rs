// Annotation store: the current snapshot of the backing document, the
// records derived from it, and the write path into it.
//
// Write path:
//   pending store → readiness gate → encode against current snapshot
//   → apply with revision check → refresh (always) → mark saved
//
// A stale revision means the document moved after the snapshot the write
// was encoded against. The write is rebuilt against a fresh snapshot, up to
// `max_stale_retries` times. A write counts as saved once its batch is
// accepted; a refresh failing after that is reported under the fetch key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use marginalia_common::document::{Document, TextRunElement};
use marginalia_common::record::{
    annotation_records, highlight_records, AnnotationRecord, HighlightRecord,
};
use marginalia_common::schema::encode::{
    encode_comment, encode_highlight, has_instructions, instructions_requests,
};
use marginalia_common::schema::RangeIndex;
use marginalia_common::types::{NewComment, NewHighlight};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::gate::ReadinessGate;
use crate::pending::{PendingAnnotation, PendingStore};
use crate::retry::{with_backoff, ErrorRegistry, ErrorSink, ErrorState, Operation, Retrying};
use crate::transport::{DocumentTransport, TransportError};

// ── Error keys ──────────────────────────────────────────────────────

pub const KEY_INIT: &str = "init";
pub const KEY_FIND: &str = "find database";
pub const KEY_CREATE: &str = "create database";
pub const KEY_CONFIGURE: &str = "configure database";
pub const KEY_FETCH: &str = "fetch database";
pub const KEY_TOO_MANY: &str = "too many docs";

/// Error key for writes on `reference`.
pub fn save_key(reference: &str) -> String {
    format!("save:{reference}")
}

// ── State ───────────────────────────────────────────────────────────

/// Everything derived from one fetched revision. Replaced, never mutated.
#[derive(Clone, Default)]
struct Snapshot {
    document: Option<Arc<Document>>,
    index: Arc<RangeIndex>,
    runs: Arc<Vec<TextRunElement>>,
    generation: u64,
}

#[derive(Default)]
struct RecordCache {
    /// Snapshot generation the cached records were computed from.
    generation: u64,
    records: HashMap<String, Arc<Vec<AnnotationRecord>>>,
}

struct StoreInner<T, P> {
    config: StoreConfig,
    transport: T,
    pending: P,
    errors: Arc<ErrorRegistry>,
    retrying: Retrying<ErrorRegistry>,
    gate: ReadinessGate,
    snapshot: RwLock<Snapshot>,
    cache: Mutex<RecordCache>,
    should_create: AtomicBool,
    /// A document this store created whose setup has not completed yet.
    awaiting_setup: Mutex<Option<String>>,
    signed_in: watch::Sender<bool>,
    refreshed: watch::Sender<u64>,
}

/// Point-in-time summary for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub signed_in: bool,
    pub ready: bool,
    pub should_create: bool,
    pub document_id: Option<String>,
    pub title: Option<String>,
    pub revision_id: Option<String>,
    pub commented_refs: usize,
    pub highlighted_refs: usize,
    /// Writes parked until the backing document is ready.
    pub queued_writes: usize,
    pub errors: ErrorState,
}

/// Cheaply clonable handle over the shared store state.
pub struct AnnotationStore<T, P> {
    inner: Arc<StoreInner<T, P>>,
}

impl<T, P> Clone for AnnotationStore<T, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DocumentTransport, P: PendingStore> AnnotationStore<T, P> {
    pub fn new(config: StoreConfig, transport: T, pending: P) -> Self {
        let errors = Arc::new(ErrorRegistry::new());
        let (signed_in, _) = watch::channel(false);
        let (refreshed, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                config,
                transport,
                pending,
                retrying: Retrying::new(Arc::clone(&errors)),
                errors,
                gate: ReadinessGate::new(),
                snapshot: RwLock::new(Snapshot::default()),
                cache: Mutex::new(RecordCache::default()),
                should_create: AtomicBool::new(false),
                awaiting_setup: Mutex::new(None),
                signed_in,
                refreshed,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn pending(&self) -> &P {
        &self.inner.pending
    }

    // ── Observation ─────────────────────────────────────────────────

    pub fn subscribe_signed_in(&self) -> watch::Receiver<bool> {
        self.inner.signed_in.subscribe()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<ErrorState> {
        self.inner.errors.subscribe()
    }

    /// Bumped every time the snapshot is replaced.
    pub fn subscribe_refreshed(&self) -> watch::Receiver<u64> {
        self.inner.refreshed.subscribe()
    }

    pub fn errors(&self) -> ErrorState {
        self.inner.errors.current()
    }

    /// Whether sign-in found no backing document and the next write must create one.
    pub fn should_create(&self) -> bool {
        self.inner.should_create.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Option<Arc<Document>> {
        self.read_snapshot().document.clone()
    }

    pub fn status(&self) -> StoreStatus {
        let snapshot = self.read_snapshot().clone();
        let document = snapshot.document.as_deref();
        StoreStatus {
            signed_in: *self.inner.signed_in.borrow(),
            ready: self.inner.gate.is_ready(),
            should_create: self.should_create(),
            document_id: document.map(|d| d.document_id.clone()),
            title: document.map(|d| d.title.clone()),
            revision_id: document.and_then(|d| d.revision_id.clone()),
            commented_refs: snapshot.index.comments.len(),
            highlighted_refs: snapshot.index.highlights.len(),
            queued_writes: self.inner.gate.queued(),
            errors: self.errors(),
        }
    }

    // ── Sign-in and the backing document ────────────────────────────

    /// Ask the transport whether credentials work and act on the answer.
    pub async fn init(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        let operation = Operation::new(KEY_INIT, "Error initializing drive database");
        let signed_in = inner
            .retrying
            .run(operation, || inner.transport.signed_in())
            .await?;
        self.set_signed_in(signed_in).await
    }

    /// Signing in looks for the backing document; signing out drops all state.
    pub async fn set_signed_in(&self, signed_in: bool) -> Result<(), StoreError> {
        info!(signed_in, "sign-in state changed");
        self.inner.signed_in.send_replace(signed_in);
        if signed_in {
            self.locate_backing_document().await
        } else {
            self.reset_state();
            Ok(())
        }
    }

    pub async fn locate_backing_document(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        let property = inner.config.database_property();
        let operation = Operation::new(KEY_FIND, "Can't find the notes document");
        let files = inner
            .retrying
            .run(operation, || inner.transport.search_by_property(&property))
            .await?;

        match files.as_slice() {
            [] => {
                info!(%property, "no backing document yet, next write creates one");
                self.inner.should_create.store(true, Ordering::SeqCst);
                Ok(())
            }
            [file] => {
                self.load_document(&file.id).await?;
                self.inner.gate.declare_ready().await;
                Ok(())
            }
            files => {
                let found = files.len();
                warn!(%property, found, "several documents claim the same collection");
                self.inner.errors.register(KEY_TOO_MANY, "Too many docs");
                self.inner.errors.flush();
                Err(StoreError::TooManyDocuments(files.len()))
            }
        }
    }

    pub async fn create_backing_document(&self) -> Result<(), StoreError> {
        self.inner.should_create.store(false, Ordering::SeqCst);
        let inner = &self.inner;
        let title = inner.config.document_title();
        let operation = Operation::new(KEY_CREATE, "Error creating database file");
        let created = inner
            .retrying
            .run(operation, || inner.transport.create_document(&title))
            .await;
        let file = match created {
            Ok(file) => file,
            Err(error) => {
                // Nothing exists yet, so the next write may try again.
                self.inner.should_create.store(true, Ordering::SeqCst);
                return Err(error.into());
            }
        };

        info!(document = %file.id, %title, "backing document created");
        *self.lock_awaiting_setup() = Some(file.id.clone());
        self.finish_setup(&file.id).await
    }

    /// Load a created document, write its instructions and tag it, then
    /// open the gate. Each step may be repeated after a partial failure.
    async fn finish_setup(&self, id: &str) -> Result<(), StoreError> {
        self.load_document(id).await?;
        self.add_instructions().await?;

        let inner = &self.inner;
        let property = inner.config.database_property();
        let operation = Operation::new(KEY_CONFIGURE, "Error configuring database file (1y94r)");
        inner
            .retrying
            .run(operation, || inner.transport.set_property(id, &property))
            .await?;

        self.lock_awaiting_setup().take();
        debug!(document = %id, "backing document configured");
        self.inner.gate.declare_ready().await;
        Ok(())
    }

    async fn add_instructions(&self) -> Result<(), StoreError> {
        let document = self.current_document()?;
        if has_instructions(&document) {
            return Ok(());
        }
        let inner = &self.inner;
        let requests = instructions_requests(&inner.config.instructions());
        let (id, revision) = (&document.document_id, document.revision_id.as_deref());
        let apply = || inner.transport.apply_mutations(id, revision, &requests);
        let operation = Operation::new(KEY_CONFIGURE, "Error configuring database file (28zd3)");
        inner.retrying.run(operation, apply).await?;
        self.refresh().await
    }

    /// Re-fetch the backing document and replace everything derived from it.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let document = self.current_document()?;
        self.load_document(&document.document_id).await
    }

    async fn load_document(&self, id: &str) -> Result<(), StoreError> {
        let inner = &self.inner;
        let fetch = || {
            with_backoff(&inner.config.backoff, TransportError::is_transient, || {
                inner.transport.fetch_document(id)
            })
        };
        let operation = Operation::new(KEY_FETCH, "Could not find database file");
        let document = inner.retrying.run(operation, fetch).await?;
        self.install(document);
        Ok(())
    }

    fn install(&self, document: Document) {
        let index = RangeIndex::decode(&document);
        let runs = document.body.text_runs();
        let (comment_refs, highlight_refs) = (index.comments.len(), index.highlights.len());
        let revision = document.revision_id.clone();

        let generation = {
            let mut snapshot = self.write_snapshot();
            let generation = snapshot.generation + 1;
            *snapshot = Snapshot {
                document: Some(Arc::new(document)),
                index: Arc::new(index),
                runs: Arc::new(runs),
                generation,
            };
            generation
        };
        self.reset_cache(generation);
        debug!(generation, ?revision, comment_refs, highlight_refs, "snapshot replaced");
        self.inner.refreshed.send_replace(generation);
    }

    fn reset_state(&self) {
        self.inner.errors.reset();
        self.inner.gate.reset();
        self.inner.should_create.store(false, Ordering::SeqCst);
        self.lock_awaiting_setup().take();
        let generation = {
            let mut snapshot = self.write_snapshot();
            let generation = snapshot.generation + 1;
            *snapshot = Snapshot {
                generation,
                ..Snapshot::default()
            };
            generation
        };
        self.reset_cache(generation);
        self.inner.refreshed.send_replace(generation);
        info!("store state reset");
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Comment records for `reference`, or `None` when it has no comments.
    ///
    /// Memoized per reference until the next snapshot replacement.
    pub fn records_for(&self, reference: &str) -> Option<Arc<Vec<AnnotationRecord>>> {
        let snapshot = self.read_snapshot().clone();
        let ranges = snapshot.index.comments.get(reference)?;

        {
            let cache = self.lock_cache();
            if cache.generation == snapshot.generation {
                if let Some(records) = cache.records.get(reference) {
                    return Some(Arc::clone(records));
                }
            }
        }

        let records = Arc::new(annotation_records(reference, ranges, &snapshot.runs));
        let mut cache = self.lock_cache();
        // A refresh may have landed while computing; never cache across generations.
        if cache.generation == snapshot.generation {
            let key = reference.to_string();
            cache.records.insert(key, Arc::clone(&records));
        }
        Some(records)
    }

    pub fn highlights_for(&self, reference: &str) -> Option<Vec<HighlightRecord>> {
        let snapshot = self.read_snapshot().clone();
        let spans = snapshot.index.highlights.get(reference)?;
        Some(highlight_records(spans, &snapshot.runs))
    }

    // ── Writes ──────────────────────────────────────────────────────

    pub async fn submit(&self, comment: NewComment) -> Result<(), StoreError> {
        self.submit_annotation(comment.into()).await
    }

    pub async fn submit_highlight(&self, highlight: NewHighlight) -> Result<(), StoreError> {
        self.submit_annotation(highlight.into()).await
    }

    /// Re-run a write the user chose to retry. A repeated failure is not
    /// announced again; the original error stays until a write succeeds.
    pub async fn retry(
        &self,
        local_id: &str,
        annotation: impl Into<PendingAnnotation>,
    ) -> Result<(), StoreError> {
        self.create_if_needed().await?;
        self.save(local_id, annotation.into(), true).await
    }

    async fn submit_annotation(&self, annotation: PendingAnnotation) -> Result<(), StoreError> {
        let local_id = self.inner.pending.record_pending(&annotation);
        let (reference, noun) = (annotation.reference(), annotation.noun());
        debug!(%local_id, reference, "recorded pending {noun}");
        self.create_if_needed().await?;
        self.save(&local_id, annotation, false).await
    }

    async fn create_if_needed(&self) -> Result<(), StoreError> {
        if self.inner.should_create.swap(false, Ordering::SeqCst) {
            return self.create_backing_document().await;
        }
        let unfinished = self.lock_awaiting_setup().clone();
        match unfinished {
            Some(id) => {
                info!(document = %id, "resuming setup of the backing document");
                self.finish_setup(&id).await
            }
            None => Ok(()),
        }
    }

    async fn save(
        &self,
        local_id: &str,
        annotation: PendingAnnotation,
        is_retry: bool,
    ) -> Result<(), StoreError> {
        let reference = annotation.reference().to_string();
        let key = save_key(&reference);
        let operation = if is_retry {
            Operation::quiet(key)
        } else {
            let noun = annotation.noun();
            Operation::new(key, format!("Could not save {noun} on {reference}"))
        };

        let inner = &self.inner;
        inner
            .gate
            .run(|| inner.retrying.run(operation, || self.write(&annotation)))
            .await??;

        self.inner.pending.mark_saved(local_id);
        info!(%local_id, %reference, "{} saved", annotation.noun());
        Ok(())
    }

    async fn write(&self, annotation: &PendingAnnotation) -> Result<(), StoreError> {
        let max_stale_retries = self.inner.config.max_stale_retries;
        let reference = annotation.reference();
        let mut stale_retries = 0;
        loop {
            let document = self.current_document()?;
            let id = Uuid::new_v4();
            let requests = match annotation {
                PendingAnnotation::Comment(comment) => encode_comment(&document, comment, id),
                PendingAnnotation::Highlight(highlight) => {
                    encode_highlight(&document, highlight, id)
                }
            };

            let revision = document.revision_id.as_deref();
            let applied = self
                .inner
                .transport
                .apply_mutations(&document.document_id, revision, &requests)
                .await;
            let refreshed = self.refresh().await;

            match applied {
                Ok(()) => {
                    // The batch landed. A failed refresh stays registered under
                    // its own key and the next refresh shows the write.
                    if let Err(error) = refreshed {
                        warn!(%error, reference, "write applied but refresh failed");
                    }
                    return Ok(());
                }
                Err(TransportError::StaleRevision) if stale_retries < max_stale_retries => {
                    stale_retries += 1;
                    info!(attempt = stale_retries, reference, "revision moved");
                    refreshed?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn current_document(&self) -> Result<Arc<Document>, StoreError> {
        self.document().ok_or(StoreError::NoBackingDocument)
    }

    fn read_snapshot(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshot(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_awaiting_setup(&self) -> MutexGuard<'_, Option<String>> {
        self.inner
            .awaiting_setup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, RecordCache> {
        self.inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_cache(&self, generation: u64) {
        let mut cache = self.lock_cache();
        cache.generation = generation;
        cache.records.clear();
    }
}
