// Optimistic record of annotations that have not been confirmed saved.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use marginalia_common::types::{NewComment, NewHighlight};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAnnotation {
    Comment(NewComment),
    Highlight(NewHighlight),
}

impl PendingAnnotation {
    pub fn reference(&self) -> &str {
        match self {
            Self::Comment(comment) => &comment.reference,
            Self::Highlight(highlight) => &highlight.reference,
        }
    }

    /// Word used in user-visible messages.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Comment(_) => "comment",
            Self::Highlight(_) => "highlight",
        }
    }
}

impl From<NewComment> for PendingAnnotation {
    fn from(comment: NewComment) -> Self {
        Self::Comment(comment)
    }
}

impl From<NewHighlight> for PendingAnnotation {
    fn from(highlight: NewHighlight) -> Self {
        Self::Highlight(highlight)
    }
}

/// Where pending annotations are kept until the document confirms them.
pub trait PendingStore: Send + Sync + 'static {
    /// Remember `annotation` and return its local id.
    fn record_pending(&self, annotation: &PendingAnnotation) -> String;
    fn mark_saved(&self, id: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub id: String,
    pub annotation: PendingAnnotation,
    pub created_at: DateTime<Utc>,
}

/// Process-local pending store.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    entries: Mutex<Vec<PendingEntry>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries not yet marked saved, oldest first.
    pub fn unsaved(&self) -> Vec<PendingEntry> {
        self.lock_entries().clone()
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PendingStore for MemoryPendingStore {
    fn record_pending(&self, annotation: &PendingAnnotation) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock_entries().push(PendingEntry {
            id: id.clone(),
            annotation: annotation.clone(),
            created_at: Utc::now(),
        });
        id
    }

    fn mark_saved(&self, id: &str) {
        self.lock_entries().retain(|entry| entry.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment() -> NewComment {
        NewComment {
            text: "note".into(),
            selected_text: "text".into(),
            section: "2a".into(),
            reference: "Pesachim 2a.1".into(),
            ordering_ref: "Pesachim 2a.1".into(),
        }
    }

    #[test]
    fn recorded_until_marked_saved() {
        let store = MemoryPendingStore::new();
        let first = store.record_pending(&comment().into());
        let second = store.record_pending(&comment().into());
        assert_ne!(first, second);
        assert_eq!(store.unsaved().len(), 2);

        store.mark_saved(&first);
        let unsaved = store.unsaved();
        assert_eq!(unsaved.len(), 1);
        assert_eq!(unsaved[0].id, second);
    }

    #[test]
    fn marking_unknown_id_is_a_no_op() {
        let store = MemoryPendingStore::new();
        store.record_pending(&comment().into());
        store.mark_saved("nope");
        assert_eq!(store.unsaved().len(), 1);
    }

    #[test]
    fn entries_serialize_with_kind_tag() {
        let json = serde_json::to_value(PendingAnnotation::from(comment())).unwrap();
        assert_eq!(json["kind"], "comment");
        assert_eq!(json["reference"], "Pesachim 2a.1");
    }
}
