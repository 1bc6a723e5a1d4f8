// Named-range schema: how annotations are persisted as named spans.
//
// Every annotation lives in the backing document as text plus a handful of
// named ranges whose names carry the annotation's identity. `SpanName`
// is the single place that knows the string forms; `RangeIndex::decode`
// turns a snapshot's names back into per-reference range lists.

pub mod encode;
pub mod locate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Document;
use crate::types::{CharRange, HighlightMeta, IndexedRange};

/// Joins the parts of per-annotation range names.
pub const NAME_SEPARATOR: &str = "<<||>>";
/// Marks the instructional block written into new documents.
pub const INSTRUCTIONS_RANGE_NAME: &str = "Instructions Table";

const LEGACY_PREFIX: &str = "ref:";
const HEADER_PREFIX: &str = "header:";
const PARENT_REF_PREFIX: &str = "parentRef:";
const ORDERING_REF_PREFIX: &str = "orderingRef:";
const FULL_COMMENT_PREFIX: &str = "fullComment:";
const FULL_HIGHLIGHT_PREFIX: &str = "fullHighlight:";
const SELECTED_TEXT_TAG: &str = "selected text";
const COMMENT_TAG: &str = "comment";
const HIGHLIGHT_TAG: &str = "highlight";

// ── Span names ──────────────────────────────────────────────────────

/// A parsed named-range name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanName<'a> {
    /// `ref:<R>`, the pre-separator format covering a whole annotation.
    Legacy { reference: &'a str },
    SelectedText { id: &'a str, reference: &'a str },
    CommentBody { id: &'a str, reference: &'a str },
    Highlight {
        id: &'a str,
        reference: &'a str,
        meta: &'a str,
    },
    Header { section: &'a str },
    ParentRef { reference: &'a str },
    OrderingRef { reference: &'a str },
    FullComment { id: &'a str },
    FullHighlight { id: &'a str },
    Instructions,
    Unknown,
}

impl<'a> SpanName<'a> {
    pub fn parse(name: &'a str) -> Self {
        if name == INSTRUCTIONS_RANGE_NAME {
            return Self::Instructions;
        }
        if let Some(reference) = name.strip_prefix(LEGACY_PREFIX) {
            return Self::Legacy { reference };
        }
        if let Some(section) = name.strip_prefix(HEADER_PREFIX) {
            return Self::Header { section };
        }
        if let Some(reference) = name.strip_prefix(PARENT_REF_PREFIX) {
            return Self::ParentRef { reference };
        }
        if let Some(reference) = name.strip_prefix(ORDERING_REF_PREFIX) {
            return Self::OrderingRef { reference };
        }
        if let Some(id) = name.strip_prefix(FULL_COMMENT_PREFIX) {
            return Self::FullComment { id };
        }
        if let Some(id) = name.strip_prefix(FULL_HIGHLIGHT_PREFIX) {
            return Self::FullHighlight { id };
        }

        let parts: Vec<&'a str> = name.split(NAME_SEPARATOR).collect();
        match *parts.as_slice() {
            [id, reference, .., tag] if tag == COMMENT_TAG => Self::CommentBody { id, reference },
            [id, reference, tag] if tag == SELECTED_TEXT_TAG => {
                Self::SelectedText { id, reference }
            }
            [id, reference, tag, meta] if tag == HIGHLIGHT_TAG => Self::Highlight {
                id,
                reference,
                meta,
            },
            _ => Self::Unknown,
        }
    }

    pub fn to_name(&self) -> String {
        match *self {
            Self::Legacy { reference } => format!("{LEGACY_PREFIX}{reference}"),
            Self::SelectedText { id, reference } => join_parts(&[id, reference, SELECTED_TEXT_TAG]),
            Self::CommentBody { id, reference } => join_parts(&[id, reference, COMMENT_TAG]),
            Self::Highlight {
                id,
                reference,
                meta,
            } => join_parts(&[id, reference, HIGHLIGHT_TAG, meta]),
            Self::Header { section } => format!("{HEADER_PREFIX}{section}"),
            Self::ParentRef { reference } => format!("{PARENT_REF_PREFIX}{reference}"),
            Self::OrderingRef { reference } => format!("{ORDERING_REF_PREFIX}{reference}"),
            Self::FullComment { id } => format!("{FULL_COMMENT_PREFIX}{id}"),
            Self::FullHighlight { id } => format!("{FULL_HIGHLIGHT_PREFIX}{id}"),
            Self::Instructions => INSTRUCTIONS_RANGE_NAME.to_string(),
            Self::Unknown => String::new(),
        }
    }
}

fn join_parts(parts: &[&str]) -> String {
    parts.join(NAME_SEPARATOR)
}

// ── Range index ─────────────────────────────────────────────────────

/// A highlight span as stored, before its text is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub range: CharRange,
    pub meta: HighlightMeta,
}

/// Per-reference ranges decoded from a snapshot's named ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeIndex {
    pub comments: BTreeMap<String, Vec<IndexedRange>>,
    pub highlights: BTreeMap<String, Vec<HighlightSpan>>,
}

impl RangeIndex {
    /// Decode every annotation span in `doc`.
    ///
    /// Legacy `ref:` spans contribute all their ranges. A comment-body span
    /// is joined with its selected-text sibling when one exists. Lists are
    /// sorted by range afterwards, so name storage order never matters.
    /// Legacy and current spans for the same reference are kept side by
    /// side without deduplication.
    pub fn decode(doc: &Document) -> Self {
        let mut index = Self::default();

        for (name, group) in &doc.named_ranges {
            match SpanName::parse(name) {
                SpanName::Legacy { reference } => {
                    let ranges = group
                        .named_ranges
                        .iter()
                        .flat_map(|nr| nr.ranges.iter().copied())
                        .map(IndexedRange::plain);
                    index
                        .comments
                        .entry(reference.to_string())
                        .or_default()
                        .extend(ranges);
                }
                SpanName::CommentBody { id, reference } => {
                    let Some(comment) = doc.first_range_named(name) else {
                        debug!(name = %name, "comment span without ranges");
                        continue;
                    };
                    let selected_name = SpanName::SelectedText { id, reference }.to_name();
                    let entry = match doc.first_range_named(&selected_name) {
                        Some(selected) => {
                            IndexedRange::joined(CharRange::new(selected.start, comment.end))
                        }
                        None => IndexedRange::plain(comment),
                    };
                    index
                        .comments
                        .entry(reference.to_string())
                        .or_default()
                        .push(entry);
                }
                SpanName::Highlight { reference, meta, .. } => {
                    let Some(range) = doc.first_range_named(name) else {
                        continue;
                    };
                    let meta = match serde_json::from_str::<HighlightMeta>(meta) {
                        Ok(meta) => meta,
                        Err(error) => {
                            debug!(name = %name, %error, "unreadable highlight metadata");
                            HighlightMeta::default()
                        }
                    };
                    index
                        .highlights
                        .entry(reference.to_string())
                        .or_default()
                        .push(HighlightSpan { range, meta });
                }
                _ => {}
            }
        }

        for ranges in index.comments.values_mut() {
            ranges.sort_by(|a, b| a.range.cmp(&b.range));
        }
        for spans in index.highlights.values_mut() {
            spans.sort_by(|a, b| a.range.cmp(&b.range));
        }

        index
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.highlights.is_empty()
    }
}
