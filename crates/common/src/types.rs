// Core domain types shared across all Marginalia crates.

use serde::{Deserialize, Serialize};

/// Half-open offsets into a document's flat character stream.
///
/// Offsets are UTF-16 code units, the unit the document service indexes
/// by. Field order matters: the derived `Ord` sorts by start, then end.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CharRange {
    #[serde(rename = "startIndex", default)]
    pub start: u32,
    #[serde(rename = "endIndex", default)]
    pub end: u32,
}

impl CharRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A range in the per-reference comment index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IndexedRange {
    pub range: CharRange,
    /// Selected-text span immediately followed by its comment-body span.
    pub joined: bool,
}

impl IndexedRange {
    pub fn plain(range: CharRange) -> Self {
        Self {
            range,
            joined: false,
        }
    }

    pub fn joined(range: CharRange) -> Self {
        Self {
            range,
            joined: true,
        }
    }
}

/// A comment the user wants to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Comment body as typed by the user.
    pub text: String,
    /// Passage text the comment was made on.
    pub selected_text: String,
    /// Section heading the comment is filed under (e.g. `"22a"`).
    pub section: String,
    /// Passage reference the comment is attached to.
    pub reference: String,
    /// Coarser reference used to keep the document in reading order.
    pub ordering_ref: String,
}

/// A highlighted passage range the user wants to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHighlight {
    pub text: String,
    pub section: String,
    pub reference: String,
    pub ordering_ref: String,
    pub meta: HighlightMeta,
}

/// Position of a highlight within its passage, stored alongside the span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightMeta {
    pub start_percentage: f64,
    pub end_percentage: f64,
    pub is_english: bool,
    pub word_count_start: u32,
    pub word_count_end: u32,
}

/// Letter counts per script, used to pick a record's display language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub hebrew: u32,
    pub english: u32,
}

impl std::ops::Add for LanguageStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            hebrew: self.hebrew + other.hebrew,
            english: self.english + other.english,
        }
    }
}

impl std::iter::Sum for LanguageStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, stats| acc + stats)
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Substring of `text` between UTF-16 offsets, clamped to the text.
///
/// Returns an empty string when `start >= end` after clamping.
pub fn utf16_slice(text: &str, start: u32, end: u32) -> String {
    let units: Vec<u16> = text.encode_utf16().collect();
    let len = units.len();
    let start = (start as usize).min(len);
    let end = (end as usize).min(len);
    if start >= end {
        return String::new();
    }
    String::from_utf16_lossy(&units[start..end])
}
