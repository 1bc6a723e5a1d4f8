// Display records derived from decoded ranges and the snapshot's text runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::document::TextRunElement;
use crate::extract::{extract, extract_plain, ExtractedText};
use crate::schema::HighlightSpan;
use crate::types::{CharRange, HighlightMeta, IndexedRange, LanguageStats};

/// One comment as shown next to its passage.
///
/// Exactly one of `en`/`he` carries the texts; the other is empty and goes
/// over the wire as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(serialize_with = "texts_or_empty", deserialize_with = "texts_from_wire")]
    pub en: Vec<String>,
    #[serde(serialize_with = "texts_or_empty", deserialize_with = "texts_from_wire")]
    pub he: Vec<String>,
    #[serde(rename = "ref")]
    pub id: String,
}

impl AnnotationRecord {
    /// Build the record for the `index`-th range of `reference`.
    ///
    /// A joined range's first two pieces are the selected text and the
    /// comment body; they are shown as one `"<selected> - <comment>"` line.
    pub fn from_pieces(
        reference: &str,
        index: usize,
        joined: bool,
        pieces: Vec<ExtractedText>,
    ) -> Self {
        let stats: LanguageStats = pieces.iter().map(|piece| piece.language_stats).sum();
        let mut texts: Vec<String> = pieces.into_iter().map(|piece| piece.text).collect();

        if joined && texts.len() > 1 {
            let rest = texts.split_off(2);
            let combined = texts.join(" - ");
            texts = std::iter::once(combined).chain(rest).collect();
        }

        let id = format!("{reference}-personal{index}");
        let (en, he) = if stats.english > stats.hebrew {
            (texts, Vec::new())
        } else {
            (Vec::new(), texts)
        };
        Self { en, he, id }
    }

    /// Texts in whichever language field is populated.
    pub fn texts(&self) -> &[String] {
        if self.en.is_empty() {
            &self.he
        } else {
            &self.en
        }
    }
}

fn texts_or_empty<S: Serializer>(texts: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    if texts.is_empty() {
        serializer.serialize_str("")
    } else {
        texts.serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTexts {
    Texts(Vec<String>),
    Empty(String),
}

fn texts_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match WireTexts::deserialize(deserializer)? {
        WireTexts::Texts(texts) => texts,
        WireTexts::Empty(_) => Vec::new(),
    })
}

/// Records for every range of one reference, in range order.
pub fn annotation_records(
    reference: &str,
    ranges: &[IndexedRange],
    runs: &[TextRunElement],
) -> Vec<AnnotationRecord> {
    ranges
        .iter()
        .enumerate()
        .map(|(index, range)| {
            let pieces = extract(range.range, runs);
            AnnotationRecord::from_pieces(reference, index, range.joined, pieces)
        })
        .collect()
}

/// A highlighted passage range with its stored position metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRecord {
    pub range: CharRange,
    pub text: String,
    pub highlight: bool,
    #[serde(flatten)]
    pub meta: HighlightMeta,
}

pub fn highlight_records(spans: &[HighlightSpan], runs: &[TextRunElement]) -> Vec<HighlightRecord> {
    spans
        .iter()
        .map(|span| HighlightRecord {
            range: span.range,
            text: extract_plain(span.range, runs),
            highlight: true,
            meta: span.meta,
        })
        .collect()
}
