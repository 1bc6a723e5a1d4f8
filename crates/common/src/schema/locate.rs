// Insert-location resolution: where a new annotation goes in the document.
//
// Annotations are grouped under the ordering reference they were made on,
// and groups appear in reference order rather than insertion order. A new
// annotation is appended to its group when the group exists; otherwise it
// goes right after the nearest preceding group that does.

use crate::document::Document;
use crate::order::compare_refs;

use super::{SpanName, INSTRUCTIONS_RANGE_NAME};

/// Offset at which to insert content for `ordering_ref`.
///
/// Reads snapshot state synchronously; callers must serialize writes so the
/// offset is applied against the revision it was computed from.
pub fn locate(doc: &Document, ordering_ref: &str) -> u32 {
    if doc.named_ranges.is_empty() {
        return doc.document_end();
    }

    let mut target = ordering_ref.to_string();
    loop {
        let anchor = SpanName::ParentRef { reference: &target }.to_name();
        let last = doc.ranges_named(&anchor).into_iter().max();
        if let Some(end) = last.map(|range| range.end) {
            return end;
        }

        match preceding_group(doc, &target) {
            Some(previous) => target = previous,
            None => break,
        }
    }

    doc.first_range_named(INSTRUCTIONS_RANGE_NAME)
        .map(|range| range.end)
        .unwrap_or(1)
}

/// The materialized ordering reference sorting immediately before `reference`.
fn preceding_group(doc: &Document, reference: &str) -> Option<String> {
    doc.named_ranges
        .keys()
        .filter_map(|name| match SpanName::parse(name) {
            SpanName::ParentRef { reference } => Some(reference),
            _ => None,
        })
        .filter(|materialized| compare_refs(materialized, reference).is_lt())
        .max_by(|a, b| compare_refs(a, b))
        .map(str::to_string)
}
