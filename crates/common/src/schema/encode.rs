// Encoding annotations into batch mutation requests.

use uuid::Uuid;

use crate::document::request::{
    create_named_range, insert_formatted_text, insert_table, CellSpec, RgbColor, Request, Segment,
    TableCellStyle, TableSpec,
};
use crate::document::Document;
use crate::types::{utf16_len, CharRange, HighlightMeta, NewComment, NewHighlight};

use super::{locate::locate, SpanName, INSTRUCTIONS_RANGE_NAME};

const SECTION_HEADING_STYLE: &str = "HEADING_2";
const DATABASE_NOTE: &str =
    " and is used as a database for personalized comments that you create.";

/// Text and links written into a freshly created backing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    pub app_name: String,
    pub app_url: String,
    pub caveats_url: String,
}

/// Requests for the instructional block at the top of a new document.
pub fn instructions_requests(instructions: &Instructions) -> Vec<Request> {
    insert_table(TableSpec {
        table_start: 1,
        cells: vec![CellSpec::new(vec![
            Segment::plain("This document was created with "),
            Segment::link(instructions.app_name.clone(), instructions.app_url.clone()),
            Segment::plain(DATABASE_NOTE),
            Segment::plain("\n\n"),
            Segment::plain("Before making any edits, it's recommended to read "),
            Segment::link("these instructions", instructions.caveats_url.clone()),
            Segment::plain("."),
        ])],
        range_names: vec![SpanName::Instructions.to_name()],
        cell_style: Some(TableCellStyle::new(
            RgbColor::from_rgb8(251, 229, 163),
            RgbColor::from_rgb8(184, 145, 48),
        )),
    })
    .requests
}

/// Requests that insert `comment` under its section in reading order.
///
/// `id` must be fresh for every attempt; reusing a local pending id would
/// let a duplicated retry collide with the original spans.
pub fn encode_comment(doc: &Document, comment: &NewComment, id: Uuid) -> Vec<Request> {
    let id = id.to_string();
    let reference = comment.reference.as_str();

    let mut cells = Vec::with_capacity(3);
    if comment.reference != comment.ordering_ref {
        cells.push(CellSpec::new(vec![Segment::plain(reference)]));
    }
    cells.push(
        CellSpec::new(vec![Segment::bold(comment.selected_text.clone())])
            .rtl()
            .named(SpanName::SelectedText { id: &id, reference }.to_name()),
    );
    cells.push(
        CellSpec::new(vec![Segment::plain(comment.text.clone())])
            .named(SpanName::CommentBody { id: &id, reference }.to_name()),
    );

    let marker = SpanName::FullComment { id: &id };
    encode_block(doc, &comment.section, &comment.ordering_ref, cells, marker)
}

/// Requests that insert a highlighted passage, keeping its position metadata.
pub fn encode_highlight(doc: &Document, highlight: &NewHighlight, id: Uuid) -> Vec<Request> {
    let id = id.to_string();
    let meta = highlight_meta_json(&highlight.meta);
    let span = SpanName::Highlight {
        id: &id,
        reference: &highlight.reference,
        meta: &meta,
    };
    let segments = vec![Segment::plain(highlight.text.clone())];
    let cells = vec![CellSpec::new(segments).rtl().named(span.to_name())];

    let marker = SpanName::FullHighlight { id: &id };
    encode_block(
        doc,
        &highlight.section,
        &highlight.ordering_ref,
        cells,
        marker,
    )
}

fn highlight_meta_json(meta: &HighlightMeta) -> String {
    serde_json::to_string(meta).unwrap_or_else(|_| "{}".into())
}

fn encode_block(
    doc: &Document,
    section: &str,
    anchor: &str,
    cells: Vec<CellSpec>,
    marker: SpanName<'_>,
) -> Vec<Request> {
    let mut insert_at = locate(doc, anchor);
    let mut requests = Vec::new();

    let header_name = SpanName::Header { section }.to_name();
    if !doc.has_named_range(&header_name) {
        let header = CharRange::new(insert_at, insert_at + utf16_len(section));
        let heading = insert_formatted_text(section, header, SECTION_HEADING_STYLE);
        requests.extend(heading);
        requests.push(create_named_range(header_name, header));
        insert_at = header.end;
    }

    let block = insert_table(TableSpec {
        table_start: insert_at,
        cells,
        range_names: vec![
            SpanName::ParentRef { reference: anchor }.to_name(),
            SpanName::OrderingRef { reference: anchor }.to_name(),
            marker.to_name(),
        ],
        cell_style: None,
    });
    requests.extend(block.requests);
    requests
}

/// Whether `doc` already carries the instructional block.
pub fn has_instructions(doc: &Document) -> bool {
    doc.has_named_range(INSTRUCTIONS_RANGE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::doc_with;
    use crate::schema::RangeIndex;

    fn comment(reference: &str, ordering_ref: &str) -> NewComment {
        NewComment {
            text: "Comment on Pasuk on Rashi".into(),
            selected_text: "that you may".into(),
            section: "22a".into(),
            reference: reference.into(),
            ordering_ref: ordering_ref.into(),
        }
    }

    fn created_names(requests: &[Request]) -> Vec<(String, CharRange)> {
        requests
            .iter()
            .filter_map(|request| match request {
                Request::CreateNamedRange(create) => Some((create.name.clone(), create.range)),
                _ => None,
            })
            .collect()
    }

    /// Apply the named ranges a batch would create, for decode checks.
    fn apply_names(mut doc: Document, requests: &[Request]) -> Document {
        for (name, range) in created_names(requests) {
            let group = doc.named_ranges.entry(name.clone()).or_default();
            group.name = name.clone();
            group.named_ranges.push(crate::document::NamedRange {
                named_range_id: format!("kix.{}", group.named_ranges.len()),
                name,
                ranges: vec![range],
            });
        }
        doc
    }

    fn encode(doc: &Document, reference: &str) -> Vec<Request> {
        encode_comment(doc, &comment(reference, "Pesachim 22a.1"), Uuid::new_v4())
    }

    fn names_only(requests: &[Request]) -> Vec<String> {
        created_names(requests)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    #[test]
    fn adds_header_when_section_is_new() {
        let doc = doc_with(&[(INSTRUCTIONS_RANGE_NAME, &[(1, 120)])]);
        let requests = encode(&doc, "Exodus 11:7");
        let header = ("header:22a".to_string(), CharRange::new(120, 123));
        assert_eq!(created_names(&requests)[0], header);
        let Request::InsertText(insert) = &requests[0] else {
            panic!("expected the heading text first");
        };
        assert_eq!(insert.location.index, 120);
    }

    #[test]
    fn skips_header_when_section_exists() {
        let doc = doc_with(&[
            (INSTRUCTIONS_RANGE_NAME, &[(1, 120)]),
            ("header:22a", &[(120, 123)]),
        ]);
        let requests = encode(&doc, "Exodus 11:7");
        let names = names_only(&requests);
        assert!(names.iter().all(|name| !name.starts_with("header:")));
        assert!(matches!(&requests[0], Request::InsertTable(_)));
    }

    #[test]
    fn reference_label_row_only_when_distinct() {
        let doc = doc_with(&[("header:22a", &[(120, 123)])]);
        let with_label = encode(&doc, "Exodus 11:7");
        let without_label = encode(&doc, "Pesachim 22a.1");
        let rows = |requests: &[Request]| {
            requests.iter().find_map(|r| match r {
                Request::InsertTable(table) => Some(table.rows),
                _ => None,
            })
        };
        assert_eq!(rows(&with_label), Some(3));
        assert_eq!(rows(&without_label), Some(2));
    }

    #[test]
    fn creates_anchor_and_marker_spans_over_block() {
        let id = Uuid::new_v4();
        let doc = doc_with(&[("header:22a", &[(120, 123)])]);
        let requests = encode_comment(&doc, &comment("Exodus 11:7", "Pesachim 22a.1"), id);
        let names = names_only(&requests);
        assert!(names.contains(&"parentRef:Pesachim 22a.1".to_string()));
        assert!(names.contains(&"orderingRef:Pesachim 22a.1".to_string()));
        assert!(names.contains(&format!("fullComment:{id}")));
        let selected = format!("{id}<<||>>Exodus 11:7<<||>>selected text");
        assert!(names.contains(&selected));
        let body = format!("{id}<<||>>Exodus 11:7<<||>>comment");
        assert!(names.contains(&body));
    }

    #[test]
    fn encoded_comment_decodes_as_joined_range() {
        let doc = doc_with(&[(INSTRUCTIONS_RANGE_NAME, &[(1, 120)])]);
        let requests = encode(&doc, "Exodus 11:7");
        let index = RangeIndex::decode(&apply_names(doc, &requests));
        let ranges = &index.comments["Exodus 11:7"];
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].joined);
    }

    #[test]
    fn fresh_ids_never_collide() {
        let doc = doc_with(&[("header:22a", &[(120, 123)])]);
        let first = encode(&doc, "Exodus 11:7");
        let second = encode(&doc, "Exodus 11:7");
        let body_name = |requests: &[Request]| {
            names_only(requests)
                .into_iter()
                .find(|name| name.ends_with("<<||>>comment"))
        };
        assert!(body_name(&first).is_some());
        assert_ne!(body_name(&first), body_name(&second));
    }

    #[test]
    fn encoded_highlight_decodes_with_metadata() {
        let highlight = NewHighlight {
            text: "לַדָּבָר".into(),
            section: "8a".into(),
            reference: "Pesachim 8a.1".into(),
            ordering_ref: "Pesachim 8a.1".into(),
            meta: HighlightMeta {
                start_percentage: 0.25,
                end_percentage: 0.5,
                is_english: false,
                word_count_start: 10,
                word_count_end: 30,
            },
        };
        let doc = doc_with(&[(INSTRUCTIONS_RANGE_NAME, &[(1, 120)])]);
        let requests = encode_highlight(&doc, &highlight, Uuid::new_v4());
        let index = RangeIndex::decode(&apply_names(doc, &requests));
        assert!(index.comments.is_empty());
        assert_eq!(index.highlights["Pesachim 8a.1"][0].meta, highlight.meta);
    }

    #[test]
    fn instructions_block_is_tagged() {
        let requests = instructions_requests(&Instructions {
            app_name: "talmud.page".into(),
            app_url: "https://talmud.page".into(),
            caveats_url: "https://talmud.page/caveats/google-docs".into(),
        });
        let names = created_names(&requests);
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].0, INSTRUCTIONS_RANGE_NAME);
        assert_eq!(names[0].1.start, 1);
    }
}
