// Document snapshot model: the structural tree and named ranges returned by
// the document service, deserialized from its camelCase JSON.
//
// Snapshots are immutable once fetched. Accessors walk the tree without
// mutating it; anything that needs adjusted offsets works on copies.

pub mod request;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{utf16_len, CharRange};

// ── Snapshot ────────────────────────────────────────────────────────

/// Full structural and named-range state of a document at one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub document_id: String,
    pub title: String,
    /// Revision token checked by batch mutations.
    pub revision_id: Option<String>,
    pub body: Body,
    pub named_ranges: BTreeMap<String, NamedRanges>,
}

impl Document {
    /// All ranges carried by every instance of the named range `name`.
    pub fn ranges_named(&self, name: &str) -> Vec<CharRange> {
        self.named_ranges
            .get(name)
            .map(|group| {
                group
                    .named_ranges
                    .iter()
                    .flat_map(|nr| nr.ranges.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First range of the first instance of `name`, if any.
    pub fn first_range_named(&self, name: &str) -> Option<CharRange> {
        self.named_ranges
            .get(name)
            .and_then(|group| group.named_ranges.first())
            .and_then(|nr| nr.ranges.first())
            .copied()
    }

    pub fn has_named_range(&self, name: &str) -> bool {
        self.named_ranges.contains_key(name)
    }

    /// Offset just before the body's final newline; 1 for an empty body.
    pub fn document_end(&self) -> u32 {
        self.body
            .content
            .last()
            .map(|element| element.end_index.saturating_sub(1).max(1))
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Body {
    pub content: Vec<StructuralElement>,
}

/// A paragraph, table or section break in a content list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuralElement {
    pub start_index: u32,
    pub end_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<Paragraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_break: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paragraph {
    pub elements: Vec<ParagraphElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_style: Option<ParagraphStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParagraphStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_style_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// An inline element. Only text runs carry content the schema reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParagraphElement {
    pub start_index: u32,
    pub end_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRun {
    pub content: String,
    pub text_style: TextStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    #[serde(skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

impl TextStyle {
    pub fn link_url(&self) -> Option<&str> {
        self.link
            .as_ref()
            .and_then(|link| link.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Table {
    pub rows: u32,
    pub columns: u32,
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableRow {
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCell {
    pub content: Vec<StructuralElement>,
}

// ── Named ranges ────────────────────────────────────────────────────

/// Every instance of one range name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedRanges {
    pub name: String,
    pub named_ranges: Vec<NamedRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedRange {
    pub named_range_id: String,
    pub name: String,
    pub ranges: Vec<CharRange>,
}

// ── Flattened runs ──────────────────────────────────────────────────

/// A text run lifted out of the structural tree, with its offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRunElement {
    pub start: u32,
    pub end: u32,
    pub content: String,
    pub style: TextStyle,
}

impl Body {
    /// Text runs in document order, descending into table cells.
    ///
    /// Within every content list, the first run of the first paragraph is
    /// trimmed at the start and the last run of the last paragraph at the
    /// end, with offsets adjusted so they still describe the kept text.
    pub fn text_runs(&self) -> Vec<TextRunElement> {
        let mut runs = Vec::new();
        collect_runs(&self.content, &mut runs);
        runs
    }
}

fn collect_runs(content: &[StructuralElement], runs: &mut Vec<TextRunElement>) {
    let last_index = content.len().saturating_sub(1);
    for (index, element) in content.iter().enumerate() {
        if let Some(paragraph) = &element.paragraph {
            let mut elements: Vec<TextRunElement> = paragraph
                .elements
                .iter()
                .filter_map(|pe| {
                    pe.text_run.as_ref().map(|run| TextRunElement {
                        start: pe.start_index,
                        end: pe.end_index,
                        content: run.content.clone(),
                        style: run.text_style.clone(),
                    })
                })
                .collect();
            if index == 0 {
                if let Some(first) = elements.first_mut() {
                    let trimmed = first.content.trim_start().to_string();
                    first.start += utf16_len(&first.content) - utf16_len(&trimmed);
                    first.content = trimmed;
                }
            }
            if index == last_index {
                if let Some(last) = elements.last_mut() {
                    let trimmed = last.content.trim_end().to_string();
                    let removed = utf16_len(&last.content) - utf16_len(&trimmed);
                    last.end = last.end.saturating_sub(removed);
                    last.content = trimmed;
                }
            }
            runs.extend(elements);
        } else if let Some(table) = &element.table {
            for row in &table.table_rows {
                for cell in &row.table_cells {
                    collect_runs(&cell.content, runs);
                }
            }
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(runs: &[(u32, &str)]) -> StructuralElement {
        let elements: Vec<ParagraphElement> = runs
            .iter()
            .map(|(start, text)| ParagraphElement {
                start_index: *start,
                end_index: start + utf16_len(text),
                text_run: Some(TextRun {
                    content: text.to_string(),
                    text_style: TextStyle::default(),
                }),
            })
            .collect();
        StructuralElement {
            start_index: elements.first().map(|e| e.start_index).unwrap_or(0),
            end_index: elements.last().map(|e| e.end_index).unwrap_or(0),
            paragraph: Some(Paragraph {
                elements,
                paragraph_style: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn deserializes_document_service_json() {
        let json = r#"{
            "documentId": "doc-1",
            "title": "notes",
            "revisionId": "rev-7",
            "body": {"content": [
                {"endIndex": 1, "sectionBreak": {}},
                {"startIndex": 1, "endIndex": 7, "paragraph": {"elements": [
                    {"startIndex": 1, "endIndex": 7,
                     "textRun": {"content": "hello\n", "textStyle": {"bold": true}}}
                ]}}
            ]},
            "namedRanges": {"ref:A": {"name": "ref:A", "namedRanges": [
                {"namedRangeId": "kix.1", "name": "ref:A",
                 "ranges": [{"startIndex": 1, "endIndex": 6}]}
            ]}}
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.revision_id.as_deref(), Some("rev-7"));
        assert_eq!(doc.document_end(), 6);
        assert_eq!(doc.ranges_named("ref:A"), vec![CharRange::new(1, 6)]);
        let runs = doc.body.text_runs();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].style.bold);
    }

    #[test]
    fn missing_named_ranges_deserialize_to_empty() {
        let doc: Document = serde_json::from_str(r#"{"documentId": "x"}"#).unwrap();
        assert!(doc.named_ranges.is_empty());
        assert_eq!(doc.document_end(), 1);
    }

    #[test]
    fn text_runs_trim_edges_of_each_content_list() {
        let content = vec![
            paragraph(&[(1, "  lead"), (7, "mid")]),
            paragraph(&[(10, "tail \n")]),
        ];
        let body = Body { content };
        let runs = body.text_runs();
        assert_eq!(runs[0].content, "lead");
        assert_eq!(runs[0].start, 3);
        assert_eq!(runs[1].content, "mid");
        assert_eq!(runs[2].content, "tail");
        assert_eq!(runs[2].end, 14);
    }

    #[test]
    fn text_runs_descend_into_table_cells() {
        let content = vec![paragraph(&[(4, "cell text\n")])];
        let table_cells = vec![TableCell { content }];
        let table = Table {
            rows: 1,
            columns: 1,
            table_rows: vec![TableRow { table_cells }],
        };
        let table = StructuralElement {
            start_index: 2,
            end_index: 16,
            table: Some(table),
            ..Default::default()
        };
        let content = vec![paragraph(&[(1, "\n")]), table, paragraph(&[(16, "\n")])];
        let body = Body { content };
        let runs = body.text_runs();
        let texts: Vec<&str> = runs.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(texts, vec!["", "cell text", ""]);
    }

    #[test]
    fn text_runs_do_not_mutate_snapshot() {
        let content = vec![paragraph(&[(1, "  padded  ")])];
        let body = Body { content };
        let before = body.clone();
        let _ = body.text_runs();
        assert_eq!(body, before);
    }
}
