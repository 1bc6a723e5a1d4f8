// Batch mutation requests and builders for formatted text and tables.
//
// Requests serialize to the document service's externally tagged shape,
// e.g. `{"insertText": {"text": "...", "location": {"index": 5}}}`.
//
// Table layout used for offset arithmetic (one column, `n` rows):
//   L          newline inserted before the table
//   L+1        table start
//   per row    row marker, cell marker, cell paragraph newline
// so the empty paragraph of row `r` sits at `L + 4 + 3r`, and a table with
// cell texts of total length `t` occupies `[L, L + 2 + 3n + t)`.

use serde::{Deserialize, Serialize};

use super::{Link, ParagraphStyle, TextStyle};
use crate::types::{utf16_len, CharRange};

const TABLE_PREFIX_LEN: u32 = 2;
const ROW_OVERHEAD: u32 = 3;
const FIRST_CELL_OFFSET: u32 = 4;

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    InsertText(InsertText),
    InsertTable(InsertTable),
    UpdateTextStyle(UpdateTextStyle),
    UpdateParagraphStyle(UpdateParagraphStyle),
    UpdateTableCellStyle(UpdateTableCellStyle),
    CreateNamedRange(CreateNamedRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertText {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertTable {
    pub rows: u32,
    pub columns: u32,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTextStyle {
    pub range: CharRange,
    pub text_style: TextStyle,
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParagraphStyle {
    pub range: CharRange,
    pub paragraph_style: ParagraphStyle,
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableCellStyle {
    pub table_start_location: Location,
    pub table_cell_style: TableCellStyle,
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNamedRange {
    pub name: String,
    pub range: CharRange,
}

/// Background and border colour applied to every cell of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCellStyle {
    pub background_color: OptionalColor,
    pub border_left: Border,
    pub border_right: Border,
    pub border_top: Border,
    pub border_bottom: Border,
}

impl TableCellStyle {
    pub fn new(background: RgbColor, border: RgbColor) -> Self {
        let border = Border::solid(border);
        Self {
            background_color: OptionalColor::rgb(background),
            border_left: border.clone(),
            border_right: border.clone(),
            border_top: border.clone(),
            border_bottom: border,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub color: OptionalColor,
    pub dash_style: String,
    pub width: Dimension,
}

impl Border {
    fn solid(color: RgbColor) -> Self {
        Self {
            color: OptionalColor::rgb(color),
            dash_style: "SOLID".into(),
            width: Dimension {
                magnitude: 1.0,
                unit: "PT".into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub magnitude: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalColor {
    pub color: ColorValue,
}

impl OptionalColor {
    fn rgb(rgb: RgbColor) -> Self {
        Self {
            color: ColorValue { rgb_color: rgb },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorValue {
    pub rgb_color: RgbColor,
}

/// Colour with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl RgbColor {
    pub fn from_rgb8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: f64::from(red) / 255.0,
            green: f64::from(green) / 255.0,
            blue: f64::from(blue) / 255.0,
        }
    }
}

// ── Builders ────────────────────────────────────────────────────────

/// A piece of cell text, optionally bold or linked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
    pub url: Option<String>,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            url: Some(url.into()),
        }
    }
}

/// One row of a single-column table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSpec {
    pub segments: Vec<Segment>,
    pub rtl: bool,
    /// Named ranges created over the cell's text.
    pub range_names: Vec<String>,
}

impl CellSpec {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    pub fn rtl(mut self) -> Self {
        self.rtl = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.range_names.push(name.into());
        self
    }

    fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub table_start: u32,
    pub cells: Vec<CellSpec>,
    /// Named ranges created over the whole inserted block.
    pub range_names: Vec<String>,
    pub cell_style: Option<TableCellStyle>,
}

/// Requests plus the block they occupy once applied.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedBlock {
    pub requests: Vec<Request>,
    pub range: CharRange,
}

pub fn create_named_range(name: impl Into<String>, range: CharRange) -> Request {
    Request::CreateNamedRange(CreateNamedRange {
        name: name.into(),
        range,
    })
}

/// Insert `text` at `range.start` and give the paragraph a named style.
pub fn insert_formatted_text(text: &str, range: CharRange, named_style: &str) -> Vec<Request> {
    vec![
        Request::InsertText(InsertText {
            text: text.to_string(),
            location: Location { index: range.start },
        }),
        Request::UpdateParagraphStyle(UpdateParagraphStyle {
            range,
            paragraph_style: ParagraphStyle {
                named_style_type: Some(named_style.to_string()),
                direction: None,
            },
            fields: "namedStyleType".into(),
        }),
    ]
}

/// Build a single-column table with one row per cell.
///
/// Cell texts are inserted bottom-up so earlier offsets stay valid; styles
/// and named ranges are then applied against final offsets.
pub fn insert_table(spec: TableSpec) -> InsertedBlock {
    let start = spec.table_start;
    let rows = spec.cells.len() as u32;
    let texts: Vec<String> = spec.cells.iter().map(CellSpec::text).collect();

    let mut requests = vec![Request::InsertTable(InsertTable {
        rows,
        columns: 1,
        location: Location { index: start },
    })];

    if let Some(style) = spec.cell_style {
        requests.push(Request::UpdateTableCellStyle(UpdateTableCellStyle {
            table_start_location: Location { index: start + 1 },
            table_cell_style: style,
            fields: "backgroundColor,borderLeft,borderRight,borderTop,borderBottom".into(),
        }));
    }

    for (row, text) in texts.iter().enumerate().rev() {
        if text.is_empty() {
            continue;
        }
        let index = start + FIRST_CELL_OFFSET + ROW_OVERHEAD * row as u32;
        requests.push(Request::InsertText(InsertText {
            text: text.clone(),
            location: Location { index },
        }));
    }

    let mut preceding_text = 0u32;
    for (row, (cell, text)) in spec.cells.iter().zip(&texts).enumerate() {
        let cell_start = start + FIRST_CELL_OFFSET + ROW_OVERHEAD * row as u32 + preceding_text;
        let cell_range = CharRange::new(cell_start, cell_start + utf16_len(text));

        let mut segment_start = cell_start;
        for segment in &cell.segments {
            let segment_end = segment_start + utf16_len(&segment.text);
            let segment_range = CharRange::new(segment_start, segment_end);
            segment_start = segment_range.end;
            if segment_range.is_empty() {
                continue;
            }
            if segment.bold {
                requests.push(Request::UpdateTextStyle(UpdateTextStyle {
                    range: segment_range,
                    text_style: TextStyle {
                        bold: true,
                        ..Default::default()
                    },
                    fields: "bold".into(),
                }));
            }
            if let Some(url) = &segment.url {
                requests.push(Request::UpdateTextStyle(UpdateTextStyle {
                    range: segment_range,
                    text_style: TextStyle {
                        link: Some(Link {
                            url: Some(url.clone()),
                        }),
                        ..Default::default()
                    },
                    fields: "link".into(),
                }));
            }
        }

        if cell.rtl {
            requests.push(Request::UpdateParagraphStyle(UpdateParagraphStyle {
                range: CharRange::new(cell_range.start, cell_range.end + 1),
                paragraph_style: ParagraphStyle {
                    named_style_type: None,
                    direction: Some("RIGHT_TO_LEFT".into()),
                },
                fields: "direction".into(),
            }));
        }

        for name in &cell.range_names {
            requests.push(create_named_range(name.clone(), cell_range));
        }
        preceding_text += cell_range.len();
    }

    let end = start + TABLE_PREFIX_LEN + ROW_OVERHEAD * rows + preceding_text;
    let block = CharRange::new(start, end);
    for name in spec.range_names {
        requests.push(create_named_range(name, block));
    }

    InsertedBlock {
        requests,
        range: block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_ranges(requests: &[Request]) -> Vec<(String, CharRange)> {
        requests
            .iter()
            .filter_map(|request| match request {
                Request::CreateNamedRange(create) => Some((create.name.clone(), create.range)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn request_serializes_externally_tagged() {
        let request = Request::InsertText(InsertText {
            text: "hi".into(),
            location: Location { index: 4 },
        });
        let json = serde_json::to_value(&request).unwrap();
        let expected = serde_json::json!({"insertText": {"text": "hi", "location": {"index": 4}}});
        assert_eq!(json, expected);
    }

    #[test]
    fn formatted_text_styles_the_inserted_paragraph() {
        let requests = insert_formatted_text("22a", CharRange::new(10, 13), "HEADING_2");
        assert_eq!(requests.len(), 2);
        let json = serde_json::to_value(&requests[1]).unwrap();
        let update = &json["updateParagraphStyle"];
        assert_eq!(update["paragraphStyle"]["namedStyleType"], "HEADING_2");
        assert_eq!(update["range"]["startIndex"], 10);
    }

    #[test]
    fn table_cells_get_final_offsets() {
        let block = insert_table(TableSpec {
            table_start: 10,
            cells: vec![
                CellSpec::new(vec![Segment::bold("abc")]).named("first"),
                CellSpec::new(vec![Segment::plain("de")]).named("second"),
            ],
            range_names: vec!["block".into()],
            cell_style: None,
        });

        let ranges = named_ranges(&block.requests);
        assert_eq!(ranges[0], ("first".into(), CharRange::new(14, 17)));
        assert_eq!(ranges[1], ("second".into(), CharRange::new(20, 22)));
        assert_eq!(ranges[2], ("block".into(), CharRange::new(10, 23)));
        assert_eq!(block.range, CharRange::new(10, 23));
    }

    #[test]
    fn table_text_is_inserted_bottom_up() {
        let block = insert_table(TableSpec {
            table_start: 1,
            cells: vec![
                CellSpec::new(vec![Segment::plain("a")]),
                CellSpec::new(vec![Segment::plain("b")]),
            ],
            range_names: vec![],
            cell_style: None,
        });
        let inserts: Vec<(String, u32)> = block
            .requests
            .iter()
            .filter_map(|request| match request {
                Request::InsertText(insert) => Some((insert.text.clone(), insert.location.index)),
                _ => None,
            })
            .collect();
        assert_eq!(inserts, vec![("b".to_string(), 8), ("a".to_string(), 5)]);
    }

    #[test]
    fn rtl_cell_sets_paragraph_direction() {
        let block = insert_table(TableSpec {
            table_start: 1,
            cells: vec![CellSpec::new(vec![Segment::bold("שלום")]).rtl()],
            range_names: vec![],
            cell_style: None,
        });
        let has_rtl = block.requests.iter().any(|request| {
            matches!(request, Request::UpdateParagraphStyle(update)
                if update.paragraph_style.direction.as_deref() == Some("RIGHT_TO_LEFT"))
        });
        assert!(has_rtl);
    }

    #[test]
    fn links_are_styled_per_segment() {
        let segments = vec![
            Segment::plain("see "),
            Segment::link("here", "https://x.test"),
        ];
        let block = insert_table(TableSpec {
            table_start: 1,
            cells: vec![CellSpec::new(segments)],
            range_names: vec![],
            cell_style: None,
        });
        let link_range = block.requests.iter().find_map(|request| match request {
            Request::UpdateTextStyle(update) if update.text_style.link.is_some() => {
                Some(update.range)
            }
            _ => None,
        });
        assert_eq!(link_range, Some(CharRange::new(9, 13)));
    }
}
