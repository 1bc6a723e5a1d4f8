// Text extraction: styled runs + a range → display text with language stats.
//
// Stages run in a fixed order and each one maps a list of pieces to a new
// list. Styling happens before adjacent runs are merged so that style
// markers stay distinct spans, and newline conversion happens after
// trimming so that `<br>` never hides trailing whitespace.

use serde::{Deserialize, Serialize};

use crate::document::{TextRunElement, TextStyle};
use crate::types::{utf16_len, utf16_slice, CharRange, LanguageStats};

const STYLE_CLASS_PREFIX: &str = "personal-comment-";

/// One finalized piece of display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub language_stats: LanguageStats,
}

#[derive(Debug, Clone)]
struct Piece {
    start: u32,
    end: u32,
    text: String,
    style: TextStyle,
    stats: LanguageStats,
}

/// Run the full pipeline for `range` over document-ordered `runs`.
pub fn extract(range: CharRange, runs: &[TextRunElement]) -> Vec<ExtractedText> {
    let pieces = select_overlapping(range, runs);
    let pieces = clip_to_range(range, pieces);
    let pieces = count_languages(pieces);
    let pieces = escape_html(pieces);
    let pieces = apply_styles(pieces);
    let pieces = merge_adjacent(pieces);
    let pieces = trim_whitespace(pieces);
    let pieces = newlines_to_breaks(pieces);

    pieces
        .into_iter()
        .map(|piece| ExtractedText {
            text: piece.text,
            language_stats: piece.stats,
        })
        .collect()
}

/// Unstyled text inside `range`, with runs concatenated.
pub fn extract_plain(range: CharRange, runs: &[TextRunElement]) -> String {
    clip_to_range(range, select_overlapping(range, runs))
        .into_iter()
        .map(|piece| piece.text)
        .collect()
}

/// Whether a run starting at `run.start` intersects `range`.
pub fn overlaps(range: CharRange, run: &TextRunElement) -> bool {
    if run.start == range.start {
        true
    } else if run.start < range.start {
        run.end > range.start
    } else {
        run.start < range.end
    }
}

fn select_overlapping(range: CharRange, runs: &[TextRunElement]) -> Vec<Piece> {
    runs.iter()
        .filter(|run| overlaps(range, run))
        .map(|run| Piece {
            start: run.start,
            end: run.end,
            text: run.content.clone(),
            style: run.style.clone(),
            stats: LanguageStats::default(),
        })
        .collect()
}

fn clip_to_range(range: CharRange, pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            let len = utf16_len(&piece.text);
            let from = range.start.saturating_sub(piece.start);
            let to = if range.end > piece.end {
                len
            } else {
                len.saturating_sub(piece.end - range.end)
            };
            piece.text = utf16_slice(&piece.text, from, to);
            piece
        })
        .collect()
}

fn is_hebrew_letter(ch: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&ch)
}

fn count_languages(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            let hebrew = piece.text.chars().filter(|&c| is_hebrew_letter(c)).count();
            let english = piece.text.chars().filter(char::is_ascii_alphabetic).count();
            piece.stats = LanguageStats {
                hebrew: hebrew as u32,
                english: english as u32,
            };
            piece
        })
        .collect()
}

/// Escape the five HTML-significant characters.
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#039;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_html(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            piece.text = html_escape(&piece.text);
            piece
        })
        .collect()
}

fn style_classes(style: &TextStyle) -> String {
    [
        (style.bold, "bold"),
        (style.italic, "italic"),
        (style.underline, "underline"),
        (style.strikethrough, "strikethrough"),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, name)| format!("{STYLE_CLASS_PREFIX}{name}"))
    .collect::<Vec<_>>()
    .join(" ")
}

fn apply_styles(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            let classes = style_classes(&piece.style);
            if !classes.is_empty() {
                piece.text = format!(r#"<span class="{classes}">{}</span>"#, piece.text);
            }
            if let Some(url) = piece.style.link_url() {
                piece.text = format!(r#"<a href="{url}">{}</a>"#, piece.text);
            }
            piece
        })
        .collect()
}

fn merge_adjacent(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut merged: Vec<Piece> = Vec::with_capacity(pieces.len());
    for current in pieces {
        match merged.last_mut() {
            Some(previous) if previous.end == current.start => {
                previous.end = current.end;
                previous.text.push_str(&current.text);
                previous.stats = previous.stats + current.stats;
                previous.style = TextStyle::default();
            }
            _ => merged.push(current),
        }
    }
    merged
}

fn trim_whitespace(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            let trimmed = piece.text.trim();
            if trimmed.len() != piece.text.len() {
                piece.text = trimmed.to_string();
            }
            piece
        })
        .collect()
}

fn newlines_to_breaks(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|mut piece| {
            if piece.text.contains('\n') {
                piece.text = piece.text.replace('\n', "<br>");
            }
            piece
        })
        .collect()
}
