// `marginalia highlights` — list highlighted passages on a reference.

use clap::Args;
use marginalia_common::record::HighlightRecord;
use serde::Serialize;

use super::session::{self, StoreArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct HighlightsArgs {
    /// Passage reference, e.g. "Pesachim 22a.1".
    pub reference: String,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightsResult {
    pub reference: String,
    pub highlights: Vec<HighlightRecord>,
}

pub async fn run(args: HighlightsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = session::open(&args.store).await?;
    let highlights = store.highlights_for(&args.reference).unwrap_or_default();
    let result = HighlightsResult {
        reference: args.reference,
        highlights,
    };
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &HighlightsResult) -> String {
    if result.highlights.is_empty() {
        return format!("No highlights on {}.", result.reference);
    }
    let count = result.highlights.len();
    let mut lines = vec![format!("{} ({count})", result.reference)];
    for highlight in &result.highlights {
        lines.push(format!(
            "  {:.0}-{:.0}%  {}",
            highlight.meta.start_percentage * 100.0,
            highlight.meta.end_percentage * 100.0,
            highlight.text
        ));
    }
    lines.join("\n")
}
