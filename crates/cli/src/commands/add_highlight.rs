// `marginalia add-highlight` — save a highlighted passage.

use clap::Args;
use marginalia_common::types::{HighlightMeta, NewHighlight};
use tracing::info;

use super::add_comment::{format_human, AddedResult};
use super::session::{self, StoreArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct AddHighlightArgs {
    /// Highlighted text.
    pub text: String,
    #[arg(long = "ref")]
    pub reference: String,
    #[arg(long)]
    pub section: String,
    #[arg(long)]
    pub ordering_ref: Option<String>,
    /// Where the highlight starts within the passage, 0.0 to 1.0.
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,
    /// Where the highlight ends within the passage, 0.0 to 1.0.
    #[arg(long, default_value_t = 1.0)]
    pub end: f64,
    /// The highlight is in the English translation.
    #[arg(long)]
    pub english: bool,
    #[arg(long, default_value_t = 0)]
    pub word_count_start: u32,
    #[arg(long, default_value_t = 0)]
    pub word_count_end: u32,
    #[command(flatten)]
    pub store: StoreArgs,
}

impl AddHighlightArgs {
    fn to_highlight(&self) -> NewHighlight {
        let ordering_ref = self.ordering_ref.as_ref().unwrap_or(&self.reference);
        NewHighlight {
            text: self.text.clone(),
            section: self.section.clone(),
            reference: self.reference.clone(),
            ordering_ref: ordering_ref.clone(),
            meta: HighlightMeta {
                start_percentage: self.start,
                end_percentage: self.end,
                is_english: self.english,
                word_count_start: self.word_count_start,
                word_count_end: self.word_count_end,
            },
        }
    }
}

pub async fn run(args: AddHighlightArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = session::open(&args.store).await?;
    store.submit_highlight(args.to_highlight()).await?;

    let highlights = store.highlights_for(&args.reference);
    let total = highlights.map_or(0, |highlights| highlights.len());
    info!(reference = %args.reference, total, "highlight saved");
    let result = AddedResult {
        reference: args.reference,
        document_id: store.status().document_id,
        total,
    };
    output::print_output(format, &result, |r| format_human("highlight", r))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: AddHighlightArgs,
    }

    #[test]
    fn position_flags_fill_metadata() {
        let harness = Harness::parse_from([
            "marginalia",
            "the first words",
            "--ref",
            "Pesachim 22a.3",
            "--section",
            "22a",
            "--start",
            "0.25",
            "--end",
            "0.5",
            "--english",
            "--word-count-end",
            "7",
        ]);
        let highlight = harness.args.to_highlight();
        assert_eq!(highlight.ordering_ref, "Pesachim 22a.3");
        assert_eq!(
            highlight.meta,
            HighlightMeta {
                start_percentage: 0.25,
                end_percentage: 0.5,
                is_english: true,
                word_count_start: 0,
                word_count_end: 7,
            }
        );
    }
}
