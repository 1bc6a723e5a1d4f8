// `marginalia comments` — list personal comments on a reference.

use clap::Args;
use marginalia_common::record::AnnotationRecord;
use serde::Serialize;

use super::session::{self, StoreArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CommentsArgs {
    /// Passage reference, e.g. "Pesachim 22a.1".
    pub reference: String,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentsResult {
    pub reference: String,
    pub records: Vec<AnnotationRecord>,
}

pub async fn run(args: CommentsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = session::open(&args.store).await?;
    let records = store
        .records_for(&args.reference)
        .map(|records| records.to_vec())
        .unwrap_or_default();
    let result = CommentsResult {
        reference: args.reference,
        records,
    };
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &CommentsResult) -> String {
    if result.records.is_empty() {
        return format!("No comments on {}.", result.reference);
    }
    let mut lines = vec![format!("{} ({})", result.reference, result.records.len())];
    for record in &result.records {
        let language = if record.en.is_empty() { "he" } else { "en" };
        lines.push(format!("  [{}] ({language})", record.id));
        for text in record.texts() {
            lines.push(format!("    {text}"));
        }
    }
    lines.join("\n")
}
