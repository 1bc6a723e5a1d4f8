// `marginalia add-comment` — save a comment into the notes document.

use clap::Args;
use marginalia_common::types::NewComment;
use serde::Serialize;
use tracing::info;

use super::session::{self, StoreArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct AddCommentArgs {
    /// Comment text.
    pub text: String,
    /// Reference the comment is attached to.
    #[arg(long = "ref")]
    pub reference: String,
    /// Passage text the comment was made on.
    #[arg(long)]
    pub selected: String,
    /// Section heading to file the comment under (e.g. "22a").
    #[arg(long)]
    pub section: String,
    /// Coarser reference that decides where the comment goes; defaults to --ref.
    #[arg(long)]
    pub ordering_ref: Option<String>,
    #[command(flatten)]
    pub store: StoreArgs,
}

impl AddCommentArgs {
    fn to_comment(&self) -> NewComment {
        let ordering_ref = self.ordering_ref.as_ref().unwrap_or(&self.reference);
        NewComment {
            text: self.text.clone(),
            selected_text: self.selected.clone(),
            section: self.section.clone(),
            reference: self.reference.clone(),
            ordering_ref: ordering_ref.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedResult {
    pub reference: String,
    pub document_id: Option<String>,
    /// Annotations of this kind on the reference after the save.
    pub total: usize,
}

pub async fn run(args: AddCommentArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = session::open(&args.store).await?;
    let comment = args.to_comment();
    store.submit(comment).await?;

    let records = store.records_for(&args.reference);
    let total = records.map_or(0, |records| records.len());
    info!(reference = %args.reference, total, "comment saved");
    let result = AddedResult {
        reference: args.reference,
        document_id: store.status().document_id,
        total,
    };
    output::print_output(format, &result, |r| format_human("comment", r))?;
    Ok(())
}

pub(crate) fn format_human(noun: &str, result: &AddedResult) -> String {
    let plural = if result.total == 1 { "" } else { "s" };
    let count = format!("{} {noun}{plural}", result.total);
    format!("Saved {noun} on {} ({count} there now).", result.reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: AddCommentArgs,
    }

    #[test]
    fn ordering_ref_defaults_to_reference() {
        let harness = Harness::parse_from([
            "marginalia",
            "Comment on Pasuk",
            "--ref",
            "Pesachim 22a.1",
            "--selected",
            "that you may",
            "--section",
            "22a",
        ]);
        let comment = harness.args.to_comment();
        assert_eq!(comment.ordering_ref, "Pesachim 22a.1");
        assert_eq!(comment.selected_text, "that you may");
        assert!(!harness.args.store.json);
    }

    #[test]
    fn explicit_ordering_ref_is_kept() {
        let harness = Harness::parse_from([
            "marginalia",
            "note",
            "--ref",
            "Exodus 11:7",
            "--selected",
            "x",
            "--section",
            "22a",
            "--ordering-ref",
            "Pesachim 22a.1",
            "--collection",
            "Pesachim",
        ]);
        let comment = harness.args.to_comment();
        assert_eq!(comment.reference, "Exodus 11:7");
        assert_eq!(comment.ordering_ref, "Pesachim 22a.1");
        assert_eq!(harness.args.store.collection.as_deref(), Some("Pesachim"));
    }

    #[test]
    fn human_summary_pluralizes() {
        let one = AddedResult {
            reference: "Pesachim 22a.1".into(),
            document_id: None,
            total: 1,
        };
        let expected = "Saved comment on Pesachim 22a.1 (1 comment there now).";
        assert_eq!(format_human("comment", &one), expected);
        let two = AddedResult { total: 2, ..one };
        let expected = "Saved highlight on Pesachim 22a.1 (2 highlights there now).";
        assert_eq!(format_human("highlight", &two), expected);
    }
}
