// `marginalia status` — show the notes document and outstanding errors.

use clap::Args;
use marginalia_store::StoreStatus;

use super::session::{self, StoreArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn run(args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = session::open(&args.store).await?;
    let status = store.status();
    let property = store.config().database_property();
    output::print_output(format, &status, |s| format_human(&property, s))?;
    for (key, message) in &status.errors {
        output::print_warning(format, key, message);
    }
    Ok(())
}

fn format_human(property: &str, status: &StoreStatus) -> String {
    let mut lines = vec![property.to_string()];
    match (&status.document_id, &status.title) {
        (Some(id), Some(title)) => {
            lines.push(format!("  Document: {title} ({id})"));
            if let Some(revision) = &status.revision_id {
                lines.push(format!("  Revision: {revision}"));
            }
        }
        _ if status.should_create => {
            lines.push("  No notes document yet; the first save creates one.".into())
        }
        _ => lines.push("  No notes document loaded.".into()),
    }
    lines.push(format!(
        "  Annotated refs: {} with comments, {} with highlights",
        status.commented_refs, status.highlighted_refs
    ));
    if !status.ready {
        lines.push("  Not ready: saves will wait until the document is found.".into());
    }
    if !status.errors.is_empty() {
        lines.push(format!("  Errors ({})", status.errors.len()));
    }
    lines.join("\n")
}
