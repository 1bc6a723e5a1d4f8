// CLI subcommand dispatch.

use clap::Subcommand;

use crate::output::{self, OutputFormat};

pub mod add_comment;
pub mod add_highlight;
pub mod comments;
pub mod highlights;
pub mod session;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// List personal comments on a reference
    Comments(comments::CommentsArgs),
    /// List highlights on a reference
    Highlights(highlights::HighlightsArgs),
    /// Save a comment into the notes document
    AddComment(add_comment::AddCommentArgs),
    /// Save a highlighted passage into the notes document
    AddHighlight(add_highlight::AddHighlightArgs),
    /// Show the notes document and any outstanding errors
    Status(status::StatusArgs),
}

impl Command {
    fn store_args(&self) -> &session::StoreArgs {
        match self {
            Self::Comments(args) => &args.store,
            Self::Highlights(args) => &args.store,
            Self::AddComment(args) => &args.store,
            Self::AddHighlight(args) => &args.store,
            Self::Status(args) => &args.store,
        }
    }
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    let format = OutputFormat::detect(cmd.store_args().json);
    let result = match cmd {
        Command::Comments(args) => comments::run(args, format).await,
        Command::Highlights(args) => highlights::run(args, format).await,
        Command::AddComment(args) => add_comment::run(args, format).await,
        Command::AddHighlight(args) => add_highlight::run(args, format).await,
        Command::Status(args) => status::run(args, format).await,
    };
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}
