// Output for CLI commands.
//
// Records go to stdout: human-readable text on a terminal, one JSON value
// per command when piped or with `--json`. Diagnostics go to stderr in the
// same format.

use marginalia_store::transport::TransportError;
use marginalia_store::StoreError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

const NO_DOCUMENT_HINT: &str = "No notes document yet. Run: marginalia add-comment to create one";
const AUTH_HINT: &str =
    "Authentication failed. Set MARGINALIA_ACCESS_TOKEN to a valid OAuth token.";
const STALE_HINT: &str = "The notes document kept changing while saving. Try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON if `--json` was passed or stdout is not a terminal.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write `value` as JSON, or as whatever `human_fn` renders.
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => writeln!(writer, "{}", human_fn(value)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value)
                .map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "error", ANSI_RED, code, message);
}

pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "warning", ANSI_YELLOW, code, message);
}

fn print_diagnostic(format: OutputFormat, label: &str, color: &str, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({ label: { "code": code, "message": message } });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if let Some(store_error) = cause.downcast_ref::<StoreError>() {
            match store_error {
                StoreError::TooManyDocuments(count) => {
                    let text = format!(
                        "Found {count} notes documents for this collection. {}",
                        "Keep one and remove the others from Google Drive."
                    );
                    return ("TOO_MANY_DOCS", text);
                }
                StoreError::NoBackingDocument => {
                    return ("NO_NOTES_DOCUMENT", NO_DOCUMENT_HINT.to_string());
                }
                StoreError::Config(_) => {
                    let text = format!("{message}. Check ~/.marginalia/config.toml");
                    return ("CONFIG_ERROR", text);
                }
                StoreError::Transport(transport_error) => {
                    if let Some(hint) = transport_hint(transport_error, &message) {
                        return hint;
                    }
                }
                StoreError::Discarded => {}
            }
        }
        if let Some(transport_error) = cause.downcast_ref::<TransportError>() {
            if let Some(hint) = transport_hint(transport_error, &message) {
                return hint;
            }
        }
    }

    ("STORE_ERROR", message)
}

fn transport_hint(error: &TransportError, message: &str) -> Option<(&'static str, String)> {
    match error {
        TransportError::Auth(_) => Some(("AUTH_FAILURE", AUTH_HINT.to_string())),
        TransportError::Network(_) => {
            let text = format!("Could not reach the document service: {message}");
            Some(("NETWORK_ERROR", text))
        }
        TransportError::StaleRevision => Some(("STALE_REVISION", STALE_HINT.to_string())),
        TransportError::Http { .. } | TransportError::Decode(_) => None,
    }
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_common::record::AnnotationRecord;

    fn record() -> AnnotationRecord {
        AnnotationRecord {
            en: vec!["<b>that you may</b> - Comment on Pasuk".into()],
            he: Vec::new(),
            id: "Pesachim 22a.1-personal0".into(),
        }
    }

    #[test]
    fn terminal_gets_human_output() {
        let tty = OutputFormat::detect_from_terminal(true);
        assert_eq!(tty, OutputFormat::Human);
        let piped = OutputFormat::detect_from_terminal(false);
        assert_eq!(piped, OutputFormat::Json);
    }

    #[test]
    fn json_flag_overrides_terminal() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn human_output_uses_renderer() {
        let mut buf = Vec::new();
        let format = OutputFormat::Human;
        let human = |r: &AnnotationRecord| format!("[{}] {}", r.id, r.texts()[0]);
        write_output(&mut buf, format, &record(), human).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "[Pesachim 22a.1-personal0] <b>that you may</b> - Comment on Pasuk\n"
        );
    }

    #[test]
    fn json_output_is_the_wire_record() {
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &record(), |_| {
            unreachable!("human renderer is not used for JSON")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["he"], "");
        assert_eq!(parsed["ref"], "Pesachim 22a.1-personal0");
    }

    #[test]
    fn stderr_lines_are_colored_only_on_terminals() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        let plain = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(plain, "warning: careful");
    }

    #[test]
    fn actionable_error_too_many_docs_message() {
        let err = anyhow::Error::new(StoreError::TooManyDocuments(3));
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "TOO_MANY_DOCS");
        assert!(message.contains("Found 3 notes documents"));
    }

    #[test]
    fn actionable_error_auth_failure_message() {
        let cause = StoreError::Transport(TransportError::Auth("invalid_token".into()));
        let err = anyhow::Error::new(cause);
        let err = err.context("could not reach the notes document");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "AUTH_FAILURE");
        assert!(message.contains("MARGINALIA_ACCESS_TOKEN"));
    }

    #[test]
    fn actionable_error_bare_transport_error() {
        let err = anyhow::Error::new(TransportError::Network("dns failure".into()));
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "NETWORK_ERROR");
        assert!(message.contains("dns failure"));
    }

    #[test]
    fn actionable_error_http_error_keeps_message() {
        let err = anyhow::Error::new(StoreError::Transport(TransportError::Http {
            status: 500,
            message: "backend error".into(),
        }));
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "STORE_ERROR");
        assert!(message.contains("backend error"));
    }

    #[test]
    fn actionable_error_missing_document_message() {
        let err = anyhow::Error::new(StoreError::NoBackingDocument);
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "NO_NOTES_DOCUMENT");
        assert!(message.contains("marginalia add-comment"));
    }
}
