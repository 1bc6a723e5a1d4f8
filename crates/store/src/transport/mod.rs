// Document service transport: the seam between the store and the network.
//
// The store only talks to the service through `DocumentTransport`, so the
// orchestration logic can be exercised against an in-memory fake.

pub mod google;

use std::future::Future;

use marginalia_common::document::request::Request;
use marginalia_common::document::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use google::GoogleDocsTransport;

/// A file found by a property search or just created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not authorized: {0}")]
    Auth(String),
    #[error("document service error: {status} - {message}")]
    Http { status: u16, message: String },
    /// The document changed after the snapshot the mutation was built from.
    #[error("document revision is stale")]
    StaleRevision,
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Auth(_) | Self::StaleRevision | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Calls against the document service.
///
/// All methods return `Send` futures so the store can be driven from a
/// multi-threaded runtime.
pub trait DocumentTransport: Send + Sync + 'static {
    /// Whether the current credentials are usable.
    fn signed_in(&self) -> impl Future<Output = Result<bool, TransportError>> + Send;

    fn fetch_document(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Document, TransportError>> + Send;

    /// Files tagged with `property` by [`DocumentTransport::set_property`].
    fn search_by_property(
        &self,
        property: &str,
    ) -> impl Future<Output = Result<Vec<FileRef>, TransportError>> + Send;

    fn create_document(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<FileRef, TransportError>> + Send;

    fn set_property(
        &self,
        id: &str,
        property: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Apply `requests` atomically. With a `revision`, the service rejects
    /// the batch with [`TransportError::StaleRevision`] if the document
    /// has moved past it.
    fn apply_mutations(
        &self,
        id: &str,
        revision: Option<&str>,
        requests: &[Request],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> TransportError {
        TransportError::Http {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn transient_errors() {
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(http(503).is_transient());
        assert!(http(429).is_transient());
        assert!(!http(404).is_transient());
        assert!(!TransportError::StaleRevision.is_transient());
        assert!(!TransportError::Auth("expired".into()).is_transient());
    }
}
