use thiserror::Error;

use crate::config::ConfigError;
use crate::gate::GateError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// More than one document carries the collection's property. Never retried.
    #[error("found {0} backing documents for one collection")]
    TooManyDocuments(usize),
    #[error("no backing document is loaded")]
    NoBackingDocument,
    #[error("write was discarded before the backing document was ready")]
    Discarded,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<GateError> for StoreError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::Discarded => Self::Discarded,
        }
    }
}

impl StoreError {
    pub fn is_stale_revision(&self) -> bool {
        matches!(self, Self::Transport(TransportError::StaleRevision))
    }
}
