// marginalia-store: async orchestration of the annotation store over a document service

pub mod config;
pub mod error;
pub mod gate;
pub mod pending;
pub mod retry;
pub mod store;
pub mod transport;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{AnnotationStore, StoreStatus};
