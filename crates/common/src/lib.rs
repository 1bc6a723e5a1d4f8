// marginalia-common: pure annotation schema, ordering and extraction over document snapshots

pub mod document;
pub mod extract;
pub mod order;
pub mod record;
pub mod schema;
pub mod types;
