// Shared setup for every command: config, transport and a signed-in store.

use anyhow::{bail, Context};
use clap::Args;
use marginalia_store::pending::MemoryPendingStore;
use marginalia_store::transport::GoogleDocsTransport;
use marginalia_store::{AnnotationStore, StoreConfig};
use tracing::debug;

pub type CliStore = AnnotationStore<GoogleDocsTransport, MemoryPendingStore>;

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Collection whose notes document to use (e.g. a tractate name).
    #[arg(long)]
    pub collection: Option<String>,
    /// Use the separate debug notes document.
    #[arg(long)]
    pub debug: bool,
    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

impl StoreArgs {
    /// Command-line flags win over file and environment config.
    pub fn apply(&self, mut config: StoreConfig) -> StoreConfig {
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        if self.debug {
            config.debug = true;
        }
        config
    }
}

/// Build a store and locate the collection's notes document.
pub async fn open(args: &StoreArgs) -> anyhow::Result<CliStore> {
    let config = args.apply(StoreConfig::load());
    debug!(collection = %config.collection, debug = config.debug, "opening notes store");

    let transport = GoogleDocsTransport::new(&config)
        .context("could not set up the document service client")?;
    let store = AnnotationStore::new(config, transport, MemoryPendingStore::new());
    store
        .init()
        .await
        .context("could not reach the notes document")?;

    if !store.status().signed_in {
        bail!("access token was rejected; set MARGINALIA_ACCESS_TOKEN to a fresh OAuth token");
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = StoreArgs {
            collection: Some("Yoma".into()),
            debug: true,
            json: false,
        };
        let config = args.apply(StoreConfig::default());
        assert_eq!(config.collection, "Yoma");
        assert!(config.debug);
        assert_eq!(config.database_property(), "Yoma debug database");
    }

    #[test]
    fn absent_flags_keep_config() {
        let base = StoreConfig {
            collection: "Shabbat".into(),
            debug: true,
            ..Default::default()
        };
        let config = StoreArgs::default().apply(base.clone());
        assert_eq!(config, base);
    }
}
