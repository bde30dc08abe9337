use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::services::TransientStore;

/// Shared handler state: the resolved configuration plus the transient store
/// bound to its scratch directories.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: TransientStore,
}

impl AppState {
    /// Builds the state and creates the scratch directories if absent.
    pub fn new(config: Config) -> Result<Self> {
        let store = TransientStore::new(&config.upload_dir, &config.generated_dir)
            .context("failed to prepare upload/generated directories")?;
        Ok(AppState {
            config: Arc::new(config),
            store,
        })
    }
}
