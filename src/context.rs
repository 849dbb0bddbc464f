//! Top-level service context.
//!
//! Owns the configuration, the [`IndexStore`] and the [`Acquirer`]. One
//! `Context` is built per process (or per test) and handed by reference to
//! the CLI commands and, cloned, to every HTTP handler.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::acquire::Acquirer;
use crate::config::Config;
use crate::store::IndexStore;

/// Shared handles for one running service.
#[derive(Clone)]
pub struct Context {
    config: Arc<Config>,
    store: Arc<IndexStore>,
    acquirer: Acquirer,
}

impl Context {
    /// Wires the store and acquirer from a validated [`Config`].
    pub fn new(config: Config) -> Result<Self> {
        let store = IndexStore::new(config.data.path.clone(), config.data.parser());
        let acquirer = Acquirer::new(&config.source)?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            acquirer,
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the index store.
    pub fn store(&self) -> Arc<IndexStore> {
        Arc::clone(&self.store)
    }

    /// Dataset downloader.
    pub fn acquirer(&self) -> &Acquirer {
        &self.acquirer
    }

    /// Local path of the cached dataset file.
    pub fn dataset_path(&self) -> &Path {
        &self.config.data.path
    }
}
