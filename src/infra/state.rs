//! Global application state.
//!
//! Used for access to common resources such as the item store
//! or the application configuration.

use super::{config::Config, database::Storage};
use axum::extract::FromRef;
use std::sync::Arc;

/// Global application state.
#[derive(Clone, Debug, FromRef)]
pub struct AppState {
    storage: Storage,
    config: Arc<Config>,
}

impl AppState {
    /// Constructs a new [`AppState`].
    pub fn new(storage: Storage, config: Config) -> Self {
        Self {
            storage,
            config: Arc::new(config),
        }
    }

    /// Returns the store.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
