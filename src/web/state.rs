//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::Storage;

pub struct AppState {
    pub storage: Storage,
}

pub type SharedState = Arc<Mutex<AppState>>;

/// Wrap a store in the shared state handed to the router.
pub fn shared(storage: Storage) -> SharedState {
    Arc::new(Mutex::new(AppState { storage }))
}
