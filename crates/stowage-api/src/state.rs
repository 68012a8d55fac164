//! Application state shared by all handlers.

use stowage_core::Config;
use stowage_storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub config: Config,
}
