//! Shared application state for API handlers.

use std::sync::{Arc, Mutex};

use playdeck_engine::status::StatusState;

use crate::sessions::SessionRegistry;
use crate::worker::PlayerHandle;

/// Everything the HTTP handlers need, wrapped in `web::Data` by `main`.
pub(crate) struct AppState {
    /// Command channel into the playback worker.
    pub(crate) player: PlayerHandle,
    /// Status shared with the worker's session threads.
    pub(crate) status: Arc<Mutex<StatusState>>,
    /// Issued controller sessions.
    pub(crate) sessions: SessionRegistry,
}

impl AppState {
    pub(crate) fn new(player: PlayerHandle, status: Arc<Mutex<StatusState>>) -> Self {
        Self {
            player,
            status,
            sessions: SessionRegistry::default(),
        }
    }
}
