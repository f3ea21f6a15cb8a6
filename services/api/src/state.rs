//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the server's long-lived
//! resources: the session launcher (and through it the process registry) and the
//! room service client.

use crate::{launcher::SessionLauncher, registry::SessionRegistry, room::RoomService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub launcher: SessionLauncher,
    pub rooms: Arc<dyn RoomService>,
}

impl AppState {
    pub fn registry(&self) -> &SessionRegistry {
        self.launcher.registry()
    }
}
