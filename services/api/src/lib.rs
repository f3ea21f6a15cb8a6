//! Parley API Library Crate
//!
//! This library contains the session-management side of the Parley service: the
//! worker process registry, the session launcher, the room service client,
//! configuration, HTTP handlers and routing. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod handlers;
pub mod launcher;
pub mod models;
pub mod registry;
pub mod room;
pub mod router;
pub mod state;
