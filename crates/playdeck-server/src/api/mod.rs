//! HTTP API handlers.
//!
//! Actix routes for sessions, playback control, status, and health.

pub mod health;
pub mod playback;
pub mod sessions;

pub use playback::{pause, play_batch, status, stop};
pub use sessions::{sessions_create, sessions_list};
