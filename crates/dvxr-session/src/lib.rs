//! # dvxr-session
//!
//! Session and surface orchestration for the remote-desktop XR client.
//!
//! Takes a user from "unauthenticated" to "viewing and controlling a live
//! remote desktop in 3D/XR space":
//! - [`auth`]: authorization code handshake and token exchange
//! - [`directory`]: computer listing, lookup, and selection affordances
//! - [`connection`]: room negotiation, transport open, stale-session guard
//! - [`surface`]: the single desktop surface and its input adapters
//! - [`render`]: per-frame update and submit
//! - [`ui`]: button state projection and notices
//! - [`orchestrator`]: owns all of the above and applies async completions
//!   delivered as [`event::OrchestratorEvent`]s
//!
//! Rendering, XR, the streaming transport, and the page itself are external
//! collaborators, reached only through the traits in [`platform`].

pub mod auth;
pub mod connection;
pub mod directory;
pub mod event;
pub mod orchestrator;
pub mod platform;
pub mod render;
pub mod surface;
pub mod ui;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use orchestrator::{Applied, Orchestrator, OrchestratorState};
pub use platform::Platform;
